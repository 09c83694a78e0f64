use crate::{
    RecorderError, RecorderEvent, SimpleFpsCounter, StatsUser,
    frame_queue::{FrameReceiver, QueueMessage, QueuedFrame},
    pipeline::Pipeline,
};
use std::{
    path::PathBuf,
    sync::{Arc, atomic::Ordering},
    thread::{self, JoinHandle},
};
use video_sink::{VideoSink, VideoSinkConfig, VideoSinkOpener, convert_frame};

/// What the encode worker did before it exited.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EncodeReport {
    pub frames_written: u64,
    pub sink_opened: bool,
}

/// Drains the session queue into a [`VideoSink`].
///
/// The sink is opened lazily from the first frame, so a session that never
/// captured anything leaves no file behind. The worker lives for the whole
/// session, pauses included, and exits on the terminator.
pub(crate) struct EncodeWorker {
    pub receiver: FrameReceiver,
    pub opener: Arc<dyn VideoSinkOpener>,
    pub path: PathBuf,
    pub fps: u32,
    pub pipeline: Arc<Pipeline>,
}

struct OpenSink {
    sink: Box<dyn VideoSink>,
    width: u32,
    height: u32,
}

impl EncodeWorker {
    pub fn spawn(self) -> JoinHandle<EncodeReport> {
        thread::spawn(move || self.run())
    }

    fn run(self) -> EncodeReport {
        let mut report = EncodeReport::default();
        let mut sink: Option<OpenSink> = None;
        let mut next_index = 0;
        let mut fps_counter = SimpleFpsCounter::new();
        let mut failed = false;

        loop {
            let frame = match self.receiver.pop() {
                Some(QueueMessage::Frame(frame)) => frame,
                Some(QueueMessage::Terminator) => {
                    log::debug!("encode worker got terminator");
                    break;
                }
                None => {
                    log::warn!("frame queue disconnected without terminator");
                    break;
                }
            };

            // keep draining so the capture side never blocks on a dead consumer
            if failed {
                continue;
            }

            let timestamp = frame.frame.captured_at;
            match self.write_frame(&mut sink, &mut report, next_index, frame) {
                Ok(_) => {
                    next_index += 1;
                    report.frames_written += 1;
                    let total_frames =
                        self.pipeline.frames_encoded.fetch_add(1, Ordering::AcqRel) + 1;
                    let fps = fps_counter.add_frame(timestamp);

                    log::debug!(
                        "encode frame[{}] fps: {fps:.2}, queue len: {}",
                        total_frames - 1,
                        self.receiver.len()
                    );

                    self.pipeline
                        .emit(RecorderEvent::Stats(StatsUser { fps, total_frames }));
                }
                Err(e) => {
                    failed = true;
                    self.pipeline.fail(e);
                }
            }
        }

        if let Some(OpenSink { sink, .. }) = sink
            && let Err(e) = sink.close()
        {
            self.pipeline.fail(RecorderError::encode(
                format!("close `{}` failed: {e}", self.path.display()),
                Some(self.path.clone()),
            ));
        }

        log::info!(
            "encode worker exit, frames written: {}",
            report.frames_written
        );

        report
    }

    fn write_frame(
        &self,
        sink: &mut Option<OpenSink>,
        report: &mut EncodeReport,
        expected_index: u64,
        queued: QueuedFrame,
    ) -> Result<(), RecorderError> {
        let QueuedFrame { index, frame } = queued;

        if index != expected_index {
            return Err(RecorderError::encode(
                format!("frame order broken, expect frame[{expected_index}], got frame[{index}]"),
                report.sink_opened.then(|| self.path.clone()),
            ));
        }

        if !frame.is_well_formed() {
            return Err(RecorderError::InvalidFrame(format!(
                "frame[{index}] is {}x{} {:?} with {} bytes",
                frame.width,
                frame.height,
                frame.format,
                frame.pixel_data.len()
            )));
        }

        if sink.is_none() {
            let config =
                VideoSinkConfig::new(frame.width, frame.height, &self.path).with_fps(self.fps);

            let opened = self.opener.open(config).map_err(|e| {
                RecorderError::encode(
                    format!("open `{}` failed: {e}", self.path.display()),
                    self.path.exists().then(|| self.path.clone()),
                )
            })?;

            log::info!(
                "open video sink {}x{} @ {} fps: {}",
                frame.width,
                frame.height,
                self.fps,
                self.path.display()
            );

            report.sink_opened = true;
            *sink = Some(OpenSink {
                sink: opened,
                width: frame.width,
                height: frame.height,
            });
        }

        let Some(open) = sink.as_mut() else {
            return Err(RecorderError::encode("video sink is not open", None));
        };

        if frame.width != open.width || frame.height != open.height {
            return Err(RecorderError::encode(
                format!(
                    "frame[{index}] size changed from {}x{} to {}x{}",
                    open.width, open.height, frame.width, frame.height
                ),
                Some(self.path.clone()),
            ));
        }

        let frame = convert_frame(frame, open.sink.input_format())
            .map_err(|e| RecorderError::InvalidFrame(e.to_string()))?;

        open.sink.append(&frame).map_err(|e| {
            RecorderError::encode(
                format!("append frame[{index}] failed: {e}"),
                Some(self.path.clone()),
            )
        })
    }
}
