use crate::{
    RecorderError,
    frame_queue::{FrameSender, QueuedFrame},
    pipeline::Pipeline,
};
use screen_capture::{CaptureRegion, FrameSource};
use spin_sleep::SpinSleeper;
use std::{
    sync::{Arc, atomic::Ordering},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// Spaces capture attempts `1 / fps` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePacer {
    period: Duration,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        Self {
            period: Duration::from_secs(1) / fps.max(1),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// How long to sleep after an iteration that took `elapsed`.
    ///
    /// `None` when the iteration already overran its slot.
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        self.period
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero())
    }
}

/// Grabs frames from a [`FrameSource`] and pushes them into the session queue.
///
/// One worker runs per active (not paused) stretch of a session. The source
/// is handed back through the join handle so the next stretch can reuse it.
pub(crate) struct CaptureWorker {
    pub source: Box<dyn FrameSource>,
    pub sender: FrameSender,
    pub region: CaptureRegion,
    pub pacer: FramePacer,
    pub pipeline: Arc<Pipeline>,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl CaptureWorker {
    pub fn spawn(self) -> JoinHandle<Box<dyn FrameSource>> {
        let guard = self.pipeline.capture_worker_guard();

        thread::spawn(move || {
            let _guard = guard;
            self.run()
        })
    }

    fn run(mut self) -> Box<dyn FrameSource> {
        let sleeper = SpinSleeper::default();
        let mut failures = 0;

        log::info!(
            "capture worker started, interval: {:.2?}, region: {:?}",
            self.pacer.period(),
            self.region
        );

        while self.pipeline.run_state.is_running() {
            let start = Instant::now();

            match self.source.capture(&self.region) {
                Ok(frame) => {
                    failures = 0;

                    // single producer per session, load then add keeps indices gap-free
                    let index = self.pipeline.frames_captured.load(Ordering::Acquire);
                    if let Err(e) = self.sender.push(QueuedFrame { index, frame }) {
                        self.pipeline.fail(e);
                        break;
                    }
                    self.pipeline
                        .frames_captured
                        .fetch_add(1, Ordering::AcqRel);

                    log::debug!(
                        "capture frame[{index}] in {:.2?}, queue remained: {}",
                        start.elapsed(),
                        self.sender.remained()
                    );
                }
                Err(e) if e.is_transient() && failures < self.max_retries => {
                    failures += 1;
                    log::warn!(
                        "capture failed ({failures}/{}), retrying: {e}",
                        self.max_retries
                    );
                    sleeper.sleep(self.retry_backoff);
                    continue;
                }
                Err(e) => {
                    if e.is_transient() {
                        log::warn!("capture failed {} times in a row", failures + 1);
                    }
                    self.pipeline.fail(RecorderError::CaptureFailure(e));
                    break;
                }
            }

            if let Some(remaining) = self.pacer.remaining(start.elapsed()) {
                sleeper.sleep(remaining);
            }
        }

        // paused workers leave the queue open for the next stretch
        if self.pipeline.is_stopped() {
            self.pipeline.send_terminator(&self.sender);
        }

        log::info!(
            "capture worker exit, total frames: {}",
            self.pipeline.frames_captured.load(Ordering::Acquire)
        );

        self.source
    }
}
