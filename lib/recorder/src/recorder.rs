use crate::{
    DEFAULT_FILE_NAME, DEFAULT_FPS, RecorderConfig, RecorderError, RecorderEvent,
    capture_worker::{CaptureWorker, FramePacer},
    encode_worker::{EncodeReport, EncodeWorker},
    frame_queue::{self, FrameSender},
    pipeline::Pipeline,
    run_state::RunState,
};
use crossbeam::channel::Sender;
use screen_capture::{CaptureRegion, FrameSource, ScreenCaptureError};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError, atomic::Ordering},
    thread::JoinHandle,
    time::{Duration, Instant},
};
use video_sink::VideoSinkOpener;

/// Metadata of the session a recorder is currently running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSession {
    pub video_file_name: PathBuf,
    pub target_fps: u32,
    pub region: CaptureRegion,

    /// Frames captured so far, pauses included
    pub frame_count: u64,
}

/// What a successful `stop` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub fps: u32,
    pub frames_captured: u64,
    pub frames_encoded: u64,

    /// Time spent in `Running`, paused stretches excluded
    pub duration: Duration,
}

/// Outcome of a lifecycle call.
///
/// `AlreadyInProgress` and `NotInProgress` are warnings: the call did nothing
/// and the recorder is in the same state as before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Started {
        /// fps is above the configured threshold, frames may lag behind real time
        high_fps: bool,
    },
    Paused,
    Resumed,
    Stopped(RecordingSummary),
    AlreadyInProgress,
    NotInProgress,
}

impl Lifecycle {
    pub fn is_warning(&self) -> bool {
        matches!(self, Lifecycle::AlreadyInProgress | Lifecycle::NotInProgress)
    }
}

struct ActiveSession {
    path: PathBuf,
    fps: u32,
    region: CaptureRegion,
    sender: FrameSender,
    capture: Option<JoinHandle<Box<dyn FrameSource>>>,
    encode: Option<JoinHandle<EncodeReport>>,
    recorded: Duration,
    active_since: Option<Instant>,
}

impl ActiveSession {
    fn pause_clock(&mut self) {
        if let Some(since) = self.active_since.take() {
            self.recorded += since.elapsed();
        }
    }

    fn elapsed(&self) -> Duration {
        self.recorded + self.active_since.map(|since| since.elapsed()).unwrap_or_default()
    }
}

struct Inner {
    // `None` while a capture worker owns it
    source: Option<Box<dyn FrameSource>>,
    session: Option<ActiveSession>,
}

/// Screen recorder driving one capture worker and one encode worker per session.
///
/// Lifecycle calls are serialized by an internal lock, so a recorder can be
/// shared between threads behind an `Arc`.
///
/// # Examples
///
/// ```no_run
/// use recorder::{Lifecycle, RecorderConfig, ScreenRecorder};
/// # use recorder::FrameSource;
/// # use recorder::VideoSinkOpener;
/// # fn demo(source: impl FrameSource + 'static, opener: impl VideoSinkOpener + 'static) {
/// let recorder = ScreenRecorder::new(RecorderConfig::default(), source, opener);
///
/// recorder.start("out.mp4", 25, None).unwrap();
/// std::thread::sleep(std::time::Duration::from_secs(3));
///
/// if let Ok(Lifecycle::Stopped(summary)) = recorder.stop() {
///     println!("{} frames in {:.2?}", summary.frames_encoded, summary.duration);
/// }
/// # }
/// ```
pub struct ScreenRecorder {
    config: RecorderConfig,
    opener: Arc<dyn VideoSinkOpener>,
    pipeline: Arc<Pipeline>,
    inner: Mutex<Inner>,
    session: Mutex<Option<RecordingSession>>,
}

impl ScreenRecorder {
    pub fn new(
        config: RecorderConfig,
        source: impl FrameSource + 'static,
        opener: impl VideoSinkOpener + 'static,
    ) -> Self {
        let source: Box<dyn FrameSource> = Box::new(source);

        Self {
            config,
            opener: Arc::new(opener),
            pipeline: Arc::new(Pipeline::default()),
            inner: Mutex::new(Inner {
                source: Some(source),
                session: None,
            }),
            session: Mutex::new(None),
        }
    }

    /// Deliver [`RecorderEvent`]s to `sender`. Events are dropped when it is full.
    pub fn with_event_sender(self, sender: Sender<RecorderEvent>) -> Self {
        self.pipeline.set_event_sender(Some(sender));
        self
    }

    /// Start a session writing `file_name` at `fps`, full screen when `region` is `None`.
    pub fn start(
        &self,
        file_name: impl AsRef<Path>,
        fps: u32,
        region: Option<CaptureRegion>,
    ) -> Result<Lifecycle, RecorderError> {
        let mut inner = self.lock_inner();
        self.reap_failed(&mut inner)?;

        if matches!(
            self.pipeline.run_state.load(),
            RunState::Running | RunState::Paused
        ) {
            log::warn!("start ignored: recording is already in progress");
            return Ok(Lifecycle::AlreadyInProgress);
        }

        let path = file_name.as_ref().to_path_buf();
        self.validate_file_name(&path)?;
        let high_fps = self.config.validate_fps(fps)?;

        let region = region.unwrap_or_default();
        region.validate().map_err(|e| match e {
            ScreenCaptureError::InvalidRegion(msg) => RecorderError::InvalidRegion(msg),
            e => RecorderError::InvalidRegion(e.to_string()),
        })?;

        let Some(source) = inner.source.take() else {
            return Err(RecorderError::CaptureFailure(ScreenCaptureError::Fatal(
                "frame source is unavailable".to_string(),
            )));
        };

        if high_fps {
            log::warn!(
                "fps {fps} is above {}, frames may lag behind real time",
                self.config.high_fps_threshold
            );
        }

        self.pipeline.reset();
        let (sender, receiver) = frame_queue::channel(self.config.queue_capacity);

        let encode = EncodeWorker {
            receiver,
            opener: self.opener.clone(),
            path: path.clone(),
            fps,
            pipeline: self.pipeline.clone(),
        }
        .spawn();

        self.pipeline.run_state.store(RunState::Running);
        let capture = self.capture_worker(source, sender.clone(), region, fps).spawn();

        inner.session = Some(ActiveSession {
            path: path.clone(),
            fps,
            region,
            sender,
            capture: Some(capture),
            encode: Some(encode),
            recorded: Duration::ZERO,
            active_since: Some(Instant::now()),
        });

        *self.lock_session() = Some(RecordingSession {
            video_file_name: path.clone(),
            target_fps: fps,
            region,
            frame_count: 0,
        });

        log::info!(
            "start recording {} @ {fps} fps, region: {region:?}",
            path.display()
        );

        Ok(Lifecycle::Started { high_fps })
    }

    /// Start with the default file name and fps.
    pub fn start_default(&self) -> Result<Lifecycle, RecorderError> {
        self.start(DEFAULT_FILE_NAME, DEFAULT_FPS, None)
    }

    /// Stop capturing but keep the encode worker and output file open.
    pub fn pause(&self) -> Result<Lifecycle, RecorderError> {
        let mut inner = self.lock_inner();
        self.reap_failed(&mut inner)?;

        if !self
            .pipeline
            .run_state
            .transition(RunState::Running, RunState::Paused)
        {
            self.reap_failed(&mut inner)?;
            log::warn!("pause ignored: no recording in progress");
            return Ok(Lifecycle::NotInProgress);
        }

        let handle = inner.session.as_mut().and_then(|session| {
            session.pause_clock();
            session.capture.take()
        });

        if let Some(handle) = handle {
            self.join_capture(&mut inner.source, handle);
        }

        // the worker may have failed on its last frame
        self.reap_failed(&mut inner)?;

        log::info!(
            "recording paused after {} frames",
            self.pipeline.frames_captured.load(Ordering::Acquire)
        );

        Ok(Lifecycle::Paused)
    }

    /// Continue a paused session into the same file, frame numbering included.
    pub fn resume(&self) -> Result<Lifecycle, RecorderError> {
        let mut inner = self.lock_inner();
        self.reap_failed(&mut inner)?;

        match self.pipeline.run_state.load() {
            RunState::Running => {
                log::warn!("resume ignored: recording is already in progress");
                return Ok(Lifecycle::AlreadyInProgress);
            }
            RunState::Idle | RunState::Stopped => {
                log::warn!("resume ignored: no recording in progress");
                return Ok(Lifecycle::NotInProgress);
            }
            RunState::Paused => (),
        }

        let Some(source) = inner.source.take() else {
            self.pipeline
                .fail(RecorderError::CaptureFailure(ScreenCaptureError::Fatal(
                    "frame source is unavailable".to_string(),
                )));
            self.reap_failed(&mut inner)?;
            return Ok(Lifecycle::NotInProgress);
        };

        let Some((sender, region, fps)) = inner
            .session
            .as_ref()
            .map(|session| (session.sender.clone(), session.region, session.fps))
        else {
            inner.source = Some(source);
            return Ok(Lifecycle::NotInProgress);
        };

        if !self
            .pipeline
            .run_state
            .transition(RunState::Paused, RunState::Running)
        {
            inner.source = Some(source);
            self.reap_failed(&mut inner)?;
            return Ok(Lifecycle::NotInProgress);
        }

        let handle = self.capture_worker(source, sender, region, fps).spawn();
        if let Some(session) = inner.session.as_mut() {
            session.capture = Some(handle);
            session.active_since = Some(Instant::now());
        }

        log::info!(
            "recording resumed at frame[{}]",
            self.pipeline.frames_captured.load(Ordering::Acquire)
        );

        Ok(Lifecycle::Resumed)
    }

    /// Finish the session: drain every captured frame and finalize the file.
    pub fn stop(&self) -> Result<Lifecycle, RecorderError> {
        let mut inner = self.lock_inner();

        let Some(session) = inner.session.take() else {
            log::warn!("stop ignored: no recording in progress");
            return Ok(Lifecycle::NotInProgress);
        };

        let summary = self.teardown(&mut inner.source, session)?;
        log::info!(
            "recording stopped: {} frames in {:.2?} saved to {}",
            summary.frames_encoded,
            summary.duration,
            summary.path.display()
        );

        Ok(Lifecycle::Stopped(summary))
    }

    pub fn state(&self) -> RunState {
        self.pipeline.run_state.load()
    }

    pub fn frames_captured(&self) -> u64 {
        self.pipeline.frames_captured.load(Ordering::Acquire)
    }

    pub fn frames_encoded(&self) -> u64 {
        self.pipeline.frames_encoded.load(Ordering::Acquire)
    }

    pub fn active_capture_workers(&self) -> usize {
        self.pipeline.capture_workers.load(Ordering::Acquire)
    }

    pub fn session(&self) -> Option<RecordingSession> {
        self.lock_session().clone().map(|mut session| {
            session.frame_count = self.frames_captured();
            session
        })
    }

    /// Message of the first failure of the current or last session.
    pub fn last_error(&self) -> Option<String> {
        self.pipeline.last_error()
    }

    fn validate_file_name(&self, path: &Path) -> Result<(), RecorderError> {
        self.config.validate_file_name(path)?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        if !self.opener.supports_extension(extension) {
            return Err(RecorderError::InvalidFileName(format!(
                "video sink can not write `.{extension}` files"
            )));
        }

        Ok(())
    }

    fn capture_worker(
        &self,
        source: Box<dyn FrameSource>,
        sender: FrameSender,
        region: CaptureRegion,
        fps: u32,
    ) -> CaptureWorker {
        CaptureWorker {
            source,
            sender,
            region,
            pacer: FramePacer::new(fps),
            pipeline: self.pipeline.clone(),
            max_retries: self.config.max_capture_retries,
            retry_backoff: self.config.retry_backoff(),
        }
    }

    fn join_capture(
        &self,
        source: &mut Option<Box<dyn FrameSource>>,
        handle: JoinHandle<Box<dyn FrameSource>>,
    ) {
        match handle.join() {
            Ok(s) => *source = Some(s),
            Err(_) => {
                self.pipeline
                    .fail(RecorderError::CaptureFailure(ScreenCaptureError::Fatal(
                        "capture worker panicked".to_string(),
                    )));
            }
        }
    }

    /// Tear down a session a worker stopped on its own and return its error.
    fn reap_failed(&self, inner: &mut Inner) -> Result<(), RecorderError> {
        if !self.pipeline.is_stopped() {
            return Ok(());
        }

        let Some(session) = inner.session.take() else {
            self.pipeline.run_state.store(RunState::Idle);
            return Ok(());
        };

        log::warn!("reap failed recording session: {}", session.path.display());
        self.teardown(&mut inner.source, session).map(|_| ())
    }

    fn teardown(
        &self,
        source: &mut Option<Box<dyn FrameSource>>,
        mut session: ActiveSession,
    ) -> Result<RecordingSummary, RecorderError> {
        self.pipeline.run_state.store(RunState::Stopped);
        session.pause_clock();

        if let Some(handle) = session.capture.take() {
            self.join_capture(source, handle);
        }

        // covers paused sessions and capture workers that died early
        self.pipeline.send_terminator(&session.sender);

        let report = match session.encode.take().map(|handle| handle.join()) {
            Some(Ok(report)) => report,
            Some(Err(_)) => {
                self.pipeline.fail(RecorderError::encode(
                    "encode worker panicked",
                    session.path.exists().then(|| session.path.clone()),
                ));
                EncodeReport::default()
            }
            None => EncodeReport::default(),
        };

        let summary = RecordingSummary {
            path: session.path.clone(),
            fps: session.fps,
            frames_captured: self.frames_captured(),
            frames_encoded: report.frames_written,
            duration: session.elapsed(),
        };

        drop(session);
        *self.lock_session() = None;
        self.pipeline.run_state.store(RunState::Idle);

        if let Some(err) = self.pipeline.take_error() {
            return Err(err);
        }

        if summary.frames_encoded == 0 {
            log::warn!("no frames were captured, nothing was written");
            return Err(RecorderError::NoFramesCaptured);
        }

        Ok(summary)
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<RecordingSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ScreenRecorder {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        let (Some(session), mut source) = (inner.session.take(), inner.source.take()) else {
            return;
        };

        log::info!(
            "recorder dropped during a session, finalize {}",
            session.path.display()
        );

        match self.teardown(&mut source, session) {
            Ok(summary) => log::info!("saved {} frames", summary.frames_encoded),
            Err(e) => log::warn!("finalize recording on drop failed: {e}"),
        }
    }
}
