//! # Recorder Library
//!
//! Screen recording pipeline: grabs frames from a capture source at a target
//! frame rate and streams them into a video file, with start/pause/resume/stop
//! control.
//!
//! ## Features
//!
//! - **Paced Capture**: Frames are captured `1 / fps` apart, compensating for the capture latency
//! - **Backpressure**: A bounded frame queue blocks the capture side instead of growing memory
//! - **Pause/Resume**: Pausing keeps the output file open, resuming continues the frame numbering
//! - **Typed Lifecycle**: Misuse such as stopping an idle recorder is a [`Lifecycle`] warning, not an error
//! - **Pluggable Backends**: Any [`FrameSource`] and [`VideoSinkOpener`] can be plugged in
//!
//! ## Quick Start
//!
//! ```no_run
//! use recorder::{CaptureRegion, Lifecycle, RecorderConfig, ScreenRecorder, bounded};
//! # use recorder::{FrameSource, VideoSinkOpener};
//! # fn demo(source: impl FrameSource + 'static, opener: impl VideoSinkOpener + 'static) {
//!
//! let (event_sender, event_receiver) = bounded(64);
//! let recorder = ScreenRecorder::new(RecorderConfig::default(), source, opener)
//!     .with_event_sender(event_sender);
//!
//! recorder
//!     .start("recording.mp4", 30, Some(CaptureRegion::area(0, 0, 1280, 720)))
//!     .unwrap();
//!
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! recorder.pause().unwrap();
//! recorder.resume().unwrap();
//! std::thread::sleep(std::time::Duration::from_secs(2));
//!
//! match recorder.stop() {
//!     Ok(Lifecycle::Stopped(summary)) => println!("{summary:?}"),
//!     Ok(status) => println!("{status:?}"),
//!     Err(e) => eprintln!("Recording failed: {e}"),
//! }
//!
//! while let Ok(event) = event_receiver.try_recv() {
//!     println!("{event:?}");
//! }
//! # }
//! ```
//!
//! ## Architecture
//!
//! Each session runs two threads:
//! 1. **Capture Worker**: Pulls frames from the [`FrameSource`] and pushes them into the frame queue
//! 2. **Encode Worker**: Drains the frame queue into a [`VideoSink`] opened from the first frame
//!
//! The capture worker is respawned on every resume, the encode worker lives
//! until the session stops.
//!
//! ## Modules
//!
//! - [`recorder`]: Session lifecycle management
//! - [`recorder_config`]: Configuration and fps statistics
//! - [`recorder_error`]: Error types for recording operations
//! - [`frame_queue`]: Bounded frame hand-off between the workers
//! - [`run_state`]: Shared run state

mod capture_worker;
mod encode_worker;
mod pipeline;

pub mod frame_queue;
pub mod recorder;
pub mod recorder_config;
pub mod recorder_error;
pub mod run_state;

pub use capture_worker::FramePacer;
pub use crossbeam::channel::{Receiver, Sender, bounded};
pub use recorder::{Lifecycle, RecordingSession, RecordingSummary, ScreenRecorder};
pub use recorder_config::{DEFAULT_FILE_NAME, DEFAULT_FPS, RecorderConfig, SimpleFpsCounter};
pub use recorder_error::RecorderError;
pub use run_state::RunState;
pub use screen_capture::{
    CaptureRegion, Frame, FrameSource, PixelFormat, Rectangle, ScreenCaptureError,
};
pub use video_sink::{SinkError, VideoSink, VideoSinkConfig, VideoSinkOpener};

#[cfg(feature = "openh264")]
pub use video_sink::{Mp4SinkOpener, OpenH264Mp4Sink};

/// Encode statistics delivered after every written frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsUser {
    /// Encoded frames per second over the last three seconds
    pub fps: f32,
    pub total_frames: u64,
}

/// Notifications sent to the channel given to [`ScreenRecorder::with_event_sender`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    Stats(StatsUser),

    /// A worker failed, the error is returned by the next lifecycle call
    Failed(String),
}
