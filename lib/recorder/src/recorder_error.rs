use screen_capture::ScreenCaptureError;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for recording operations.
///
/// Validation errors come back from `start` before anything is spawned.
/// Pipeline errors are raised on a worker thread, parked in the recorder and
/// returned by the next lifecycle call.
///
/// # Examples
///
/// ```no_run
/// use recorder::{RecorderError, ScreenRecorder};
///
/// # fn demo(recorder: &ScreenRecorder) {
/// match recorder.stop() {
///     Ok(status) => println!("{status:?}"),
///     Err(RecorderError::EncodeFailure { incomplete: Some(path), .. }) => {
///         eprintln!("{} is incomplete and will not play", path.display())
///     }
///     Err(e) => eprintln!("Recording failed: {e}"),
/// }
/// # }
/// ```
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Invalid video file name: {0}")]
    InvalidFileName(String),

    #[error("Invalid fps {fps}: expect a value in 1..={max}")]
    InvalidFps { fps: u32, max: u32 },

    #[error("Invalid capture region: {0}")]
    InvalidRegion(String),

    #[error("Screen capture failed: {0}")]
    CaptureFailure(#[from] ScreenCaptureError),

    #[error("Video encoding failed: {message}")]
    EncodeFailure {
        message: String,

        /// Output file left on disk without a valid container index
        incomplete: Option<PathBuf>,
    },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("No frames were captured, no video was written")]
    NoFramesCaptured,

    #[error("Queue operation failed: {0}")]
    QueueError(String),
}

impl RecorderError {
    pub(crate) fn encode(message: impl ToString, incomplete: Option<PathBuf>) -> Self {
        RecorderError::EncodeFailure {
            message: message.to_string(),
            incomplete,
        }
    }
}
