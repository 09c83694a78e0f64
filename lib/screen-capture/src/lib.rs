mod capture;
mod region;

pub use capture::*;
pub use region::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScreenCaptureError {
    /// The grab failed but the next attempt may succeed (busy compositor, lost frame)
    #[error("transient capture failure: {0}")]
    Transient(String),

    /// The region can not be captured on this display
    #[error("invalid capture region: {0}")]
    InvalidRegion(String),

    /// The capture device is gone or unusable
    #[error("{0}")]
    Fatal(String),
}

impl ScreenCaptureError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ScreenCaptureError::Transient(_))
    }
}

/// Platform screen grabbing primitive.
///
/// Implementations are called repeatedly at up to the recording fps from the
/// capture worker thread and must report failures as errors, never panic.
pub trait FrameSource: Send {
    fn capture(&mut self, region: &CaptureRegion) -> Result<Frame, ScreenCaptureError>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn capture(&mut self, region: &CaptureRegion) -> Result<Frame, ScreenCaptureError> {
        (**self).capture(region)
    }
}
