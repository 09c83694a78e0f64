mod convert;

#[cfg(feature = "openh264")]
mod mp4_openh264;
#[cfg(feature = "openh264")]
mod nal;

pub use convert::{convert_frame, convert_pixels};

#[cfg(feature = "openh264")]
pub use nal::{NalUnit, find_unit, is_keyframe, length_prefixed, parse_annexb};

#[cfg(feature = "openh264")]
pub use mp4_openh264::{Mp4SinkOpener, OpenH264Mp4Sink};

use derive_setters::Setters;
use screen_capture::{Frame, PixelFormat};
use std::path::{Path, PathBuf};

// Standard video timescale (90kHz) for better compatibility
pub const VIDEO_TIMESCALE: u32 = 90000;

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("Image processing failed: {0}")]
    ImageProcessingFailed(String),

    #[error("Video encoding failed: {0}")]
    VideoEncodingFailed(String),

    #[error("Container muxing failed: {0}")]
    Mux(String),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// Parameters a sink is opened with, negotiated from the first frame of a session.
#[derive(Clone, Debug, Setters)]
#[setters(prefix = "with_")]
pub struct VideoSinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub path: PathBuf,
}

impl VideoSinkConfig {
    pub fn new(width: u32, height: u32, path: impl AsRef<Path>) -> Self {
        Self {
            width,
            height,
            fps: 25,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Length of one frame in `VIDEO_TIMESCALE` units.
    pub fn frame_duration(&self) -> u32 {
        VIDEO_TIMESCALE / self.fps.max(1)
    }
}

/// An open output container that accepts frames in capture order.
///
/// A sink is owned by exactly one encode worker. `close` consumes it, so it
/// can be finalized at most once.
pub trait VideoSink: Send {
    /// Pixel layout `append` expects. Frames are converted before they arrive.
    fn input_format(&self) -> PixelFormat {
        PixelFormat::Rgb8
    }

    fn append(&mut self, frame: &Frame) -> Result<()>;

    fn close(self: Box<Self>) -> Result<()>;
}

/// Factory for [`VideoSink`]s.
pub trait VideoSinkOpener: Send + Sync {
    fn open(&self, config: VideoSinkConfig) -> Result<Box<dyn VideoSink>>;

    /// Whether this opener can write a container with the given file extension.
    fn supports_extension(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("mp4")
    }
}

impl<F> VideoSinkOpener for F
where
    F: Fn(VideoSinkConfig) -> Result<Box<dyn VideoSink>> + Send + Sync,
{
    fn open(&self, config: VideoSinkConfig) -> Result<Box<dyn VideoSink>> {
        self(config)
    }
}
