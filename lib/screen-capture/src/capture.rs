use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Memory layout of one pixel in a [`Frame`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Rgb8,
    Bgr8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
        }
    }
}

/// A raw bitmap grabbed from the display at one point in time.
///
/// A frame is moved, never shared: the capture worker owns it until it is
/// pushed into the queue and the encode worker owns it after it is popped.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,

    /// Tightly packed rows, `width * height * format.bytes_per_pixel()` bytes
    pub pixel_data: Vec<u8>,

    /// When the capture call returned this frame
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(width: u32, height: u32, format: PixelFormat, pixel_data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            pixel_data,
            captured_at: Instant::now(),
        }
    }

    /// Number of bytes a buffer of this size and format must hold.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// True when both dimensions are positive and the buffer length matches them.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.pixel_data.len() == self.expected_len()
    }
}
