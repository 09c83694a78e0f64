use crate::ScreenCaptureError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> Option<i32> {
        self.x.checked_add(self.width)
    }

    pub fn bottom(&self) -> Option<i32> {
        self.y.checked_add(self.height)
    }
}

/// The part of the screen a recording segment captures.
///
/// Fixed for the lifetime of a segment: it is chosen at `start` and reused on
/// `resume`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureRegion {
    /// The entire primary display
    #[default]
    FullScreen,

    /// A rectangle in screen pixel coordinates
    Area(Rectangle),
}

impl CaptureRegion {
    pub fn area(left: i32, top: i32, width: i32, height: i32) -> Self {
        CaptureRegion::Area(Rectangle::new(left, top, width, height))
    }

    /// Reject rectangles that can never be captured.
    ///
    /// Origins must be on screen (non-negative), both dimensions positive,
    /// and the far edges must not overflow `i32`.
    pub fn validate(&self) -> Result<(), ScreenCaptureError> {
        let CaptureRegion::Area(rect) = self else {
            return Ok(());
        };

        if rect.x < 0 || rect.y < 0 {
            return Err(ScreenCaptureError::InvalidRegion(format!(
                "origin ({}, {}) is off screen",
                rect.x, rect.y
            )));
        }

        if rect.width <= 0 || rect.height <= 0 {
            return Err(ScreenCaptureError::InvalidRegion(format!(
                "size {}x{} is not positive",
                rect.width, rect.height
            )));
        }

        if rect.right().is_none() || rect.bottom().is_none() {
            return Err(ScreenCaptureError::InvalidRegion(format!(
                "{rect:?} overflows screen coordinates"
            )));
        }

        Ok(())
    }
}

impl From<Rectangle> for CaptureRegion {
    fn from(value: Rectangle) -> Self {
        CaptureRegion::Area(value)
    }
}
