use crate::RecorderError;
use chrono::Local;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

pub const DEFAULT_FPS: u32 = 15;
pub const DEFAULT_FILE_NAME: &str = "Recording.mp4";

/// Tunables of a [`ScreenRecorder`](crate::ScreenRecorder).
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// queue_capacity = 64
/// high_fps_threshold = 24
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
#[serde(default)]
pub struct RecorderConfig {
    /// Frames the capture worker may run ahead of the encoder before it blocks
    pub queue_capacity: usize,

    /// Highest accepted fps (inclusive)
    pub max_fps: u32,

    /// Above this fps recording works but frames may lag behind real time
    pub high_fps_threshold: u32,

    /// Consecutive transient capture failures tolerated before giving up
    pub max_capture_retries: u32,

    pub retry_backoff_ms: u64,

    /// Accepted output extensions, compared case-insensitively
    pub video_extensions: Vec<String>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 128,
            max_fps: 60,
            high_fps_threshold: 30,
            max_capture_retries: 3,
            retry_backoff_ms: 10,
            video_extensions: vec!["mp4".to_string()],
        }
    }
}

impl RecorderConfig {
    /// Load a config file, falling back to the defaults when it is missing or broken.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(text) => match toml::from_str::<RecorderConfig>(&text) {
                Ok(config) => {
                    log::info!("Load recorder config: {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Parse `{}` failed, use default config: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Read `{}` failed, use default config: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Check `fps` against `1..=max_fps`.
    ///
    /// Returns whether it is above the high fps threshold.
    pub fn validate_fps(&self, fps: u32) -> Result<bool, RecorderError> {
        if fps == 0 || fps > self.max_fps {
            return Err(RecorderError::InvalidFps {
                fps,
                max: self.max_fps,
            });
        }

        Ok(fps > self.high_fps_threshold)
    }

    /// Reject paths without an accepted video extension or inside a missing directory.
    pub fn validate_file_name(&self, path: &Path) -> Result<(), RecorderError> {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return Err(RecorderError::InvalidFileName(format!(
                "`{}` has no file extension",
                path.display()
            )));
        };

        if !self
            .video_extensions
            .iter()
            .any(|item| item.eq_ignore_ascii_case(extension))
        {
            return Err(RecorderError::InvalidFileName(format!(
                "`{}` extension must be one of {:?}",
                path.display(),
                self.video_extensions
            )));
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            return Err(RecorderError::InvalidFileName(format!(
                "No found saved directory: {}",
                parent.display()
            )));
        }

        Ok(())
    }

    /// Generate a filename with timestamp for automatic file naming.
    ///
    /// The generated filename uses the format: `YYYY-MM-DD_HH-MM-SS.mp4`
    ///
    /// # Examples
    ///
    /// ```
    /// use recorder::RecorderConfig;
    ///
    /// let filename = RecorderConfig::make_filename("/home/user/recordings");
    /// assert_eq!(filename.extension().unwrap(), "mp4");
    /// ```
    pub fn make_filename(dir: impl AsRef<Path>) -> PathBuf {
        let mut filename = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        filename.push_str(".mp4");
        dir.as_ref().to_path_buf().join(filename)
    }
}

/// Frames per second over a sliding window of the last three seconds.
#[derive(Debug, Default, Clone)]
pub struct SimpleFpsCounter {
    pub fps: f32,
    frames: VecDeque<Instant>,
}

impl SimpleFpsCounter {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            fps: 0.0,
        }
    }

    pub fn add_frame(&mut self, timestamp: Instant) -> f32 {
        if let Some(three_seconds_ago) = timestamp.checked_sub(Duration::from_secs(3)) {
            while let Some(&oldest) = self.frames.front() {
                if oldest < three_seconds_ago {
                    self.frames.pop_front();
                } else {
                    break;
                }
            }
        }

        self.frames.push_back(timestamp);

        if self.frames.len() >= 2
            && let Some(&oldest) = self.frames.front()
        {
            let time_span = timestamp.saturating_duration_since(oldest);
            if time_span.as_secs_f64() > 0.0 {
                self.fps = (self.frames.len() as f64 / time_span.as_secs_f64()) as f32;
                return self.fps;
            }
        }

        0.0
    }
}
