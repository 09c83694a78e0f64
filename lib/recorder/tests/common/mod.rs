#![allow(dead_code)]

use recorder::{
    CaptureRegion, Frame, FrameSource, PixelFormat, ScreenCaptureError, SinkError, VideoSink,
    VideoSinkConfig, VideoSinkOpener,
};
use std::{
    collections::VecDeque,
    fs::File,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Poll `cond` every few milliseconds until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Frame,
    Transient,
    Fatal,
    Malformed,
}

/// Produces numbered frames: the first 8 bytes hold the frame counter.
///
/// Scripted steps are played first, plain frames follow. A closed gate turns
/// every capture into a transient failure.
pub struct SyntheticSource {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub fill: Vec<u8>,
    counter: u64,
    script: VecDeque<Step>,
    gate: Option<Arc<AtomicBool>>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            fill: vec![0; format.bytes_per_pixel()],
            counter: 0,
            script: VecDeque::new(),
            gate: None,
        }
    }

    pub fn rgb() -> Self {
        Self::new(4, 4, PixelFormat::Rgb8)
    }

    pub fn with_script(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.script = steps.into_iter().collect();
        self
    }

    pub fn with_gate(mut self, gate: Arc<AtomicBool>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_fill(mut self, pixel: &[u8]) -> Self {
        self.fill = pixel.to_vec();
        self
    }

    fn next_frame(&mut self) -> Frame {
        let mut data = self
            .fill
            .iter()
            .copied()
            .cycle()
            .take(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
            .collect::<Vec<_>>();

        data[..8].copy_from_slice(&self.counter.to_le_bytes());
        self.counter += 1;

        Frame::new(self.width, self.height, self.format, data)
    }
}

impl FrameSource for SyntheticSource {
    fn capture(&mut self, _region: &CaptureRegion) -> Result<Frame, ScreenCaptureError> {
        if let Some(gate) = &self.gate
            && !gate.load(Ordering::Acquire)
        {
            return Err(ScreenCaptureError::Transient("gate closed".to_string()));
        }

        match self.script.pop_front().unwrap_or(Step::Frame) {
            Step::Frame => Ok(self.next_frame()),
            Step::Transient => Err(ScreenCaptureError::Transient("busy".to_string())),
            Step::Fatal => Err(ScreenCaptureError::Fatal("display lost".to_string())),
            Step::Malformed => Ok(Frame::new(0, self.height, self.format, vec![])),
        }
    }
}

/// Everything the recording sinks saw, shared with the test.
#[derive(Debug, Default)]
pub struct SinkLog {
    pub opens: usize,
    pub closes: usize,
    pub configs: Vec<VideoSinkConfig>,
    pub counters: Vec<u64>,
    pub timestamps: Vec<Instant>,
    pub formats: Vec<PixelFormat>,
    pub last_pixel: Vec<u8>,
}

#[derive(Clone)]
pub struct RecordingOpener {
    pub log: Arc<Mutex<SinkLog>>,
    pub input_format: PixelFormat,
    pub fail_append_at: Option<usize>,
    pub touch_file: bool,
}

impl RecordingOpener {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(SinkLog::default())),
            input_format: PixelFormat::Rgb8,
            fail_append_at: None,
            touch_file: true,
        }
    }

    pub fn with_input_format(mut self, format: PixelFormat) -> Self {
        self.input_format = format;
        self
    }

    pub fn with_fail_append_at(mut self, n: usize) -> Self {
        self.fail_append_at = Some(n);
        self
    }

    pub fn without_file(mut self) -> Self {
        self.touch_file = false;
        self
    }

    pub fn opens(&self) -> usize {
        self.log.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }

    pub fn counters(&self) -> Vec<u64> {
        self.log.lock().unwrap().counters.clone()
    }

    pub fn timestamps(&self) -> Vec<Instant> {
        self.log.lock().unwrap().timestamps.clone()
    }
}

impl VideoSinkOpener for RecordingOpener {
    fn open(&self, config: VideoSinkConfig) -> Result<Box<dyn VideoSink>, SinkError> {
        if self.touch_file {
            File::create(&config.path)?;
        }

        let mut log = self.log.lock().unwrap();
        log.opens += 1;
        log.configs.push(config);

        Ok(Box::new(RecordingSink {
            log: self.log.clone(),
            input_format: self.input_format,
            fail_append_at: self.fail_append_at,
            appended: 0,
        }))
    }
}

pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    input_format: PixelFormat,
    fail_append_at: Option<usize>,
    appended: usize,
}

impl VideoSink for RecordingSink {
    fn input_format(&self) -> PixelFormat {
        self.input_format
    }

    fn append(&mut self, frame: &Frame) -> Result<(), SinkError> {
        if self.fail_append_at == Some(self.appended) {
            return Err(SinkError::VideoEncodingFailed("disk full".to_string()));
        }
        self.appended += 1;

        let mut log = self.log.lock().unwrap();
        if frame.format == PixelFormat::Rgb8 || frame.format == PixelFormat::Rgba8 {
            let mut counter = [0; 8];
            counter.copy_from_slice(&frame.pixel_data[..8]);
            log.counters.push(u64::from_le_bytes(counter));
        }

        let bpp = frame.format.bytes_per_pixel();
        log.last_pixel = frame.pixel_data[frame.pixel_data.len() - bpp..].to_vec();
        log.timestamps.push(frame.captured_at);
        log.formats.push(frame.format);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), SinkError> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}
