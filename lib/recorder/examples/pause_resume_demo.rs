use recorder::{
    CaptureRegion, Frame, FrameSource, Lifecycle, Mp4SinkOpener, PixelFormat, RecorderConfig,
    RecorderEvent, ScreenCaptureError, ScreenRecorder, bounded,
};
use std::{thread, time::Duration};

/// Moving color bars, stands in for a real display grabber.
struct TestPattern {
    width: u32,
    height: u32,
    tick: u32,
}

impl FrameSource for TestPattern {
    fn capture(&mut self, region: &CaptureRegion) -> Result<Frame, ScreenCaptureError> {
        let (width, height) = match region {
            CaptureRegion::FullScreen => (self.width, self.height),
            CaptureRegion::Area(rect) => (rect.width as u32, rect.height as u32),
        };

        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let band = ((x + self.tick) / 40) % 3;
                let shade = (y * 255 / height.max(1)) as u8;
                let pixel = match band {
                    0 => [shade, 40, 40, 255],
                    1 => [40, shade, 40, 255],
                    _ => [40, 40, shade, 255],
                };
                data.extend_from_slice(&pixel);
            }
        }

        self.tick += 4;
        Ok(Frame::new(width, height, PixelFormat::Rgba8, data))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = RecorderConfig::load("recorder.toml");
    log::info!("Recording configuration: {:#?}", config);

    let source = TestPattern {
        width: 1280,
        height: 720,
        tick: 0,
    };

    let (event_sender, event_receiver) = bounded(64);
    let recorder =
        ScreenRecorder::new(config, source, Mp4SinkOpener).with_event_sender(event_sender);

    thread::spawn(move || {
        while let Ok(event) = event_receiver.recv() {
            match event {
                RecorderEvent::Stats(stats) => {
                    log::debug!("fps: {:.2}, total frames: {}", stats.fps, stats.total_frames)
                }
                RecorderEvent::Failed(e) => log::warn!("recording failed: {e}"),
            }
        }
    });

    let path = RecorderConfig::make_filename(std::env::temp_dir());
    recorder.start(&path, 25, Some(CaptureRegion::area(0, 0, 640, 360)))?;

    thread::sleep(Duration::from_secs(2));
    log::info!("pause: {:?}", recorder.pause()?);

    thread::sleep(Duration::from_secs(1));
    log::info!("resume: {:?}", recorder.resume()?);

    thread::sleep(Duration::from_secs(2));
    if let Lifecycle::Stopped(summary) = recorder.stop()? {
        log::info!(
            "saved {} frames ({:.2?}) to {}",
            summary.frames_encoded,
            summary.duration,
            summary.path.display()
        );
    }

    Ok(())
}
