use crate::{
    NalUnit, Result, SinkError, VIDEO_TIMESCALE, VideoSink, VideoSinkConfig, VideoSinkOpener,
    find_unit, is_keyframe, length_prefixed, parse_annexb,
};
use h264_reader::nal::UnitType;
use mp4::{AvcConfig, FourCC, MediaConfig, Mp4Config, Mp4Sample, Mp4Writer, TrackConfig, TrackType};
use openh264::{
    encoder::Encoder,
    formats::{RgbSliceU8, YUVBuffer},
};
use screen_capture::{Frame, PixelFormat};
use std::{fs::File, io::BufWriter, path::Path};

const VIDEO_TRACK_ID: u32 = 1;

fn brand(s: &str) -> Result<FourCC> {
    s.parse::<FourCC>()
        .map_err(|e| SinkError::Mux(format!("invalid brand `{s}`: {e:?}")))
}

/// Opens [`OpenH264Mp4Sink`]s for `.mp4` paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mp4SinkOpener;

impl VideoSinkOpener for Mp4SinkOpener {
    fn open(&self, config: VideoSinkConfig) -> Result<Box<dyn VideoSink>> {
        Ok(Box::new(OpenH264Mp4Sink::new(config)?))
    }
}

/// H.264 (OpenH264) elementary stream muxed into an MP4 container.
///
/// The video track is added on the first frame, once the encoder has produced
/// the SPS and PPS the `avcC` box needs.
pub struct OpenH264Mp4Sink {
    config: VideoSinkConfig,

    // H.264 4:2:0 needs even dimensions, odd edges are cropped
    width: u16,
    height: u16,

    encoder: Encoder,
    writer: Mp4Writer<BufWriter<File>>,
    track_added: bool,
    timeline: SampleTimeline,
    frame_index: u64,
}

/// Holds back the newest sample so frames the encoder skips under rate control
/// extend it instead of leaving a gap in the track.
#[derive(Debug, Default)]
struct SampleTimeline {
    pending: Option<Mp4Sample>,
    skipped: u32,
    timestamp: u64,
}

impl SampleTimeline {
    /// Queue a sample, returns the previous one once its duration is final.
    fn push(&mut self, bytes: Vec<u8>, is_sync: bool, duration: u32) -> Option<Mp4Sample> {
        let skipped = std::mem::take(&mut self.skipped);
        let sample = Mp4Sample {
            start_time: self.timestamp - skipped as u64,
            duration: duration + skipped,
            rendering_offset: 0,
            is_sync,
            bytes: bytes.into(),
        };

        self.timestamp += duration as u64;
        self.pending.replace(sample)
    }

    fn skip(&mut self, duration: u32) {
        match self.pending.as_mut() {
            Some(sample) => sample.duration += duration,
            None => self.skipped += duration,
        }
        self.timestamp += duration as u64;
    }

    fn finish(&mut self) -> Option<Mp4Sample> {
        self.pending.take()
    }
}

impl OpenH264Mp4Sink {
    pub fn new(config: VideoSinkConfig) -> Result<Self> {
        let (Ok(width), Ok(height)) = (
            u16::try_from(config.width & !1),
            u16::try_from(config.height & !1),
        ) else {
            return Err(SinkError::VideoEncodingFailed(format!(
                "frame size {}x{} is too large for an MP4 video track",
                config.width, config.height
            )));
        };

        if width == 0 || height == 0 {
            return Err(SinkError::VideoEncodingFailed(format!(
                "frame size {}x{} is too small to encode",
                config.width, config.height
            )));
        }

        let encoder = Encoder::new().map_err(|e| {
            SinkError::VideoEncodingFailed(format!("Failed to create OpenH264 encoder: {:?}", e))
        })?;

        let writer = Self::setup_mp4_writer(&config.path)?;
        log::info!(
            "Creating MP4 file: {} ({width}x{height} @ {} fps)",
            config.path.display(),
            config.fps
        );

        Ok(Self {
            config,
            width,
            height,
            encoder,
            writer,
            track_added: false,
            timeline: SampleTimeline::default(),
            frame_index: 0,
        })
    }

    fn setup_mp4_writer(path: &Path) -> Result<Mp4Writer<BufWriter<File>>> {
        let file = File::create(path).map_err(|e| {
            SinkError::Io(std::io::Error::other(format!(
                "Create `{}` failed. error: {e}",
                path.display()
            )))
        })?;

        let mp4_config = Mp4Config {
            major_brand: brand("isom")?,
            minor_version: 512,
            compatible_brands: vec![brand("isom")?, brand("iso2")?, brand("avc1")?, brand("mp41")?],
            timescale: VIDEO_TIMESCALE,
        };

        Mp4Writer::write_start(BufWriter::new(file), &mp4_config)
            .map_err(|e| SinkError::Mux(e.to_string()))
    }

    fn add_video_track(&mut self, units: &[NalUnit]) -> Result<()> {
        let (Some(sps), Some(pps)) = (
            find_unit(units, UnitType::SeqParameterSet),
            find_unit(units, UnitType::PicParameterSet),
        ) else {
            return Err(SinkError::Mux(
                "first encoded frame carries no SPS/PPS".to_string(),
            ));
        };

        self.writer
            .add_track(&TrackConfig {
                track_type: TrackType::Video,
                timescale: VIDEO_TIMESCALE,
                language: "und".to_string(),
                media_conf: MediaConfig::AvcConfig(AvcConfig {
                    width: self.width,
                    height: self.height,
                    seq_param_set: sps.data.clone(),
                    pic_param_set: pps.data.clone(),
                }),
            })
            .map_err(|e| SinkError::Mux(e.to_string()))?;

        self.track_added = true;
        Ok(())
    }

    fn write_sample(&mut self, sample: &Mp4Sample) -> Result<()> {
        self.writer
            .write_sample(VIDEO_TRACK_ID, sample)
            .map_err(|e| SinkError::Mux(e.to_string()))
    }

    fn crop_rgb(&self, frame: &Frame) -> Vec<u8> {
        let (width, height) = (self.width as u32, self.height as u32);
        if frame.width == width && frame.height == height {
            return frame.pixel_data.clone();
        }

        let src_stride = frame.width as usize * 3;
        let dst_stride = self.width as usize * 3;
        frame
            .pixel_data
            .chunks_exact(src_stride)
            .take(height as usize)
            .flat_map(|row| &row[..dst_stride])
            .copied()
            .collect()
    }
}

impl VideoSink for OpenH264Mp4Sink {
    fn input_format(&self) -> PixelFormat {
        PixelFormat::Rgb8
    }

    fn append(&mut self, frame: &Frame) -> Result<()> {
        if frame.width != self.config.width || frame.height != self.config.height {
            return Err(SinkError::ImageProcessingFailed(format!(
                "frame size changed. current size: {}x{}. expect size: {}x{}",
                frame.width, frame.height, self.config.width, self.config.height
            )));
        }

        let rgb = self.crop_rgb(frame);
        let rgb_source = RgbSliceU8::new(&rgb, (self.width as usize, self.height as usize));
        let yuv_buffer = YUVBuffer::from_rgb8_source(rgb_source);

        let bitstream = self
            .encoder
            .encode(&yuv_buffer)
            .map_err(|e| {
                SinkError::VideoEncodingFailed(format!("OpenH264 encoding failed: {:?}", e))
            })?
            .to_vec();

        let units = parse_annexb(&bitstream);
        let duration = self.config.frame_duration();
        let is_sync = is_keyframe(&units);
        let payload = length_prefixed(units.iter().filter(|unit| !unit.is_parameter_set()));

        if payload.is_empty() {
            log::debug!("encoder skipped frame[{}]", self.frame_index);
            self.timeline.skip(duration);
        } else {
            if !self.track_added {
                self.add_video_track(&units)?;
            }

            if let Some(sample) = self.timeline.push(payload, is_sync, duration) {
                self.write_sample(&sample)?;
            }
        }

        self.frame_index += 1;

        log::debug!(
            "mp4 sink frame[{}] {} bytes, sync: {is_sync}",
            self.frame_index,
            bitstream.len()
        );

        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        if let Some(sample) = self.timeline.finish() {
            self.write_sample(&sample)?;
        }

        self.writer
            .write_end()
            .map_err(|e| SinkError::Mux(e.to_string()))?;

        log::info!(
            "Successfully save MP4 file with {} frames: {}",
            self.frame_index,
            self.config.path.display()
        );

        Ok(())
    }
}
