use crate::{Result, SinkError};
use image::{ImageBuffer, Rgb, Rgba, buffer::ConvertBuffer};
use screen_capture::{Frame, PixelFormat};

/// Return `frame` in `target` layout, reusing the buffer when it already matches.
pub fn convert_frame(frame: Frame, target: PixelFormat) -> Result<Frame> {
    if frame.format == target {
        return Ok(frame);
    }

    let pixel_data = convert_pixels(
        &frame.pixel_data,
        frame.width,
        frame.height,
        frame.format,
        target,
    )?;

    Ok(Frame {
        format: target,
        pixel_data,
        ..frame
    })
}

pub fn convert_pixels(
    src: &[u8],
    width: u32,
    height: u32,
    from: PixelFormat,
    to: PixelFormat,
) -> Result<Vec<u8>> {
    let pixels = width as usize * height as usize;
    if src.len() != pixels * from.bytes_per_pixel() {
        return Err(SinkError::ImageProcessingFailed(format!(
            "buffer holds {} bytes, {width}x{height} {from:?} needs {}",
            src.len(),
            pixels * from.bytes_per_pixel()
        )));
    }

    if from == to {
        return Ok(src.to_vec());
    }

    // Screen grabbers hand out RGBA most often, let `image` do the common case.
    if from == PixelFormat::Rgba8 && to == PixelFormat::Rgb8 {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_raw(width, height, src.to_vec())
            .ok_or_else(|| {
                SinkError::ImageProcessingFailed("Failed to create image buffer".to_string())
            })?;

        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = img.convert();
        return Ok(img.into_raw());
    }

    let mut dst = Vec::with_capacity(pixels * to.bytes_per_pixel());
    for px in src.chunks_exact(from.bytes_per_pixel()) {
        let (r, g, b, a) = match from {
            PixelFormat::Rgba8 => (px[0], px[1], px[2], px[3]),
            PixelFormat::Bgra8 => (px[2], px[1], px[0], px[3]),
            PixelFormat::Rgb8 => (px[0], px[1], px[2], u8::MAX),
            PixelFormat::Bgr8 => (px[2], px[1], px[0], u8::MAX),
        };

        match to {
            PixelFormat::Rgba8 => dst.extend_from_slice(&[r, g, b, a]),
            PixelFormat::Bgra8 => dst.extend_from_slice(&[b, g, r, a]),
            PixelFormat::Rgb8 => dst.extend_from_slice(&[r, g, b]),
            PixelFormat::Bgr8 => dst.extend_from_slice(&[b, g, r]),
        }
    }

    Ok(dst)
}
