use crate::error::DecoderError;
use crate::geometry::{is_portrait, Size};

/// Greyscale image handed to the detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuminanceFrame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl LuminanceFrame {
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }
}

/// Cut the frame-of-interest out of an NV21 preview frame and turn it upright.
///
/// The centred crop is taken in sensor coordinates, then rotated clockwise by
/// `orientation` and mirrored horizontally for front cameras.
pub fn extract_frame(
    data: &[u8],
    preview: Size,
    frame: Size,
    orientation: u32,
    square: bool,
    mirrored: bool,
) -> Result<LuminanceFrame, DecoderError> {
    let preview_width = preview.width as usize;
    let preview_height = preview.height as usize;
    let luminance_len = preview_width * preview_height;

    if preview.is_empty() || frame.is_empty() {
        return Err(DecoderError::InvalidFrame {
            details: format!("empty geometry (preview {}, frame {})", preview, frame),
        });
    }
    if data.len() < luminance_len {
        return Err(DecoderError::InvalidFrame {
            details: format!(
                "expected at least {} bytes for {} preview, got {}",
                luminance_len,
                preview,
                data.len()
            ),
        });
    }

    let sensor_frame = if is_portrait(orientation) {
        frame.transposed()
    } else {
        frame
    };

    let mut crop_width = (sensor_frame.width as usize).min(preview_width);
    let mut crop_height = (sensor_frame.height as usize).min(preview_height);
    if square {
        let side = crop_width.min(crop_height);
        crop_width = side;
        crop_height = side;
    }
    let left = (preview_width - crop_width) / 2;
    let top = (preview_height - crop_height) / 2;

    let source = |x: usize, y: usize| data[(top + y) * preview_width + left + x];

    let (width, height) = if is_portrait(orientation) {
        (crop_height, crop_width)
    } else {
        (crop_width, crop_height)
    };

    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let x = if mirrored { width - 1 - x } else { x };
            let value = match orientation % 360 {
                90 => source(y, crop_height - 1 - x),
                180 => source(crop_width - 1 - x, crop_height - 1 - y),
                270 => source(crop_width - 1 - y, x),
                _ => source(x, y),
            };
            pixels.push(value);
        }
    }

    Ok(LuminanceFrame {
        width,
        height,
        pixels,
    })
}
