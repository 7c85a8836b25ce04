use crate::error::CameraError;
use crate::hardware::{DeviceInfo, Facing};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest preview worth decoding from (1024x576)
const MIN_PREVIEW_PIXELS: u64 = 589_824;
const MIN_DISTORTION: f32 = 0.3;
const MAX_DISTORTION: f32 = 3.0;
const DISTORTION_STEP: f32 = 0.1;

/// Width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn transposed(&self) -> Self {
        Self::new(self.height, self.width)
    }

    fn ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Degrees the preview has to be rotated clockwise to appear upright on screen.
///
/// `screen_rotation` is the rotation of the display from its natural orientation.
/// Front cameras are mirrored, so their rotation is compensated in the other direction.
pub fn display_orientation(device: &DeviceInfo, screen_rotation: u32) -> u32 {
    let screen_rotation = screen_rotation % 360;
    match device.facing {
        Facing::Front => {
            let rotation = (device.orientation + screen_rotation) % 360;
            (360 - rotation) % 360
        }
        Facing::Back => (device.orientation + 360 - screen_rotation) % 360,
    }
}

pub fn is_portrait(orientation: u32) -> bool {
    matches!(orientation % 360, 90 | 270)
}

/// Pick the largest supported preview size close to the target aspect ratio.
///
/// `target` is expressed in sensor orientation. The tolerance on the aspect ratio
/// grows until a size of at least [`MIN_PREVIEW_PIXELS`] matches; otherwise the
/// device's current preview size is kept.
pub fn find_suitable_preview_size(
    supported: &[Size],
    current: Option<Size>,
    target: Size,
) -> Result<Size, CameraError> {
    if !supported.is_empty() && !target.is_empty() {
        let mut sizes: Vec<Size> = supported.iter().copied().filter(|s| !s.is_empty()).collect();
        sizes.sort_by(|a, b| b.area().cmp(&a.area()));

        let target_ratio = target.ratio();
        let mut distortion = MIN_DISTORTION;
        while distortion <= MAX_DISTORTION {
            let found = sizes.iter().find(|size| {
                size.area() >= MIN_PREVIEW_PIXELS
                    && (target_ratio - size.ratio()).abs() <= distortion
            });
            if let Some(size) = found {
                return Ok(*size);
            }
            distortion += DISTORTION_STEP;
        }
    }

    current.ok_or_else(|| CameraError::Configuration {
        details: "Unable to configure camera preview size".to_string(),
    })
}

/// Portion of the preview that is visible in the viewport when the preview is
/// scaled to fill it; both sizes use display orientation.
pub fn frame_size(preview: Size, viewport: Size) -> Size {
    if preview.is_empty() || viewport.is_empty() || preview == viewport {
        return preview;
    }

    let scale_x = viewport.width as f64 / preview.width as f64;
    let scale_y = viewport.height as f64 / preview.height as f64;
    let scale = scale_x.max(scale_y);

    let width = (viewport.width as f64 / scale).round() as u32;
    let height = (viewport.height as f64 / scale).round() as u32;

    Size::new(
        width.clamp(1, preview.width),
        height.clamp(1, preview.height),
    )
}
