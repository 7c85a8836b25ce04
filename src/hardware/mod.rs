//! Camera hardware boundary.
//!
//! The platform camera stack is consumed through [`CameraProvider`] (enumerate and
//! open devices) and [`CameraHandle`] (one opened device). Implementations are
//! expected to be cheap to share; the controller only calls mutating methods from
//! its interactive thread.

mod parameters;
#[cfg(test)]
mod tests;

pub use parameters::{
    optimize_parameters, set_flash_mode, set_focus_mode, FlashMode, FocusMode, FpsRange,
    Parameters, SceneMode,
};

use crate::error::CameraError;
use crate::surface::PreviewSurface;
use std::sync::Arc;

/// Receives every captured preview frame (NV21: luminance plane first)
pub type FrameSink = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Invoked once when a focus request completes, with the success flag
pub type AutoFocusCallback = Box<dyn FnOnce(bool) + Send>;

/// Direction the camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Back,
    Front,
}

/// Static description of one camera device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: u32,
    pub facing: Facing,
    /// Clockwise rotation of the sensor image relative to the natural display orientation
    pub orientation: u32,
}

/// Enumerates and opens camera devices
pub trait CameraProvider: Send + Sync {
    fn devices(&self) -> Vec<DeviceInfo>;

    fn open(&self, index: u32) -> Result<Arc<dyn CameraHandle>, CameraError>;
}

/// An opened camera device
pub trait CameraHandle: Send + Sync {
    /// Current parameters, `None` when the device cannot report them
    fn parameters(&self) -> Option<Parameters>;

    fn set_parameters(&self, parameters: &Parameters) -> Result<(), CameraError>;

    fn set_display_orientation(&self, degrees: u32) -> Result<(), CameraError>;

    fn set_preview_display(&self, surface: &dyn PreviewSurface) -> Result<(), CameraError>;

    fn set_preview_frame_sink(&self, sink: Option<FrameSink>) -> Result<(), CameraError>;

    fn start_preview(&self) -> Result<(), CameraError>;

    fn stop_preview(&self) -> Result<(), CameraError>;

    fn auto_focus(&self, callback: AutoFocusCallback) -> Result<(), CameraError>;

    fn cancel_auto_focus(&self) -> Result<(), CameraError>;

    /// Free the device; further calls fail with [`CameraError::Released`]
    fn release(&self);
}

/// Resolve the device to open: the explicit index, or the first back-facing camera.
pub fn select_device(
    devices: &[DeviceInfo],
    explicit_index: Option<u32>,
) -> Result<DeviceInfo, CameraError> {
    match explicit_index {
        Some(index) => devices
            .iter()
            .find(|device| device.index == index)
            .copied()
            .ok_or(CameraError::InvalidDeviceIndex {
                index,
                count: devices.len(),
            }),
        None => devices
            .iter()
            .find(|device| device.facing == Facing::Back)
            .copied()
            .ok_or(CameraError::NoCameraAvailable),
    }
}
