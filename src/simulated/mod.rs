//! In-process camera hardware for demos and tests
//!
//! Every call into a [`SimulatedCamera`] is recorded so the controller's
//! hardware traffic can be inspected.

mod camera;
mod view;

pub use camera::{DeviceSpec, HardwareCall, SimulatedCamera, SimulatedCameraProvider};
pub use view::{SimulatedSurface, SimulatedView};
