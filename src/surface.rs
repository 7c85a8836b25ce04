//! Display boundary: the preview surface and the scanner view hosting it.

use crate::geometry::Size;
use std::sync::Arc;

/// Lifecycle notifications from the preview surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Created,
    Changed {
        width: u32,
        height: u32,
        /// False when the drawable target behind the surface has gone away
        drawable_available: bool,
    },
    Destroyed,
}

pub type SurfaceListener = Arc<dyn Fn(SurfaceEvent) + Send + Sync>;

/// Called with the view size once the view has been laid out
pub type LayoutListener = Arc<dyn Fn(Size) + Send + Sync>;

/// Surface the camera draws its preview into
pub trait PreviewSurface: Send + Sync {
    /// Register the lifecycle listener, replacing any previous one; `None` unregisters.
    fn set_listener(&self, listener: Option<SurfaceListener>);
}

/// View that shows the preview and the scanning frame
pub trait ScannerView: Send + Sync {
    /// Size of the view, `None` until it has been laid out
    fn viewport(&self) -> Option<Size>;

    fn set_layout_listener(&self, listener: Option<LayoutListener>);

    /// Rotation of the screen from its natural orientation, in degrees
    fn screen_rotation(&self) -> u32;

    fn surface(&self) -> Arc<dyn PreviewSurface>;

    /// Whether the view draws a square scanning frame
    fn is_square_frame(&self) -> bool;

    fn set_frame_size(&self, frame_size: Size);

    fn set_auto_focus_enabled(&self, enabled: bool);

    fn set_flash_enabled(&self, enabled: bool);
}
