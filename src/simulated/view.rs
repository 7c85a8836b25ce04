use crate::geometry::Size;
use crate::surface::{LayoutListener, PreviewSurface, ScannerView, SurfaceEvent, SurfaceListener};
use parking_lot::Mutex;
use std::sync::Arc;

/// Preview surface whose lifecycle events are emitted by hand
#[derive(Default)]
pub struct SimulatedSurface {
    listener: Mutex<Option<SurfaceListener>>,
}

impl SimulatedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to the registered listener; false when nobody listens
    pub fn emit(&self, event: SurfaceEvent) -> bool {
        let listener = self.listener.lock().clone();
        match listener {
            Some(listener) => {
                listener(event);
                true
            }
            None => false,
        }
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().is_some()
    }
}

impl PreviewSurface for SimulatedSurface {
    fn set_listener(&self, listener: Option<SurfaceListener>) {
        *self.listener.lock() = listener;
    }
}

#[derive(Default)]
struct ViewState {
    viewport: Option<Size>,
    layout_listener: Option<LayoutListener>,
    frame_size: Option<Size>,
    auto_focus_enabled: Option<bool>,
    flash_enabled: Option<bool>,
}

/// Scanner view that records what the controller tells it
pub struct SimulatedView {
    surface: Arc<SimulatedSurface>,
    screen_rotation: u32,
    square_frame: bool,
    state: Mutex<ViewState>,
}

impl SimulatedView {
    /// View that has already been laid out at `viewport`
    pub fn new(viewport: Size) -> Self {
        let view = Self::unlaid();
        view.state.lock().viewport = Some(viewport);
        view
    }

    /// View still waiting for its first layout pass
    pub fn unlaid() -> Self {
        Self {
            surface: Arc::new(SimulatedSurface::new()),
            screen_rotation: 0,
            square_frame: false,
            state: Mutex::new(ViewState::default()),
        }
    }

    pub fn with_screen_rotation(mut self, degrees: u32) -> Self {
        self.screen_rotation = degrees;
        self
    }

    pub fn with_square_frame(mut self, square: bool) -> Self {
        self.square_frame = square;
        self
    }

    /// Complete a layout pass, notifying the layout listener if one is registered
    pub fn lay_out(&self, viewport: Size) {
        let listener = {
            let mut state = self.state.lock();
            state.viewport = Some(viewport);
            state.layout_listener.clone()
        };
        if let Some(listener) = listener {
            listener(viewport);
        }
    }

    pub fn simulated_surface(&self) -> Arc<SimulatedSurface> {
        Arc::clone(&self.surface)
    }

    pub fn has_layout_listener(&self) -> bool {
        self.state.lock().layout_listener.is_some()
    }

    /// Frame size last pushed by the controller
    pub fn frame_size(&self) -> Option<Size> {
        self.state.lock().frame_size
    }

    pub fn auto_focus_indicator(&self) -> Option<bool> {
        self.state.lock().auto_focus_enabled
    }

    pub fn flash_indicator(&self) -> Option<bool> {
        self.state.lock().flash_enabled
    }
}

impl ScannerView for SimulatedView {
    fn viewport(&self) -> Option<Size> {
        self.state.lock().viewport
    }

    fn set_layout_listener(&self, listener: Option<LayoutListener>) {
        self.state.lock().layout_listener = listener;
    }

    fn screen_rotation(&self) -> u32 {
        self.screen_rotation
    }

    fn surface(&self) -> Arc<dyn PreviewSurface> {
        self.surface.clone()
    }

    fn is_square_frame(&self) -> bool {
        self.square_frame
    }

    fn set_frame_size(&self, frame_size: Size) {
        self.state.lock().frame_size = Some(frame_size);
    }

    fn set_auto_focus_enabled(&self, enabled: bool) {
        self.state.lock().auto_focus_enabled = Some(enabled);
    }

    fn set_flash_enabled(&self, enabled: bool) {
        self.state.lock().flash_enabled = Some(enabled);
    }
}
