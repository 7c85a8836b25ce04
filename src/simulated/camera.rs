use crate::error::CameraError;
use crate::geometry::Size;
use crate::hardware::{
    AutoFocusCallback, CameraHandle, CameraProvider, DeviceInfo, Facing, FlashMode, FocusMode,
    FpsRange, FrameSink, Parameters, SceneMode,
};
use crate::surface::PreviewSurface;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Hardware call recorded by a [`SimulatedCamera`]
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareCall {
    SetParameters(Parameters),
    SetDisplayOrientation(u32),
    SetPreviewDisplay,
    SetFrameSink { attached: bool },
    StartPreview,
    StopPreview,
    AutoFocus,
    CancelAutoFocus,
    Release,
}

/// Description of a simulated device
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    pub info: DeviceInfo,
    pub parameters: Option<Parameters>,
}

impl DeviceSpec {
    /// Back camera mounted in landscape, with auto focus and a torch
    pub fn back_camera(index: u32) -> Self {
        Self {
            info: DeviceInfo {
                index,
                facing: Facing::Back,
                orientation: 90,
            },
            parameters: Some(Parameters {
                preview_size: Some(Size::new(640, 480)),
                supported_preview_sizes: vec![
                    Size::new(1920, 1080),
                    Size::new(1280, 720),
                    Size::new(1024, 768),
                    Size::new(640, 480),
                ],
                focus_mode: Some(FocusMode::Auto),
                supported_focus_modes: vec![
                    FocusMode::Auto,
                    FocusMode::Fixed,
                    FocusMode::ContinuousPicture,
                ],
                flash_mode: Some(FlashMode::Off),
                supported_flash_modes: vec![FlashMode::Off, FlashMode::On, FlashMode::Torch],
                scene_mode: Some(SceneMode::Auto),
                supported_scene_modes: vec![SceneMode::Auto, SceneMode::Barcode],
                fps_range: Some(FpsRange { min: 15, max: 30 }),
                supported_fps_ranges: vec![FpsRange { min: 15, max: 30 }, FpsRange { min: 30, max: 30 }],
                video_stabilization_supported: true,
                video_stabilization: true,
            }),
        }
    }

    pub fn front_camera(index: u32) -> Self {
        let mut spec = Self::back_camera(index);
        spec.info.facing = Facing::Front;
        spec.info.orientation = 270;
        spec
    }

    /// Fixed-focus device sized for a still image: the image size is its only preview size
    pub fn still_image(index: u32, size: Size) -> Self {
        Self {
            info: DeviceInfo {
                index,
                facing: Facing::Back,
                orientation: 0,
            },
            parameters: Some(Parameters {
                preview_size: Some(size),
                supported_preview_sizes: vec![size],
                focus_mode: Some(FocusMode::Fixed),
                supported_focus_modes: vec![FocusMode::Fixed],
                ..Parameters::default()
            }),
        }
    }

    pub fn without_auto_focus(mut self) -> Self {
        if let Some(parameters) = self.parameters.as_mut() {
            parameters
                .supported_focus_modes
                .retain(|mode| *mode != FocusMode::Auto);
            parameters.focus_mode = Some(FocusMode::Fixed);
        }
        self
    }

    pub fn without_flash(mut self) -> Self {
        if let Some(parameters) = self.parameters.as_mut() {
            parameters.supported_flash_modes.clear();
            parameters.flash_mode = None;
        }
        self
    }

    /// Device that opens but cannot report its parameters
    pub fn without_parameters(mut self) -> Self {
        self.parameters = None;
        self
    }
}

/// In-process camera provider backed by [`DeviceSpec`]s
pub struct SimulatedCameraProvider {
    devices: Vec<DeviceSpec>,
    opened: Mutex<Vec<Arc<SimulatedCamera>>>,
}

impl SimulatedCameraProvider {
    pub fn new(devices: Vec<DeviceSpec>) -> Self {
        Self {
            devices,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn with_back_camera() -> Self {
        Self::new(vec![DeviceSpec::back_camera(0)])
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    /// Most recently opened camera
    pub fn last_opened(&self) -> Option<Arc<SimulatedCamera>> {
        self.opened.lock().last().cloned()
    }

    pub fn opened(&self) -> Vec<Arc<SimulatedCamera>> {
        self.opened.lock().clone()
    }
}

impl CameraProvider for SimulatedCameraProvider {
    fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.iter().map(|spec| spec.info).collect()
    }

    fn open(&self, index: u32) -> Result<Arc<dyn CameraHandle>, CameraError> {
        let spec = self
            .devices
            .iter()
            .find(|spec| spec.info.index == index)
            .ok_or(CameraError::DeviceOpen {
                index,
                details: "no such device".to_string(),
            })?;

        let camera = Arc::new(SimulatedCamera::new(spec.clone()));
        self.opened.lock().push(Arc::clone(&camera));
        debug!("Opened simulated camera {}", index);
        Ok(camera)
    }
}

struct CameraState {
    parameters: Option<Parameters>,
    orientation: u32,
    sink: Option<FrameSink>,
    previewing: bool,
    pending_focus: Option<AutoFocusCallback>,
    released: bool,
    fail_start: bool,
    calls: Vec<HardwareCall>,
}

/// Opened simulated device.
///
/// Frames and auto-focus completions are driven by the test or the demo through
/// [`deliver_frame`](Self::deliver_frame) and [`complete_auto_focus`](Self::complete_auto_focus).
pub struct SimulatedCamera {
    info: DeviceInfo,
    state: Mutex<CameraState>,
}

impl SimulatedCamera {
    fn new(spec: DeviceSpec) -> Self {
        Self {
            info: spec.info,
            state: Mutex::new(CameraState {
                parameters: spec.parameters,
                orientation: 0,
                sink: None,
                previewing: false,
                pending_focus: None,
                released: false,
                fail_start: false,
                calls: Vec::new(),
            }),
        }
    }

    pub fn info(&self) -> DeviceInfo {
        self.info
    }

    pub fn calls(&self) -> Vec<HardwareCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn call_count(&self, call: &HardwareCall) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn is_previewing(&self) -> bool {
        self.state.lock().previewing
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    pub fn display_orientation(&self) -> u32 {
        self.state.lock().orientation
    }

    pub fn current_parameters(&self) -> Option<Parameters> {
        self.state.lock().parameters.clone()
    }

    /// Make the next `start_preview` fail
    pub fn fail_next_start(&self) {
        self.state.lock().fail_start = true;
    }

    /// Hand a frame to the registered sink; false when no preview is running
    pub fn deliver_frame(&self, data: &[u8]) -> bool {
        let sink = {
            let state = self.state.lock();
            if !state.previewing || state.released {
                return false;
            }
            state.sink.clone()
        };
        match sink {
            Some(sink) => {
                sink(data);
                true
            }
            None => false,
        }
    }

    /// Resolve the outstanding focus request; false when none is pending
    pub fn complete_auto_focus(&self, success: bool) -> bool {
        let callback = self.state.lock().pending_focus.take();
        match callback {
            Some(callback) => {
                callback(success);
                true
            }
            None => false,
        }
    }

    pub fn has_pending_auto_focus(&self) -> bool {
        self.state.lock().pending_focus.is_some()
    }

    fn record(&self, call: HardwareCall) -> Result<(), CameraError> {
        let mut state = self.state.lock();
        if state.released {
            return Err(CameraError::Released);
        }
        state.calls.push(call);
        Ok(())
    }
}

impl CameraHandle for SimulatedCamera {
    fn parameters(&self) -> Option<Parameters> {
        let state = self.state.lock();
        if state.released {
            return None;
        }
        state.parameters.clone()
    }

    fn set_parameters(&self, parameters: &Parameters) -> Result<(), CameraError> {
        self.record(HardwareCall::SetParameters(parameters.clone()))?;
        self.state.lock().parameters = Some(parameters.clone());
        Ok(())
    }

    fn set_display_orientation(&self, degrees: u32) -> Result<(), CameraError> {
        self.record(HardwareCall::SetDisplayOrientation(degrees))?;
        self.state.lock().orientation = degrees;
        Ok(())
    }

    fn set_preview_display(&self, _surface: &dyn PreviewSurface) -> Result<(), CameraError> {
        self.record(HardwareCall::SetPreviewDisplay)
    }

    fn set_preview_frame_sink(&self, sink: Option<FrameSink>) -> Result<(), CameraError> {
        self.record(HardwareCall::SetFrameSink {
            attached: sink.is_some(),
        })?;
        self.state.lock().sink = sink;
        Ok(())
    }

    fn start_preview(&self) -> Result<(), CameraError> {
        self.record(HardwareCall::StartPreview)?;
        let mut state = self.state.lock();
        if state.fail_start {
            state.fail_start = false;
            return Err(CameraError::Preview {
                details: "simulated start failure".to_string(),
            });
        }
        state.previewing = true;
        Ok(())
    }

    fn stop_preview(&self) -> Result<(), CameraError> {
        self.record(HardwareCall::StopPreview)?;
        let mut state = self.state.lock();
        state.previewing = false;
        state.pending_focus = None;
        Ok(())
    }

    fn auto_focus(&self, callback: AutoFocusCallback) -> Result<(), CameraError> {
        self.record(HardwareCall::AutoFocus)?;
        let mut state = self.state.lock();
        if !state.previewing {
            return Err(CameraError::AutoFocus {
                details: "preview is not running".to_string(),
            });
        }
        state.pending_focus = Some(callback);
        Ok(())
    }

    fn cancel_auto_focus(&self) -> Result<(), CameraError> {
        self.record(HardwareCall::CancelAutoFocus)?;
        self.state.lock().pending_focus = None;
        Ok(())
    }

    fn release(&self) {
        let mut state = self.state.lock();
        if state.released {
            return;
        }
        state.calls.push(HardwareCall::Release);
        state.released = true;
        state.previewing = false;
        state.sink = None;
        state.pending_focus = None;
        debug!("Released simulated camera {}", self.info.index);
    }
}
