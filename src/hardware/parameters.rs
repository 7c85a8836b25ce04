use crate::geometry::Size;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMode {
    Auto,
    Fixed,
    Infinity,
    Macro,
    ContinuousPicture,
    ContinuousVideo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode {
    Off,
    On,
    Auto,
    Torch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneMode {
    Auto,
    Barcode,
    Action,
    Night,
}

/// Preview frame rate range in frames per second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpsRange {
    pub min: u32,
    pub max: u32,
}

/// Snapshot of a device's tunable settings and what it supports
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameters {
    pub preview_size: Option<Size>,
    pub supported_preview_sizes: Vec<Size>,
    pub focus_mode: Option<FocusMode>,
    pub supported_focus_modes: Vec<FocusMode>,
    pub flash_mode: Option<FlashMode>,
    pub supported_flash_modes: Vec<FlashMode>,
    pub scene_mode: Option<SceneMode>,
    pub supported_scene_modes: Vec<SceneMode>,
    pub fps_range: Option<FpsRange>,
    pub supported_fps_ranges: Vec<FpsRange>,
    pub video_stabilization_supported: bool,
    pub video_stabilization: bool,
}

impl Parameters {
    pub fn supports_focus_mode(&self, mode: FocusMode) -> bool {
        self.supported_focus_modes.contains(&mode)
    }

    pub fn supports_flash_mode(&self, mode: FlashMode) -> bool {
        self.supported_flash_modes.contains(&mode)
    }
}

/// Switch the focus mode; returns true when the parameters changed.
pub fn set_focus_mode(parameters: &mut Parameters, mode: FocusMode) -> bool {
    if parameters.focus_mode == Some(mode) || !parameters.supports_focus_mode(mode) {
        return false;
    }
    parameters.focus_mode = Some(mode);
    true
}

/// Switch the flash mode; returns true when the parameters changed.
pub fn set_flash_mode(parameters: &mut Parameters, mode: FlashMode) -> bool {
    if parameters.flash_mode == Some(mode) || !parameters.supports_flash_mode(mode) {
        return false;
    }
    parameters.flash_mode = Some(mode);
    true
}

/// Tune parameters for scanning: barcode scene mode, fastest preview rate,
/// no video stabilization.
pub fn optimize_parameters(mut parameters: Parameters) -> Parameters {
    if parameters
        .supported_scene_modes
        .contains(&SceneMode::Barcode)
    {
        parameters.scene_mode = Some(SceneMode::Barcode);
    }

    let fastest = parameters
        .supported_fps_ranges
        .iter()
        .copied()
        .max_by(|a, b| a.max.cmp(&b.max).then(a.min.cmp(&b.min)));
    if let Some(range) = fastest {
        parameters.fps_range = Some(range);
    }

    if parameters.video_stabilization_supported {
        parameters.video_stabilization = false;
    }

    parameters
}
