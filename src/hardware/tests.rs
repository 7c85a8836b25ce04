use super::*;
use crate::geometry::Size;

fn create_test_parameters() -> Parameters {
    Parameters {
        preview_size: Some(Size::new(640, 480)),
        supported_preview_sizes: vec![Size::new(640, 480), Size::new(1920, 1080)],
        focus_mode: Some(FocusMode::Fixed),
        supported_focus_modes: vec![FocusMode::Auto, FocusMode::Fixed],
        flash_mode: Some(FlashMode::Off),
        supported_flash_modes: vec![FlashMode::Off, FlashMode::Torch],
        scene_mode: Some(SceneMode::Auto),
        supported_scene_modes: vec![SceneMode::Auto, SceneMode::Barcode],
        fps_range: Some(FpsRange { min: 15, max: 15 }),
        supported_fps_ranges: vec![
            FpsRange { min: 15, max: 15 },
            FpsRange { min: 15, max: 30 },
            FpsRange { min: 30, max: 30 },
        ],
        video_stabilization_supported: true,
        video_stabilization: true,
    }
}

#[test]
fn test_select_first_back_facing_device() {
    let devices = [
        DeviceInfo {
            index: 0,
            facing: Facing::Front,
            orientation: 270,
        },
        DeviceInfo {
            index: 1,
            facing: Facing::Back,
            orientation: 90,
        },
        DeviceInfo {
            index: 2,
            facing: Facing::Back,
            orientation: 90,
        },
    ];

    assert_eq!(select_device(&devices, None).unwrap().index, 1);
    assert_eq!(select_device(&devices, Some(0)).unwrap().facing, Facing::Front);
}

#[test]
fn test_select_device_failures() {
    let front_only = [DeviceInfo {
        index: 0,
        facing: Facing::Front,
        orientation: 270,
    }];

    assert_eq!(
        select_device(&front_only, None),
        Err(CameraError::NoCameraAvailable)
    );
    assert_eq!(
        select_device(&front_only, Some(3)),
        Err(CameraError::InvalidDeviceIndex { index: 3, count: 1 })
    );
}

#[test]
fn test_set_focus_mode_reports_changes() {
    let mut parameters = create_test_parameters();

    assert!(set_focus_mode(&mut parameters, FocusMode::Auto));
    assert_eq!(parameters.focus_mode, Some(FocusMode::Auto));
    // Same mode again is not a change
    assert!(!set_focus_mode(&mut parameters, FocusMode::Auto));
    // Unsupported mode is ignored
    assert!(!set_focus_mode(&mut parameters, FocusMode::Macro));
    assert_eq!(parameters.focus_mode, Some(FocusMode::Auto));
}

#[test]
fn test_set_flash_mode_requires_support() {
    let mut parameters = create_test_parameters();
    assert!(set_flash_mode(&mut parameters, FlashMode::Torch));

    parameters.supported_flash_modes.clear();
    assert!(!set_flash_mode(&mut parameters, FlashMode::Off));
    assert_eq!(parameters.flash_mode, Some(FlashMode::Torch));
}

#[test]
fn test_optimize_parameters() {
    let optimized = optimize_parameters(create_test_parameters());

    assert_eq!(optimized.scene_mode, Some(SceneMode::Barcode));
    assert_eq!(optimized.fps_range, Some(FpsRange { min: 30, max: 30 }));
    assert!(!optimized.video_stabilization);
}
