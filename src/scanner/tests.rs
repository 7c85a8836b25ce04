use super::*;
use crate::decoder::{
    DecodeAttempt, DecodeTask, Decoder, DecoderFactory, DecoderState, ScanResult, StateListener,
};
use crate::error::{CameraError, DecoderError, ScannerError};
use crate::format::{BarcodeFormat, FormatSet};
use crate::geometry::Size;
use crate::hardware::{CameraHandle, FlashMode, FocusMode};
use crate::simulated::{
    DeviceSpec, HardwareCall, SimulatedCamera, SimulatedCameraProvider, SimulatedView,
};
use crate::surface::SurfaceEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing_test::traced_test;

const VIEWPORT: Size = Size {
    width: 1080,
    height: 1920,
};

/// Geometry of a submitted frame
#[derive(Debug, Clone, Copy, PartialEq)]
struct Submission {
    preview_size: Size,
    frame_size: Size,
    orientation: u32,
    square_frame: bool,
    mirrored: bool,
}

/// Decoder whose attempts are resolved by the test
struct MockDecoder {
    listener: StateListener,
    state: Mutex<DecoderState>,
    formats: Mutex<FormatSet>,
    starts: Mutex<usize>,
    shut_down: Mutex<bool>,
    in_flight: Mutex<Option<DecodeTask>>,
    submissions: Mutex<Vec<Submission>>,
}

impl MockDecoder {
    fn set_state(&self, state: DecoderState) {
        *self.state.lock() = state;
        (self.listener)(state);
    }

    fn resolve(&self, attempt: DecodeAttempt) {
        let task = self.in_flight.lock().take().expect("no frame in flight");
        if matches!(attempt, DecodeAttempt::Decoded(_)) {
            self.set_state(DecoderState::Decoded);
        }
        (task.callback)(attempt);
        self.set_state(DecoderState::Idle);
    }

    fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }
}

impl Decoder for MockDecoder {
    fn set_formats(&self, formats: &FormatSet) {
        *self.formats.lock() = formats.clone();
    }

    fn start(&self) -> Result<(), DecoderError> {
        *self.starts.lock() += 1;
        Ok(())
    }

    fn decode(&self, task: DecodeTask) -> Result<(), DecoderError> {
        if *self.shut_down.lock() {
            return Err(DecoderError::Stopped);
        }
        if *self.state.lock() != DecoderState::Idle {
            return Err(DecoderError::Busy);
        }
        self.submissions.lock().push(Submission {
            preview_size: task.preview_size,
            frame_size: task.frame_size,
            orientation: task.orientation,
            square_frame: task.square_frame,
            mirrored: task.mirrored,
        });
        *self.in_flight.lock() = Some(task);
        self.set_state(DecoderState::Processing);
        Ok(())
    }

    fn state(&self) -> DecoderState {
        *self.state.lock()
    }

    fn shutdown(&self) {
        *self.shut_down.lock() = true;
    }
}

#[derive(Default)]
struct MockDecoderFactory {
    created: Mutex<Vec<Arc<MockDecoder>>>,
}

impl MockDecoderFactory {
    fn last(&self) -> Arc<MockDecoder> {
        self.created.lock().last().cloned().expect("no decoder created")
    }

    fn count(&self) -> usize {
        self.created.lock().len()
    }
}

impl DecoderFactory for MockDecoderFactory {
    fn create(
        &self,
        formats: FormatSet,
        listener: StateListener,
    ) -> Result<Arc<dyn Decoder>, DecoderError> {
        let decoder = Arc::new(MockDecoder {
            listener,
            state: Mutex::new(DecoderState::Idle),
            formats: Mutex::new(formats),
            starts: Mutex::new(0),
            shut_down: Mutex::new(false),
            in_flight: Mutex::new(None),
            submissions: Mutex::new(Vec::new()),
        });
        self.created.lock().push(Arc::clone(&decoder));
        Ok(decoder)
    }
}

struct Harness {
    provider: Arc<SimulatedCameraProvider>,
    view: Arc<SimulatedView>,
    decoders: Arc<MockDecoderFactory>,
    scanner: CodeScanner,
    main_loop: MainLoop,
}

impl Harness {
    fn new(builder: CodeScannerBuilder, devices: Vec<DeviceSpec>, view: SimulatedView) -> Self {
        let provider = Arc::new(SimulatedCameraProvider::new(devices));
        let view = Arc::new(view);
        let decoders = Arc::new(MockDecoderFactory::default());
        let (scanner, main_loop) = builder
            .decoder_factory(decoders.clone())
            .build(provider.clone(), view.clone());
        Self {
            provider,
            view,
            decoders,
            scanner,
            main_loop,
        }
    }

    fn with_back_camera() -> Self {
        Self::new(
            CodeScannerBuilder::new(),
            vec![DeviceSpec::back_camera(0)],
            SimulatedView::new(VIEWPORT),
        )
    }

    /// Run the next main loop action, failing the test if none arrives
    async fn turn(&mut self) -> crate::error::Result<bool> {
        tokio::time::timeout(Duration::from_secs(5), self.main_loop.turn())
            .await
            .expect("main loop did not receive an action")
    }

    /// Start the preview and wait for initialization to finish
    async fn start(&mut self) {
        self.scanner.start_preview();
        assert!(self.turn().await.unwrap());
    }

    fn camera(&self) -> Arc<SimulatedCamera> {
        self.provider.last_opened().expect("no camera opened")
    }

    fn frame(&self) -> bool {
        self.camera().deliver_frame(&[0; 16])
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

fn ready_with(preview: PreviewPhase) -> ControllerState {
    ControllerState {
        lifecycle: LifecyclePhase::Ready,
        preview,
        focus: FocusPhase::NotFocusing,
    }
}

fn uninitialized() -> ControllerState {
    ControllerState {
        lifecycle: LifecyclePhase::Uninitialized,
        preview: PreviewPhase::Inactive,
        focus: FocusPhase::NotFocusing,
    }
}

#[tokio::test]
async fn test_start_preview_initializes_and_starts() {
    let mut h = Harness::with_back_camera();
    assert_eq!(h.scanner.state(), uninitialized());

    h.start().await;

    assert_eq!(h.provider.open_count(), 1);
    assert_eq!(h.decoders.count(), 1);
    assert_eq!(*h.decoders.last().starts.lock(), 1);
    assert_eq!(h.scanner.state(), ready_with(PreviewPhase::Active));
    assert!(h.scanner.is_preview_active());

    let camera = h.camera();
    assert!(camera.is_previewing());
    assert_eq!(camera.display_orientation(), 90);
    assert_eq!(camera.call_count(&HardwareCall::StartPreview), 1);
    assert!(h.view.simulated_surface().has_listener());
    assert_eq!(h.view.frame_size(), Some(Size::new(1080, 1920)));
    assert_eq!(h.scanner.frame_size(), Some(Size::new(1080, 1920)));

    let parameters = camera.current_parameters().unwrap();
    assert_eq!(parameters.preview_size, Some(Size::new(1920, 1080)));
    assert_eq!(parameters.focus_mode, Some(FocusMode::Auto));
}

#[tokio::test]
async fn test_start_while_initializing_is_ignored() {
    let mut h = Harness::with_back_camera();

    h.scanner.start_preview();
    h.scanner.start_preview();
    assert!(h.turn().await.unwrap());
    h.scanner.start_preview();

    assert_eq!(h.provider.open_count(), 1);
    assert_eq!(h.camera().call_count(&HardwareCall::StartPreview), 1);
}

#[tokio::test]
async fn test_only_one_frame_in_flight() {
    let mut h = Harness::with_back_camera();
    h.start().await;

    assert!(h.frame());
    assert!(h.frame());
    assert!(h.frame());

    let decoder = h.decoders.last();
    assert_eq!(decoder.submissions().len(), 1);
    assert_eq!(
        decoder.submissions()[0],
        Submission {
            preview_size: Size::new(1920, 1080),
            frame_size: Size::new(1080, 1920),
            orientation: 90,
            square_frame: false,
            mirrored: false,
        }
    );

    decoder.resolve(DecodeAttempt::NotFound);
    h.frame();
    assert_eq!(decoder.submissions().len(), 2);

    decoder.resolve(DecodeAttempt::Failed(DecoderError::Decode {
        details: "checksum".to_string(),
    }));
    h.frame();
    assert_eq!(decoder.submissions().len(), 3);
}

#[tokio::test]
async fn test_decoded_result_stops_preview() {
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    let mut h = Harness::new(
        CodeScannerBuilder::new().on_decoded(move |result: &ScanResult| sink.lock().push(result.text.clone())),
        vec![DeviceSpec::back_camera(0)],
        SimulatedView::new(VIEWPORT),
    );
    h.start().await;

    h.frame();
    let decoder = h.decoders.last();
    decoder.resolve(DecodeAttempt::Decoded(ScanResult::new(
        BarcodeFormat::QrCode,
        "hello".to_string(),
    )));

    assert_eq!(*results.lock(), vec!["hello".to_string()]);
    assert_eq!(h.scanner.state().preview, PreviewPhase::Stopping);

    // Frames arriving before the stop runs are dropped
    h.frame();
    assert_eq!(decoder.submissions().len(), 1);

    // Runs the posted stop
    assert!(h.turn().await.unwrap());
    assert_eq!(h.scanner.state(), ready_with(PreviewPhase::Inactive));
    assert!(!h.camera().is_previewing());
    assert!(!h.view.simulated_surface().has_listener());
}

#[tokio::test]
async fn test_surface_changed_without_drawable_touches_no_hardware() {
    let mut h = Harness::with_back_camera();
    h.start().await;
    let camera = h.camera();
    camera.clear_calls();

    h.view.simulated_surface().emit(SurfaceEvent::Changed {
        width: 1080,
        height: 1920,
        drawable_available: false,
    });

    assert_eq!(h.scanner.state(), ready_with(PreviewPhase::Inactive));
    assert!(camera.calls().is_empty());
}

#[tokio::test]
async fn test_decode_after_drawable_loss_still_stops_stream() {
    let results = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&results);
    let mut h = Harness::new(
        CodeScannerBuilder::new().on_decoded(move |_: &ScanResult| *counter.lock() += 1),
        vec![DeviceSpec::back_camera(0)],
        SimulatedView::new(VIEWPORT),
    );
    h.start().await;
    h.view.simulated_surface().emit(SurfaceEvent::Changed {
        width: 1080,
        height: 1920,
        drawable_available: false,
    });

    // The stream keeps running, so frames still reach the decoder
    assert!(h.frame());
    let decoder = h.decoders.last();
    assert_eq!(decoder.submissions().len(), 1);

    decoder.resolve(DecodeAttempt::Decoded(ScanResult::new(
        BarcodeFormat::QrCode,
        "once".to_string(),
    )));
    assert_eq!(h.scanner.state().preview, PreviewPhase::Stopping);

    h.frame();
    h.frame();
    assert_eq!(decoder.submissions().len(), 1);

    assert!(h.turn().await.unwrap());
    assert_eq!(h.scanner.state(), ready_with(PreviewPhase::Inactive));
    assert!(!h.camera().is_previewing());
    assert!(!h.frame());
    assert_eq!(*results.lock(), 1);
}

#[tokio::test]
async fn test_surface_changed_restarts_preview() {
    let mut h = Harness::with_back_camera();
    h.start().await;
    let camera = h.camera();
    camera.clear_calls();

    h.view.simulated_surface().emit(SurfaceEvent::Changed {
        width: 1920,
        height: 1080,
        drawable_available: true,
    });

    let calls = camera.calls();
    let stop = calls.iter().position(|c| *c == HardwareCall::StopPreview);
    let start = calls.iter().position(|c| *c == HardwareCall::StartPreview);
    assert!(stop.is_some() && start.is_some());
    assert!(stop < start);
    assert_eq!(h.scanner.state(), ready_with(PreviewPhase::Active));
}

#[tokio::test]
async fn test_surface_destroyed_and_recreated() {
    let mut h = Harness::with_back_camera();
    h.start().await;
    let surface = h.view.simulated_surface();

    surface.emit(SurfaceEvent::Destroyed);
    assert!(!h.scanner.is_preview_active());
    assert!(!h.camera().is_previewing());
    // Internal stops keep listening for the surface
    assert!(surface.has_listener());

    surface.emit(SurfaceEvent::Created);
    assert!(h.scanner.is_preview_active());
    assert!(h.camera().is_previewing());
}

#[tokio::test]
async fn test_stop_and_restart_on_existing_session() {
    let mut h = Harness::with_back_camera();
    h.start().await;

    h.scanner.stop_preview();
    h.scanner.stop_preview();
    assert_eq!(h.scanner.state(), ready_with(PreviewPhase::Inactive));
    assert!(!h.frame());

    h.scanner.start_preview();
    assert_eq!(h.scanner.state(), ready_with(PreviewPhase::Active));
    assert_eq!(h.provider.open_count(), 1);
    assert_eq!(h.camera().call_count(&HardwareCall::StopPreview), 1);
}

#[tokio::test]
#[traced_test]
async fn test_start_failure_is_absorbed() {
    let mut h = Harness::with_back_camera();
    h.start().await;
    h.scanner.stop_preview();

    h.camera().fail_next_start();
    h.scanner.start_preview();
    assert_eq!(h.scanner.state(), ready_with(PreviewPhase::Inactive));
    assert!(logs_contain("Failed to start preview, retrying on next trigger"));

    h.scanner.start_preview();
    assert_eq!(h.scanner.state(), ready_with(PreviewPhase::Active));
}

#[tokio::test]
async fn test_release_resources_frees_session() {
    let mut h = Harness::with_back_camera();
    h.start().await;
    let camera = h.camera();
    let decoder = h.decoders.last();

    h.scanner.release_resources();

    assert_eq!(h.scanner.state(), uninitialized());
    assert!(camera.is_released());
    assert!(*decoder.shut_down.lock());
    assert_eq!(camera.call_count(&HardwareCall::Release), 1);
    assert!(!h.view.simulated_surface().has_listener());

    h.scanner.release_resources();
    h.scanner.stop_preview();
    assert_eq!(h.scanner.state(), uninitialized());
    assert!(h.scanner.is_auto_focus_supported_or_unknown());
    assert!(h.scanner.is_flash_supported_or_unknown());

    // A fresh start opens a new session
    h.start().await;
    assert_eq!(h.provider.open_count(), 2);
    assert_eq!(h.scanner.state(), ready_with(PreviewPhase::Active));
}

#[tokio::test]
async fn test_release_during_initialization_abandons_attempt() {
    let mut h = Harness::with_back_camera();

    h.scanner.start_preview();
    h.scanner.release_resources();
    assert_eq!(h.scanner.state(), uninitialized());

    let provider = Arc::clone(&h.provider);
    wait_until(|| {
        provider
            .last_opened()
            .is_some_and(|camera| camera.is_released())
    })
    .await;

    h.main_loop.run_pending().unwrap();
    assert_eq!(h.scanner.state(), uninitialized());
    assert_eq!(h.view.frame_size(), None);
}

#[tokio::test]
async fn test_late_finish_after_release_is_ignored() {
    let mut h = Harness::with_back_camera();

    h.scanner.start_preview();
    let provider = Arc::clone(&h.provider);
    wait_until(|| provider.open_count() == 1).await;
    let scanner = &h.scanner;
    wait_until(|| scanner.state().lifecycle == LifecyclePhase::Ready).await;

    h.scanner.release_resources();
    assert!(h.turn().await.unwrap());

    assert_eq!(h.scanner.state(), uninitialized());
    assert!(h.camera().is_released());
    assert_eq!(h.camera().call_count(&HardwareCall::StartPreview), 0);
    assert_eq!(h.view.frame_size(), None);
}

#[tokio::test]
async fn test_init_failure_without_error_callback_ends_loop() {
    let mut h = Harness::new(
        CodeScannerBuilder::new(),
        vec![DeviceSpec::front_camera(0)],
        SimulatedView::new(VIEWPORT),
    );

    h.scanner.start_preview();
    let result = h.turn().await;

    assert!(matches!(
        result,
        Err(ScannerError::Camera(CameraError::NoCameraAvailable))
    ));
    assert_eq!(h.scanner.state(), uninitialized());
    assert_eq!(h.provider.open_count(), 0);
}

#[tokio::test]
async fn test_init_failure_reported_to_error_callback() {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let mut h = Harness::new(
        CodeScannerBuilder::new()
            .camera(3)
            .on_error(move |error: &ScannerError| sink.lock().push(error.to_string())),
        vec![DeviceSpec::back_camera(0)],
        SimulatedView::new(VIEWPORT),
    );

    h.scanner.start_preview();
    assert!(h.turn().await.unwrap());

    assert_eq!(errors.lock().len(), 1);
    assert!(errors.lock()[0].contains("out of range"));
    assert_eq!(h.scanner.state(), uninitialized());
}

#[tokio::test]
async fn test_unreadable_parameters_release_the_camera() {
    let mut h = Harness::new(
        CodeScannerBuilder::new(),
        vec![DeviceSpec::back_camera(0).without_parameters()],
        SimulatedView::new(VIEWPORT),
    );

    h.scanner.start_preview();
    let result = h.turn().await;

    assert!(matches!(
        result,
        Err(ScannerError::Camera(CameraError::ParametersUnavailable))
    ));
    assert!(h.camera().is_released());
    assert_eq!(h.decoders.count(), 0);
}

#[tokio::test]
async fn test_front_camera_frames_are_mirrored() {
    let mut h = Harness::new(
        CodeScannerBuilder::new().camera(1),
        vec![DeviceSpec::back_camera(0), DeviceSpec::front_camera(1)],
        SimulatedView::new(VIEWPORT).with_square_frame(true),
    );
    h.start().await;

    assert_eq!(h.camera().info().index, 1);
    h.frame();
    let submission = h.decoders.last().submissions()[0];
    assert!(submission.mirrored);
    assert!(submission.square_frame);
    assert_eq!(submission.orientation, 90);
}

#[tokio::test]
async fn test_initialization_waits_for_layout() {
    let mut h = Harness::new(
        CodeScannerBuilder::new(),
        vec![DeviceSpec::back_camera(0)],
        SimulatedView::unlaid(),
    );

    h.scanner.start_preview();
    assert_eq!(h.scanner.state().lifecycle, LifecyclePhase::Initializing);
    assert!(h.view.has_layout_listener());
    assert_eq!(h.provider.open_count(), 0);

    h.view.lay_out(VIEWPORT);
    assert!(!h.view.has_layout_listener());
    assert!(h.turn().await.unwrap());

    assert_eq!(h.provider.open_count(), 1);
    assert_eq!(h.scanner.state(), ready_with(PreviewPhase::Active));
}

#[tokio::test]
async fn test_auto_focus_backs_off_until_threshold() {
    let mut h = Harness::with_back_camera();
    h.start().await;
    let camera = h.camera();
    let shared = Arc::clone(&h.scanner.shared);

    shared.auto_focus_tick();
    assert_eq!(camera.call_count(&HardwareCall::AutoFocus), 1);
    assert_eq!(h.scanner.state().focus, FocusPhase::Focusing);

    // Outstanding request: wait for two ticks, then issue again
    shared.auto_focus_tick();
    shared.auto_focus_tick();
    assert_eq!(camera.call_count(&HardwareCall::AutoFocus), 1);
    shared.auto_focus_tick();
    assert_eq!(camera.call_count(&HardwareCall::AutoFocus), 2);

    assert!(camera.complete_auto_focus(true));
    assert_eq!(h.scanner.state().focus, FocusPhase::NotFocusing);
    shared.auto_focus_tick();
    assert_eq!(camera.call_count(&HardwareCall::AutoFocus), 3);

    // Every tick re-armed the same single timer
    h.main_loop.run_pending().unwrap();
    assert_eq!(h.main_loop.pending_timers(), 1);
}

#[tokio::test]
async fn test_auto_focus_stops_rearming_when_preview_stops() {
    let mut h = Harness::with_back_camera();
    h.start().await;
    h.main_loop.run_pending().unwrap();
    assert_eq!(h.main_loop.pending_timers(), 1);

    h.scanner.stop_preview();
    h.scanner.shared.auto_focus_tick();
    h.main_loop.run_pending().unwrap();

    assert_eq!(h.camera().call_count(&HardwareCall::AutoFocus), 0);
    // Only the timer armed by the start remains
    assert_eq!(h.main_loop.pending_timers(), 1);
}

#[tokio::test]
async fn test_auto_focus_unsupported_device() {
    let mut h = Harness::new(
        CodeScannerBuilder::new(),
        vec![DeviceSpec::back_camera(0).without_auto_focus()],
        SimulatedView::new(VIEWPORT),
    );
    assert!(h.scanner.is_auto_focus_supported_or_unknown());
    h.start().await;

    assert!(!h.scanner.is_auto_focus_enabled());
    h.scanner.set_auto_focus_enabled(true);
    assert!(h.scanner.is_auto_focus_enabled());
    assert!(!h.scanner.is_auto_focus_supported_or_unknown());

    for _ in 0..5 {
        h.scanner.shared.auto_focus_tick();
    }
    assert_eq!(h.camera().call_count(&HardwareCall::AutoFocus), 0);
}

#[tokio::test]
async fn test_toggle_auto_focus_while_previewing() {
    let mut h = Harness::with_back_camera();
    h.start().await;
    h.main_loop.run_pending().unwrap();
    let camera = h.camera();
    let shared = Arc::clone(&h.scanner.shared);
    shared.auto_focus_tick();
    camera.clear_calls();

    h.scanner.set_auto_focus_enabled(false);
    assert_eq!(camera.call_count(&HardwareCall::CancelAutoFocus), 1);
    assert_eq!(
        camera.current_parameters().unwrap().focus_mode,
        Some(FocusMode::Fixed)
    );
    assert_eq!(h.scanner.state().focus, FocusPhase::NotFocusing);
    assert_eq!(h.view.auto_focus_indicator(), Some(false));

    shared.auto_focus_tick();
    assert_eq!(camera.call_count(&HardwareCall::AutoFocus), 0);

    h.scanner.set_auto_focus_enabled(true);
    assert_eq!(
        camera.current_parameters().unwrap().focus_mode,
        Some(FocusMode::Auto)
    );
    assert_eq!(h.view.auto_focus_indicator(), Some(true));
    h.main_loop.run_pending().unwrap();
    assert_eq!(h.main_loop.pending_timers(), 1);

    shared.auto_focus_tick();
    assert_eq!(camera.call_count(&HardwareCall::AutoFocus), 1);
}

#[tokio::test]
async fn test_flash_follows_explicit_start_and_stop() {
    let mut h = Harness::new(
        CodeScannerBuilder::new().flash(true),
        vec![DeviceSpec::back_camera(0)],
        SimulatedView::new(VIEWPORT),
    );
    h.start().await;
    let camera = h.camera();

    assert!(h.scanner.is_flash_enabled());
    assert_eq!(
        camera.current_parameters().unwrap().flash_mode,
        Some(FlashMode::Torch)
    );

    // Surface restarts leave the torch alone
    camera.clear_calls();
    h.view.simulated_surface().emit(SurfaceEvent::Destroyed);
    assert!(!camera
        .calls()
        .iter()
        .any(|call| matches!(call, HardwareCall::SetParameters(_))));
    h.view.simulated_surface().emit(SurfaceEvent::Created);

    h.scanner.stop_preview();
    assert_eq!(
        camera.current_parameters().unwrap().flash_mode,
        Some(FlashMode::Off)
    );

    h.scanner.start_preview();
    h.scanner.set_flash_enabled(false);
    assert_eq!(
        camera.current_parameters().unwrap().flash_mode,
        Some(FlashMode::Off)
    );
    assert_eq!(h.view.flash_indicator(), Some(false));
}

#[tokio::test]
async fn test_flash_unsupported_is_forced_off() {
    let mut h = Harness::new(
        CodeScannerBuilder::new().flash(true),
        vec![DeviceSpec::back_camera(0).without_flash()],
        SimulatedView::new(VIEWPORT),
    );
    h.start().await;

    assert!(!h.scanner.is_flash_enabled());
    assert!(!h.scanner.is_flash_supported_or_unknown());

    h.camera().clear_calls();
    h.scanner.set_flash_enabled(true);
    assert!(h.scanner.is_flash_enabled());
    assert!(h.camera().calls().is_empty());
}

#[tokio::test]
async fn test_set_formats_before_and_after_initialization() {
    let mut h = Harness::with_back_camera();

    h.scanner.set_format(BarcodeFormat::QrCode);
    assert_eq!(h.scanner.formats(), FormatSet::single(BarcodeFormat::QrCode));

    h.start().await;
    let decoder = h.decoders.last();
    assert_eq!(*decoder.formats.lock(), FormatSet::single(BarcodeFormat::QrCode));

    h.scanner.set_formats(FormatSet::one_dimensional());
    assert_eq!(*decoder.formats.lock(), FormatSet::one_dimensional());
    assert_eq!(h.scanner.configuration().formats, FormatSet::one_dimensional());
}

#[tokio::test]
async fn test_builder_applies_config() {
    let mut config = crate::config::ScannerConfig::default();
    config.scanner.camera_index = Some(1);
    config.scanner.formats = vec![BarcodeFormat::Ean13, BarcodeFormat::QrCode];
    config.scanner.auto_focus = false;
    config.auto_focus.interval_ms = 250;

    let builder = CodeScannerBuilder::from_config(&config).unwrap();
    let h = Harness::new(
        builder,
        vec![DeviceSpec::back_camera(0), DeviceSpec::back_camera(1)],
        SimulatedView::new(VIEWPORT),
    );

    let configuration = h.scanner.configuration();
    assert_eq!(configuration.camera_index, Some(1));
    assert_eq!(configuration.formats.len(), 2);
    assert!(!configuration.auto_focus_enabled);
    assert_eq!(h.scanner.shared.timing.interval, Duration::from_millis(250));
    assert_eq!(h.view.auto_focus_indicator(), Some(false));
}

#[tokio::test]
async fn test_dropping_scanner_releases_camera() {
    let mut h = Harness::with_back_camera();
    h.start().await;
    let camera = h.camera();

    let Harness {
        scanner, main_loop, ..
    } = h;
    drop(scanner);

    assert!(camera.is_released());
    // The loop ends once its scanner is gone
    main_loop.run().await.unwrap();
}

#[tokio::test]
#[traced_test]
async fn test_lost_camera_is_logged_as_error() {
    let mut h = Harness::with_back_camera();
    h.start().await;
    h.scanner.stop_preview();

    h.camera().release();
    h.scanner.start_preview();

    assert_eq!(h.scanner.state(), ready_with(PreviewPhase::Inactive));
    assert!(logs_contain("Failed to start preview: Camera has been released"));
}

#[tokio::test]
#[traced_test]
async fn test_stopped_decoder_is_logged_as_error() {
    let mut h = Harness::with_back_camera();
    h.start().await;
    let decoder = h.decoders.last();
    decoder.shutdown();

    assert!(h.frame());
    assert!(decoder.submissions().is_empty());
    assert!(logs_contain("Frame not submitted: Decoder error: Decoder is not running"));
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Start,
    Stop,
    Release,
    RunPending,
    SurfaceChanged,
}

const STEPS: [Step; 5] = [
    Step::Start,
    Step::Stop,
    Step::Release,
    Step::RunPending,
    Step::SurfaceChanged,
];

fn assert_consistent(h: &Harness, sequence: &[Step]) {
    let state = h.scanner.state();
    if state.lifecycle != LifecyclePhase::Ready {
        assert_eq!(state.preview, PreviewPhase::Inactive, "after {:?}", sequence);
        assert_eq!(state.focus, FocusPhase::NotFocusing, "after {:?}", sequence);
    }
    for camera in h.provider.opened() {
        if camera.is_previewing() {
            assert_eq!(state.lifecycle, LifecyclePhase::Ready, "after {:?}", sequence);
        }
    }
}

#[tokio::test]
async fn test_every_short_call_sequence_keeps_state_consistent() {
    const LENGTH: u32 = 4;

    for code in 0..STEPS.len().pow(LENGTH) {
        let mut h = Harness::with_back_camera();
        let mut remaining = code;
        let mut sequence = Vec::new();

        for _ in 0..LENGTH {
            let step = STEPS[remaining % STEPS.len()];
            remaining /= STEPS.len();
            sequence.push(step);

            match step {
                Step::Start => h.scanner.start_preview(),
                Step::Stop => h.scanner.stop_preview(),
                Step::Release => h.scanner.release_resources(),
                Step::RunPending => {
                    h.main_loop.run_pending().unwrap();
                }
                Step::SurfaceChanged => {
                    h.view.simulated_surface().emit(SurfaceEvent::Changed {
                        width: 1920,
                        height: 1080,
                        drawable_available: true,
                    });
                }
            }
            assert_consistent(&h, &sequence);

            if matches!(step, Step::Release) {
                assert_eq!(h.scanner.state(), uninitialized(), "after {:?}", sequence);
                let provider = Arc::clone(&h.provider);
                wait_until(|| provider.opened().iter().all(|camera| camera.is_released())).await;
            }
        }
    }
}
