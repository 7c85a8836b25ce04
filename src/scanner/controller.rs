use super::autofocus::AutoFocusTiming;
use super::init::InitializationWorker;
use super::main_loop::{Action, MainThreadHandle};
use super::state::{ControllerState, Lifecycle, LifecyclePhase, PreviewPhase, ScanConfiguration};
use crate::decoder::{
    DecodeAttempt, DecodeTask, DecoderFactory, DecoderState, ResultCallback, ScanResult,
    StateListener,
};
use crate::error::{CameraError, DecoderError, Result, ScannerError};
use crate::format::{BarcodeFormat, FormatSet};
use crate::geometry::Size;
use crate::hardware::{
    set_flash_mode, set_focus_mode, CameraHandle, CameraProvider, FlashMode, FocusMode,
    FrameSink,
};
use crate::surface::{PreviewSurface, ScannerView, SurfaceEvent, SurfaceListener};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, trace, warn};

pub type DecodeCallback = Arc<dyn Fn(&ScanResult) + Send + Sync>;

pub type ErrorCallback = Arc<dyn Fn(&ScannerError) + Send + Sync>;

/// Preview/decode lifecycle controller.
///
/// Public methods are meant to be called from the interactive thread, the same
/// one that drives the [`MainLoop`](super::MainLoop) returned alongside it.
pub struct CodeScanner {
    pub(super) shared: Arc<Shared>,
}

pub(crate) struct Shared {
    pub(super) provider: Arc<dyn CameraProvider>,
    pub(super) view: Arc<dyn ScannerView>,
    pub(super) surface: Arc<dyn PreviewSurface>,
    pub(super) decoder_factory: Arc<dyn DecoderFactory>,
    pub(super) main_thread: MainThreadHandle,
    pub(super) timing: AutoFocusTiming,
    pub(super) inner: Mutex<Inner>,
    pub(super) weak_self: Weak<Shared>,
}

pub(super) struct Inner {
    pub(super) config: ScanConfiguration,
    pub(super) lifecycle: Lifecycle,
    pub(super) last_attempt: u64,
    pub(super) decode_callback: Option<DecodeCallback>,
    pub(super) error_callback: Option<ErrorCallback>,
}

/// Hardware handles copied out of the session so the lock is not held across calls
struct SessionHandles {
    id: u64,
    camera: Arc<dyn CameraHandle>,
    flash_supported: bool,
    flash_enabled: bool,
}

pub(super) struct SharedParts {
    pub(super) provider: Arc<dyn CameraProvider>,
    pub(super) view: Arc<dyn ScannerView>,
    pub(super) decoder_factory: Arc<dyn DecoderFactory>,
    pub(super) timing: AutoFocusTiming,
    pub(super) config: ScanConfiguration,
    pub(super) decode_callback: Option<DecodeCallback>,
    pub(super) error_callback: Option<ErrorCallback>,
}

impl Shared {
    pub(super) fn new(parts: SharedParts, main_thread: MainThreadHandle, weak_self: Weak<Shared>) -> Self {
        let surface = parts.view.surface();
        Self {
            provider: parts.provider,
            view: parts.view,
            surface,
            decoder_factory: parts.decoder_factory,
            main_thread,
            timing: parts.timing,
            inner: Mutex::new(Inner {
                config: parts.config,
                lifecycle: Lifecycle::Uninitialized,
                last_attempt: 0,
                decode_callback: parts.decode_callback,
                error_callback: parts.error_callback,
            }),
            weak_self,
        }
    }

    pub(crate) fn handle_action(&self, action: Action) -> Result<()> {
        match action {
            Action::StopPreview => self.stop_preview(),
            Action::AutoFocus => self.auto_focus_tick(),
            Action::FinishInitialization {
                attempt,
                frame_size,
            } => self.finish_initialization(attempt, frame_size),
            Action::InitializationFailed(error) => return self.report_initialization_failure(error),
        }
        Ok(())
    }

    fn session_handles(&self) -> Option<SessionHandles> {
        let inner = self.inner.lock();
        let flash_enabled = inner.config.flash_enabled;
        inner.lifecycle.ready().map(|ready| SessionHandles {
            id: ready.session.id,
            camera: Arc::clone(&ready.session.camera),
            flash_supported: ready.session.flash_supported,
            flash_enabled,
        })
    }

    pub(super) fn start_preview(&self) {
        let attempt = {
            let mut inner = self.inner.lock();
            match inner.lifecycle.phase() {
                LifecyclePhase::Uninitialized => {
                    inner.last_attempt += 1;
                    let attempt = inner.last_attempt;
                    inner.lifecycle = Lifecycle::Initializing { attempt };
                    attempt
                }
                LifecyclePhase::Initializing => {
                    debug!("Initialization already in progress");
                    return;
                }
                LifecyclePhase::Ready => {
                    if inner.lifecycle.ready().is_some_and(|ready| ready.is_running()) {
                        return;
                    }
                    drop(inner);
                    self.surface.set_listener(Some(self.surface_listener()));
                    self.start_preview_internal(false);
                    return;
                }
            }
        };

        self.initialize(attempt);
    }

    pub(super) fn stop_preview(&self) {
        let running = self
            .inner
            .lock()
            .lifecycle
            .ready()
            .is_some_and(|ready| ready.is_running());
        if running {
            self.surface.set_listener(None);
            self.stop_preview_internal(false);
        }
    }

    pub(super) fn release_resources(&self) {
        let running = {
            let mut inner = self.inner.lock();
            match inner.lifecycle.phase() {
                LifecyclePhase::Uninitialized => return,
                LifecyclePhase::Initializing => {
                    info!("Abandoning camera initialization in progress");
                    inner.lifecycle = Lifecycle::Uninitialized;
                    drop(inner);
                    self.view.set_layout_listener(None);
                    return;
                }
                LifecyclePhase::Ready => inner
                    .lifecycle
                    .ready()
                    .is_some_and(|ready| ready.is_running()),
            }
        };

        if running {
            self.stop_preview();
        }
        self.surface.set_listener(None);

        let previous = std::mem::replace(&mut self.inner.lock().lifecycle, Lifecycle::Uninitialized);
        if let Lifecycle::Ready(ready) = previous {
            ready.session.release();
        }
    }

    fn initialize(&self, attempt: u64) {
        match self.view.viewport() {
            Some(viewport) if !viewport.is_empty() => self.launch_worker(attempt, viewport),
            _ => {
                debug!("Scanner view is not laid out yet; deferring initialization");
                let weak = self.weak_self.clone();
                self.view.set_layout_listener(Some(Arc::new(move |viewport: Size| {
                    if let Some(shared) = weak.upgrade() {
                        shared.view.set_layout_listener(None);
                        shared.launch_worker(attempt, viewport);
                    }
                })));
            }
        }
    }

    fn launch_worker(&self, attempt: u64, viewport: Size) {
        if !self.inner.lock().lifecycle.is_initializing(attempt) {
            debug!("Initialization attempt {} was abandoned before launch", attempt);
            return;
        }
        let Some(shared) = self.weak_self.upgrade() else {
            return;
        };

        if let Err(e) = InitializationWorker::new(shared, attempt, viewport).spawn() {
            self.fail_initialization(attempt, ScannerError::Io(e));
        }
    }

    fn finish_initialization(&self, attempt: u64, frame_size: Size) {
        let current = self
            .inner
            .lock()
            .lifecycle
            .ready()
            .is_some_and(|ready| ready.session.id == attempt);
        if !current {
            debug!("Ignoring completion of stale initialization attempt {}", attempt);
            return;
        }

        self.view.set_frame_size(frame_size);
        self.start_preview();
    }

    fn start_preview_internal(&self, internal: bool) {
        let Some(handles) = self.session_handles() else {
            return;
        };

        if let Err(e) = self.begin_preview(&handles, internal) {
            log_hardware_failure("start preview", &e);
            return;
        }

        let started = match self.inner.lock().lifecycle.session_mut(handles.id) {
            Some(ready) => {
                ready.set_preview(PreviewPhase::Active);
                true
            }
            None => false,
        };
        if started {
            info!("Preview started");
            self.schedule_auto_focus();
        }
    }

    fn begin_preview(&self, handles: &SessionHandles, internal: bool) -> std::result::Result<(), CameraError> {
        handles
            .camera
            .set_preview_frame_sink(Some(self.frame_sink()))?;
        handles.camera.set_preview_display(self.surface.as_ref())?;
        if !internal && handles.flash_supported && handles.flash_enabled {
            self.apply_flash(handles.camera.as_ref(), true);
        }
        handles.camera.start_preview()
    }

    fn stop_preview_internal(&self, internal: bool) {
        let Some(handles) = self.session_handles() else {
            return;
        };

        if let Err(e) = Self::end_preview(&handles, internal) {
            log_hardware_failure("stop preview", &e);
        }

        if let Some(ready) = self.inner.lock().lifecycle.session_mut(handles.id) {
            ready.set_preview(PreviewPhase::Inactive);
        }
        info!("Preview stopped");
    }

    fn end_preview(handles: &SessionHandles, internal: bool) -> std::result::Result<(), CameraError> {
        let camera = handles.camera.as_ref();
        if !internal && handles.flash_supported && handles.flash_enabled {
            if let Some(mut parameters) = camera.parameters() {
                if set_flash_mode(&mut parameters, FlashMode::Off) {
                    camera.set_parameters(&parameters)?;
                }
            }
        }
        camera.set_preview_frame_sink(None)?;
        camera.stop_preview()
    }

    fn start_preview_if_stopped(&self) {
        let stopped = self
            .inner
            .lock()
            .lifecycle
            .ready()
            .is_some_and(|ready| !ready.is_running());
        if stopped {
            self.start_preview_internal(true);
        }
    }

    fn stop_preview_if_running(&self) {
        let running = self
            .inner
            .lock()
            .lifecycle
            .ready()
            .is_some_and(|ready| ready.is_running());
        if running {
            self.stop_preview_internal(true);
        }
    }

    fn surface_listener(&self) -> SurfaceListener {
        let weak = self.weak_self.clone();
        Arc::new(move |event: SurfaceEvent| {
            if let Some(shared) = weak.upgrade() {
                shared.on_surface_event(event);
            }
        })
    }

    pub(super) fn on_surface_event(&self, event: SurfaceEvent) {
        debug!("Surface event: {:?}", event);
        match event {
            SurfaceEvent::Created => self.start_preview_if_stopped(),
            SurfaceEvent::Changed {
                drawable_available: false,
                ..
            } => {
                // The surface is gone; the stream is not touched
                if let Some(ready) = self.inner.lock().lifecycle.ready_mut() {
                    ready.set_preview(PreviewPhase::Inactive);
                }
            }
            SurfaceEvent::Changed { .. } => {
                self.stop_preview_if_running();
                self.start_preview_if_stopped();
            }
            SurfaceEvent::Destroyed => self.stop_preview_if_running(),
        }
    }

    fn frame_sink(&self) -> FrameSink {
        let weak = self.weak_self.clone();
        Arc::new(move |data: &[u8]| {
            if let Some(shared) = weak.upgrade() {
                shared.on_preview_frame(data);
            }
        })
    }

    pub(super) fn on_preview_frame(&self, data: &[u8]) {
        let (decoder, task_geometry) = {
            let inner = self.inner.lock();
            let Some(ready) = inner.lifecycle.ready() else {
                trace!("Dropping frame: scanner not ready");
                return;
            };
            if ready.preview == PreviewPhase::Stopping {
                trace!("Dropping frame: preview is stopping");
                return;
            }
            let session = &ready.session;
            (
                Arc::clone(&session.decoder),
                (
                    session.preview_size,
                    session.frame_size,
                    session.orientation,
                    session.mirrored(),
                ),
            )
        };

        if decoder.is_processing() {
            trace!("Dropping frame: decoder busy");
            return;
        }

        let (preview_size, frame_size, orientation, mirrored) = task_geometry;
        let task = DecodeTask {
            data: data.to_vec(),
            preview_size,
            frame_size,
            orientation,
            square_frame: self.view.is_square_frame(),
            mirrored,
            callback: self.result_callback(),
        };

        match decoder.decode(task) {
            Ok(()) => {}
            Err(DecoderError::Busy) => trace!("Dropping frame: decoder busy"),
            Err(e) => {
                let failure = ScannerError::from(e);
                if failure.is_recoverable() {
                    debug!("Frame not submitted: {}", failure);
                } else {
                    error!("Frame not submitted: {}", failure);
                }
            }
        }
    }

    fn result_callback(&self) -> ResultCallback {
        let weak = self.weak_self.clone();
        Arc::new(move |attempt: DecodeAttempt| match attempt {
            DecodeAttempt::Decoded(result) => {
                info!("Decoded {} code", result.format);
                let callback = weak
                    .upgrade()
                    .and_then(|shared| shared.inner.lock().decode_callback.clone());
                if let Some(callback) = callback {
                    callback(&result);
                }
            }
            DecodeAttempt::NotFound => trace!("No code in frame"),
            DecodeAttempt::Failed(e) => {
                let failure = ScannerError::from(e);
                if failure.is_recoverable() {
                    debug!("Decode attempt failed: {}", failure);
                } else {
                    error!("Decode attempt failed: {}", failure);
                }
            }
        })
    }

    pub(super) fn decoder_listener(&self) -> StateListener {
        let weak = self.weak_self.clone();
        Arc::new(move |state: DecoderState| {
            if state != DecoderState::Decoded {
                return;
            }
            if let Some(shared) = weak.upgrade() {
                shared.on_decoded();
            }
        })
    }

    /// Frames are dropped from here on, even when the preview was flagged inactive
    /// by a surface change that left the stream running
    fn on_decoded(&self) {
        if let Some(ready) = self.inner.lock().lifecycle.ready_mut() {
            ready.preview = PreviewPhase::Stopping;
        }
        self.main_thread.post(Action::StopPreview);
    }

    pub(super) fn set_formats(&self, formats: FormatSet) {
        let decoder = {
            let mut inner = self.inner.lock();
            inner.config.formats = formats.clone();
            inner
                .lifecycle
                .ready()
                .map(|ready| Arc::clone(&ready.session.decoder))
        };
        if let Some(decoder) = decoder {
            decoder.set_formats(&formats);
        }
    }

    pub(super) fn set_auto_focus_enabled(&self, enabled: bool) {
        let camera = {
            let mut inner = self.inner.lock();
            let changed = inner.config.auto_focus_enabled != enabled;
            inner.config.auto_focus_enabled = enabled;
            inner
                .lifecycle
                .ready()
                .filter(|ready| {
                    changed && ready.is_running() && ready.session.auto_focus_supported
                })
                .map(|ready| (ready.session.id, Arc::clone(&ready.session.camera)))
        };
        self.view.set_auto_focus_enabled(enabled);

        if let Some((session_id, camera)) = camera {
            if !enabled {
                if let Some(ready) = self.inner.lock().lifecycle.session_mut(session_id) {
                    ready.focus = Default::default();
                }
            }
            if let Err(e) = Self::configure_focus(camera.as_ref(), enabled) {
                log_hardware_failure(&format!("switch auto focus {}", on_off(enabled)), &e);
            }
            if enabled {
                self.schedule_auto_focus();
            }
        }
    }

    fn configure_focus(camera: &dyn CameraHandle, enabled: bool) -> std::result::Result<(), CameraError> {
        let mut parameters = camera.parameters().ok_or(CameraError::ParametersUnavailable)?;
        let mode = if enabled {
            FocusMode::Auto
        } else {
            camera.cancel_auto_focus()?;
            FocusMode::Fixed
        };
        if set_focus_mode(&mut parameters, mode) {
            camera.set_parameters(&parameters)?;
        }
        Ok(())
    }

    pub(super) fn set_flash_enabled(&self, enabled: bool) {
        let camera = {
            let mut inner = self.inner.lock();
            let changed = inner.config.flash_enabled != enabled;
            inner.config.flash_enabled = enabled;
            inner
                .lifecycle
                .ready()
                .filter(|ready| changed && ready.is_running() && ready.session.flash_supported)
                .map(|ready| Arc::clone(&ready.session.camera))
        };
        self.view.set_flash_enabled(enabled);

        if let Some(camera) = camera {
            self.apply_flash(camera.as_ref(), enabled);
        }
    }

    fn apply_flash(&self, camera: &dyn CameraHandle, enabled: bool) {
        let mode = if enabled {
            FlashMode::Torch
        } else {
            FlashMode::Off
        };
        let result = camera
            .parameters()
            .ok_or(CameraError::ParametersUnavailable)
            .and_then(|mut parameters| {
                if set_flash_mode(&mut parameters, mode) {
                    camera.set_parameters(&parameters)
                } else {
                    Ok(())
                }
            });
        if let Err(e) = result {
            log_hardware_failure(&format!("switch flash {}", on_off(enabled)), &e);
        }
    }
}

/// Steady-state hardware failures are absorbed; the next trigger retries transient ones
pub(super) fn log_hardware_failure(action: &str, failure: &CameraError) {
    if failure.is_transient() {
        warn!("Failed to {}, retrying on next trigger: {}", action, failure);
    } else {
        error!("Failed to {}: {}", action, failure);
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

impl CodeScanner {
    /// Start the preview, initializing the camera first if needed.
    pub fn start_preview(&self) {
        self.shared.start_preview();
    }

    pub fn stop_preview(&self) {
        self.shared.stop_preview();
    }

    /// Stop the preview and free the camera and decoder. Safe to call in any state.
    pub fn release_resources(&self) {
        self.shared.release_resources();
    }

    pub fn set_formats(&self, formats: FormatSet) {
        self.shared.set_formats(formats);
    }

    pub fn set_format(&self, format: BarcodeFormat) {
        self.shared.set_formats(FormatSet::single(format));
    }

    pub fn formats(&self) -> FormatSet {
        self.shared.inner.lock().config.formats.clone()
    }

    pub fn set_decode_callback(&self, callback: Option<DecodeCallback>) {
        self.shared.inner.lock().decode_callback = callback;
    }

    /// Without an error callback, initialization failures end the main loop.
    pub fn set_error_callback(&self, callback: Option<ErrorCallback>) {
        self.shared.inner.lock().error_callback = callback;
    }

    pub fn set_auto_focus_enabled(&self, enabled: bool) {
        self.shared.set_auto_focus_enabled(enabled);
    }

    pub fn is_auto_focus_enabled(&self) -> bool {
        self.shared.inner.lock().config.auto_focus_enabled
    }

    pub fn set_flash_enabled(&self, enabled: bool) {
        self.shared.set_flash_enabled(enabled);
    }

    pub fn is_flash_enabled(&self) -> bool {
        self.shared.inner.lock().config.flash_enabled
    }

    pub fn is_preview_active(&self) -> bool {
        self.shared
            .inner
            .lock()
            .lifecycle
            .ready()
            .is_some_and(|ready| ready.is_running())
    }

    /// True until a session shows the device cannot auto focus
    pub fn is_auto_focus_supported_or_unknown(&self) -> bool {
        self.shared
            .inner
            .lock()
            .lifecycle
            .ready()
            .map_or(true, |ready| ready.session.auto_focus_supported)
    }

    /// True until a session shows the device has no torch
    pub fn is_flash_supported_or_unknown(&self) -> bool {
        self.shared
            .inner
            .lock()
            .lifecycle
            .ready()
            .map_or(true, |ready| ready.session.flash_supported)
    }

    pub fn configuration(&self) -> ScanConfiguration {
        self.shared.inner.lock().config.clone()
    }

    pub fn state(&self) -> ControllerState {
        self.shared.inner.lock().lifecycle.snapshot()
    }

    /// Analysed frame size of the current session
    pub fn frame_size(&self) -> Option<Size> {
        self.shared
            .inner
            .lock()
            .lifecycle
            .ready()
            .map(|ready| ready.session.frame_size)
    }
}

impl Drop for CodeScanner {
    fn drop(&mut self) {
        self.shared.release_resources();
    }
}
