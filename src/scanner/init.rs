//! Off-thread camera initialization.
//!
//! One worker thread runs per attempt. It opens and configures the device, builds
//! the decoder and publishes the session under the controller lock, then hands
//! back to the interactive thread with a posted action. A worker whose attempt was
//! abandoned (release during initialization) frees what it acquired itself.

use super::controller::Shared;
use super::main_loop::Action;
use super::session::{PendingSession, Session};
use super::state::{Lifecycle, ReadyState};
use crate::error::{CameraError, Result, ScannerError};
use crate::geometry::{display_orientation, find_suitable_preview_size, frame_size, is_portrait, Size};
use crate::hardware::{optimize_parameters, select_device, set_focus_mode, FlashMode, FocusMode};
use std::io;
use std::sync::Arc;
use tracing::{debug, error, info};

pub(super) struct InitializationWorker {
    shared: Arc<Shared>,
    attempt: u64,
    viewport: Size,
}

impl InitializationWorker {
    pub(super) fn new(shared: Arc<Shared>, attempt: u64, viewport: Size) -> Self {
        Self {
            shared,
            attempt,
            viewport,
        }
    }

    pub(super) fn spawn(self) -> io::Result<()> {
        std::thread::Builder::new()
            .name("codescanner-init".to_string())
            .spawn(move || self.run())
            .map(|_| ())
    }

    fn run(self) {
        if let Err(e) = self.initialize() {
            self.shared.fail_initialization(self.attempt, e);
        }
    }

    fn initialize(&self) -> Result<()> {
        let shared = &self.shared;
        let config = shared.inner.lock().config.clone();
        info!(
            "Initializing camera (attempt {}, viewport {})",
            self.attempt, self.viewport
        );

        let mut pending = PendingSession::default();

        let device = select_device(&shared.provider.devices(), config.camera_index)?;
        let camera = pending.hold_camera(shared.provider.open(device.index)?);
        let parameters = camera
            .parameters()
            .ok_or(CameraError::ParametersUnavailable)?;

        let orientation = display_orientation(&device, shared.view.screen_rotation());
        let portrait = is_portrait(orientation);
        let target = if portrait {
            self.viewport.transposed()
        } else {
            self.viewport
        };
        let preview_size = find_suitable_preview_size(
            &parameters.supported_preview_sizes,
            parameters.preview_size,
            target,
        )?;
        let displayed = if portrait {
            preview_size.transposed()
        } else {
            preview_size
        };
        let frame_size = frame_size(displayed, self.viewport);
        debug!(
            "Camera {} orientation {}, preview {}, frame {}",
            device.index, orientation, preview_size, frame_size
        );

        let auto_focus_supported = parameters.supports_focus_mode(FocusMode::Auto);
        let flash_supported = parameters.supports_flash_mode(FlashMode::Torch);

        let mut parameters = optimize_parameters(parameters);
        parameters.preview_size = Some(preview_size);
        if auto_focus_supported {
            let mode = if config.auto_focus_enabled {
                FocusMode::Auto
            } else {
                FocusMode::Fixed
            };
            set_focus_mode(&mut parameters, mode);
        }
        camera.set_parameters(&parameters)?;
        camera.set_display_orientation(orientation)?;

        let decoder = pending.hold_decoder(
            shared
                .decoder_factory
                .create(config.formats.clone(), shared.decoder_listener())?,
        );
        decoder.start()?;

        let session = Session {
            id: self.attempt,
            camera,
            device,
            decoder,
            preview_size,
            frame_size,
            orientation,
            auto_focus_supported,
            flash_supported,
        };
        shared.publish_session(session, pending);
        Ok(())
    }
}

impl Shared {
    /// Install a finished session unless its attempt has been abandoned meanwhile.
    fn publish_session(&self, session: Session, pending: PendingSession) {
        let attempt = session.id;
        let frame_size = session.frame_size;

        let published = {
            let mut inner = self.inner.lock();
            if inner.lifecycle.is_initializing(attempt) {
                if !session.auto_focus_supported {
                    inner.config.auto_focus_enabled = false;
                }
                if !session.flash_supported {
                    inner.config.flash_enabled = false;
                }
                inner.lifecycle = Lifecycle::Ready(ReadyState::new(session));
                true
            } else {
                false
            }
        };

        if published {
            pending.disarm();
            info!("Camera initialized (attempt {})", attempt);
            self.main_thread.post(Action::FinishInitialization {
                attempt,
                frame_size,
            });
        } else {
            info!(
                "Initialization attempt {} was abandoned; releasing its camera",
                attempt
            );
            drop(pending);
        }
    }

    /// Return to `Uninitialized` and hand the error to the interactive thread
    pub(super) fn fail_initialization(&self, attempt: u64, error: ScannerError) {
        {
            let mut inner = self.inner.lock();
            if !inner.lifecycle.is_initializing(attempt) {
                debug!(
                    "Dropping failure of abandoned initialization attempt {}: {}",
                    attempt, error
                );
                return;
            }
            inner.lifecycle = Lifecycle::Uninitialized;
        }

        error!("Camera initialization failed: {}", error);
        self.main_thread.post(Action::InitializationFailed(error));
    }

    /// Deliver to the error callback, or fail the main loop when there is none
    pub(super) fn report_initialization_failure(&self, error: ScannerError) -> Result<()> {
        let callback = self.inner.lock().error_callback.clone();
        match callback {
            Some(callback) => {
                callback(&error);
                Ok(())
            }
            None => Err(error),
        }
    }
}
