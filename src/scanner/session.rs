use crate::decoder::Decoder;
use crate::geometry::Size;
use crate::hardware::{CameraHandle, DeviceInfo, Facing};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything produced by one successful initialization
pub(super) struct Session {
    /// Initialization attempt that produced this session
    pub(super) id: u64,
    pub(super) camera: Arc<dyn CameraHandle>,
    pub(super) device: DeviceInfo,
    pub(super) decoder: Arc<dyn Decoder>,
    pub(super) preview_size: Size,
    /// Analysed part of the preview, display orientation
    pub(super) frame_size: Size,
    pub(super) orientation: u32,
    pub(super) auto_focus_supported: bool,
    pub(super) flash_supported: bool,
}

impl Session {
    pub(super) fn mirrored(&self) -> bool {
        self.device.facing == Facing::Front
    }

    /// Stop the decoder and free the camera. Consumes the session so it runs once.
    pub(super) fn release(self) {
        self.decoder.shutdown();
        self.camera.release();
        info!(
            "Released camera {} (session {})",
            self.device.index, self.id
        );
    }
}

/// Resources acquired by an initialization attempt that has not published yet.
/// Dropping the guard releases them.
#[derive(Default)]
pub(super) struct PendingSession {
    camera: Option<Arc<dyn CameraHandle>>,
    decoder: Option<Arc<dyn Decoder>>,
}

impl PendingSession {
    pub(super) fn hold_camera(&mut self, camera: Arc<dyn CameraHandle>) -> Arc<dyn CameraHandle> {
        self.camera = Some(Arc::clone(&camera));
        camera
    }

    pub(super) fn hold_decoder(&mut self, decoder: Arc<dyn Decoder>) -> Arc<dyn Decoder> {
        self.decoder = Some(Arc::clone(&decoder));
        decoder
    }

    /// Hand ownership to a published session
    pub(super) fn disarm(mut self) {
        self.camera = None;
        self.decoder = None;
    }
}

impl Drop for PendingSession {
    fn drop(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            decoder.shutdown();
        }
        if let Some(camera) = self.camera.take() {
            camera.release();
            debug!("Released camera acquired by failed initialization");
        }
    }
}
