use super::{
    extract_frame, DecodeAttempt, DecodeTask, Decoder, DecoderFactory, DecoderState,
    LuminanceFrame, ScanResult, StateListener,
};
use crate::error::DecoderError;
use crate::format::{BarcodeFormat, FormatSet};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, trace, warn};

/// QR code decoder running detection on a dedicated thread
pub struct QrDecoder {
    shared: Arc<QrShared>,
    jobs: Mutex<Option<Sender<DecodeTask>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct QrShared {
    state: Mutex<DecoderState>,
    formats: RwLock<FormatSet>,
    listener: StateListener,
}

impl QrShared {
    fn set_state(&self, state: DecoderState) {
        *self.state.lock() = state;
        (self.listener)(state);
    }
}

impl QrDecoder {
    pub fn new(formats: FormatSet, listener: StateListener) -> Self {
        Self {
            shared: Arc::new(QrShared {
                state: Mutex::new(DecoderState::Idle),
                formats: RwLock::new(formats),
                listener,
            }),
            jobs: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    fn run_worker(shared: Arc<QrShared>, jobs: Receiver<DecodeTask>) {
        debug!("QR decoder worker started");

        for task in jobs {
            let recognise_qr = shared.formats.read().contains(BarcodeFormat::QrCode);

            let attempt = match extract_frame(
                &task.data,
                task.preview_size,
                task.frame_size,
                task.orientation,
                task.square_frame,
                task.mirrored,
            ) {
                Ok(frame) if recognise_qr => detect_qr(&frame),
                Ok(_) => DecodeAttempt::NotFound,
                Err(e) => DecodeAttempt::Failed(e),
            };

            if matches!(attempt, DecodeAttempt::Decoded(_)) {
                shared.set_state(DecoderState::Decoded);
            }
            (task.callback)(attempt);
            shared.set_state(DecoderState::Idle);
        }

        debug!("QR decoder worker stopped");
    }
}

fn detect_qr(frame: &LuminanceFrame) -> DecodeAttempt {
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(frame.width, frame.height, |x, y| {
            frame.pixel(x, y)
        });
    let grids = prepared.detect_grids();
    trace!(
        "QR detection on {}x{} frame found {} grids",
        frame.width,
        frame.height,
        grids.len()
    );

    let mut last_error = None;
    for grid in grids {
        match grid.decode() {
            Ok((_meta, content)) => {
                return DecodeAttempt::Decoded(ScanResult::new(BarcodeFormat::QrCode, content));
            }
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    match last_error {
        Some(details) => DecodeAttempt::Failed(DecoderError::Decode { details }),
        None => DecodeAttempt::NotFound,
    }
}

impl Decoder for QrDecoder {
    fn set_formats(&self, formats: &FormatSet) {
        *self.shared.formats.write() = formats.clone();
        if !formats.contains(BarcodeFormat::QrCode) {
            warn!("Format set has no QR_CODE; the QR decoder will not report results");
        }
    }

    fn start(&self) -> Result<(), DecoderError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let (sender, receiver) = channel::bounded(1);
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("codescanner-decoder".to_string())
            .spawn(move || Self::run_worker(shared, receiver))
            .map_err(|source| DecoderError::WorkerSpawn { source })?;

        *self.jobs.lock() = Some(sender);
        *worker = Some(handle);
        info!("QR decoder started");
        Ok(())
    }

    fn decode(&self, task: DecodeTask) -> Result<(), DecoderError> {
        let jobs = self.jobs.lock().clone().ok_or(DecoderError::Stopped)?;

        {
            let mut state = self.shared.state.lock();
            if *state != DecoderState::Idle {
                return Err(DecoderError::Busy);
            }
            *state = DecoderState::Processing;
        }
        (self.shared.listener)(DecoderState::Processing);

        if jobs.send(task).is_err() {
            self.shared.set_state(DecoderState::Idle);
            return Err(DecoderError::Stopped);
        }
        Ok(())
    }

    fn state(&self) -> DecoderState {
        *self.shared.state.lock()
    }

    fn shutdown(&self) {
        self.jobs.lock().take();

        if let Some(handle) = self.worker.lock().take() {
            // A callback running on the worker may be the one releasing us
            if handle.thread().id() == std::thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("QR decoder worker panicked");
            }
        }
        info!("QR decoder stopped");
    }
}

impl Drop for QrDecoder {
    fn drop(&mut self) {
        self.jobs.get_mut().take();
    }
}

/// Creates a [`QrDecoder`] per session
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoderFactory;

impl DecoderFactory for QrDecoderFactory {
    fn create(
        &self,
        formats: FormatSet,
        listener: StateListener,
    ) -> Result<Arc<dyn Decoder>, DecoderError> {
        Ok(Arc::new(QrDecoder::new(formats, listener)))
    }
}
