//! Decoder boundary and the built-in QR decoder.
//!
//! A decoder accepts at most one frame at a time. Its state moves
//! `Idle -> Processing -> (Decoded ->) Idle` and every submitted frame resolves
//! exactly once through the task's result callback.

mod luminance;
mod qr;

pub use luminance::{extract_frame, LuminanceFrame};
pub use qr::{QrDecoder, QrDecoderFactory};

use crate::error::DecoderError;
use crate::format::{BarcodeFormat, FormatSet};
use crate::geometry::Size;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Idle,
    Processing,
    Decoded,
}

pub type StateListener = Arc<dyn Fn(DecoderState) + Send + Sync>;

pub type ResultCallback = Arc<dyn Fn(DecodeAttempt) + Send + Sync>;

/// A decoded code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub format: BarcodeFormat,
    pub text: String,
    pub raw: Vec<u8>,
    pub decoded_at: DateTime<Utc>,
}

impl ScanResult {
    pub fn new(format: BarcodeFormat, text: String) -> Self {
        let raw = text.as_bytes().to_vec();
        Self {
            format,
            text,
            raw,
            decoded_at: Utc::now(),
        }
    }
}

/// Outcome of one decode attempt
#[derive(Debug)]
pub enum DecodeAttempt {
    Decoded(ScanResult),
    NotFound,
    Failed(DecoderError),
}

/// One preview frame together with the geometry needed to analyse it
pub struct DecodeTask {
    pub data: Vec<u8>,
    pub preview_size: Size,
    /// Frame-of-interest in display orientation
    pub frame_size: Size,
    pub orientation: u32,
    pub square_frame: bool,
    pub mirrored: bool,
    pub callback: ResultCallback,
}

pub trait Decoder: Send + Sync {
    fn set_formats(&self, formats: &FormatSet);

    fn start(&self) -> Result<(), DecoderError>;

    /// Queue a frame; fails with [`DecoderError::Busy`] while another frame is in flight.
    fn decode(&self, task: DecodeTask) -> Result<(), DecoderError>;

    fn state(&self) -> DecoderState;

    fn is_processing(&self) -> bool {
        self.state() != DecoderState::Idle
    }

    fn shutdown(&self);
}

/// Builds the decoder bound to a session
pub trait DecoderFactory: Send + Sync {
    fn create(
        &self,
        formats: FormatSet,
        listener: StateListener,
    ) -> Result<Arc<dyn Decoder>, DecoderError>;
}
