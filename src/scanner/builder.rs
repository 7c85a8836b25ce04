use super::autofocus::AutoFocusTiming;
use super::controller::{CodeScanner, DecodeCallback, ErrorCallback, Shared, SharedParts};
use super::main_loop::{channel, MainLoop};
use super::state::ScanConfiguration;
use crate::config::ScannerConfig;
use crate::decoder::{DecoderFactory, QrDecoderFactory, ScanResult};
use crate::error::{Result, ScannerError};
use crate::format::{BarcodeFormat, FormatSet};
use crate::hardware::CameraProvider;
use crate::surface::ScannerView;
use std::sync::Arc;
use std::time::Duration;

/// Builder for a fully configured [`CodeScanner`]
pub struct CodeScannerBuilder {
    config: ScanConfiguration,
    timing: AutoFocusTiming,
    decoder_factory: Option<Arc<dyn DecoderFactory>>,
    decode_callback: Option<DecodeCallback>,
    error_callback: Option<ErrorCallback>,
}

impl CodeScannerBuilder {
    pub fn new() -> Self {
        Self {
            config: ScanConfiguration::default(),
            timing: AutoFocusTiming::default(),
            decoder_factory: None,
            decode_callback: None,
            error_callback: None,
        }
    }

    /// Builder preloaded from a validated configuration file
    pub fn from_config(config: &ScannerConfig) -> Result<Self> {
        config.validate()?;
        let formats = FormatSet::new(config.scanner.formats.iter().copied())?;

        let mut builder = Self::new()
            .formats(formats)
            .auto_focus(config.scanner.auto_focus)
            .flash(config.scanner.flash)
            .auto_focus_interval(Duration::from_millis(config.auto_focus.interval_ms))
            .focus_attempts_threshold(config.auto_focus.attempts_threshold);
        if let Some(index) = config.scanner.camera_index {
            builder = builder.camera(index);
        }
        Ok(builder)
    }

    /// Open this device instead of the first back-facing one
    pub fn camera(mut self, index: u32) -> Self {
        self.config.camera_index = Some(index);
        self
    }

    pub fn formats(mut self, formats: FormatSet) -> Self {
        self.config.formats = formats;
        self
    }

    pub fn format(self, format: BarcodeFormat) -> Self {
        self.formats(FormatSet::single(format))
    }

    pub fn auto_focus(mut self, enabled: bool) -> Self {
        self.config.auto_focus_enabled = enabled;
        self
    }

    pub fn flash(mut self, enabled: bool) -> Self {
        self.config.flash_enabled = enabled;
        self
    }

    pub fn auto_focus_interval(mut self, interval: Duration) -> Self {
        self.timing.interval = interval;
        self
    }

    pub fn focus_attempts_threshold(mut self, threshold: u32) -> Self {
        self.timing.attempts_threshold = threshold;
        self
    }

    /// Decoder used by every session; defaults to [`QrDecoderFactory`]
    pub fn decoder_factory(mut self, factory: Arc<dyn DecoderFactory>) -> Self {
        self.decoder_factory = Some(factory);
        self
    }

    pub fn on_decoded<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ScanResult) + Send + Sync + 'static,
    {
        self.decode_callback = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ScannerError) + Send + Sync + 'static,
    {
        self.error_callback = Some(Arc::new(callback));
        self
    }

    /// Create the scanner and the main loop that must be driven on the interactive thread
    pub fn build(
        self,
        provider: Arc<dyn CameraProvider>,
        view: Arc<dyn ScannerView>,
    ) -> (CodeScanner, MainLoop) {
        let parts = SharedParts {
            provider,
            view: Arc::clone(&view),
            decoder_factory: self
                .decoder_factory
                .unwrap_or_else(|| Arc::new(QrDecoderFactory)),
            timing: self.timing,
            config: self.config.clone(),
            decode_callback: self.decode_callback,
            error_callback: self.error_callback,
        };

        let (main_thread, mut main_loop) = channel();
        let shared = Arc::new_cyclic(|weak| Shared::new(parts, main_thread, weak.clone()));
        main_loop.bind(&shared);

        view.set_auto_focus_enabled(self.config.auto_focus_enabled);
        view.set_flash_enabled(self.config.flash_enabled);

        (CodeScanner { shared }, main_loop)
    }
}

impl Default for CodeScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeScanner {
    /// Scanner with default settings
    pub fn new(
        provider: Arc<dyn CameraProvider>,
        view: Arc<dyn ScannerView>,
    ) -> (CodeScanner, MainLoop) {
        CodeScannerBuilder::new().build(provider, view)
    }

    pub fn builder() -> CodeScannerBuilder {
        CodeScannerBuilder::new()
    }
}
