pub mod config;
pub mod decoder;
pub mod error;
pub mod format;
pub mod geometry;
pub mod hardware;
pub mod scanner;
pub mod simulated;
pub mod surface;

pub use config::ScannerConfig;
pub use decoder::{DecodeAttempt, Decoder, DecoderFactory, DecoderState, QrDecoder, QrDecoderFactory, ScanResult};
pub use error::{CameraError, DecoderError, Result, ScannerError};
pub use format::{BarcodeFormat, FormatSet, ALL_FORMATS, ONE_DIMENSIONAL_FORMATS, TWO_DIMENSIONAL_FORMATS};
pub use geometry::Size;
pub use hardware::{CameraHandle, CameraProvider, DeviceInfo, Facing, Parameters};
pub use scanner::{
    CodeScanner, CodeScannerBuilder, ControllerState, FocusPhase, LifecyclePhase, MainLoop, PreviewPhase,
    ScanConfiguration,
};
pub use surface::{PreviewSurface, ScannerView, SurfaceEvent};
