use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Decoder error: {0}")]
    Decoder(#[from] DecoderError),

    #[error("Invalid format set: {details}")]
    InvalidFormats { details: String },

    #[error("System error: {message}")]
    System { message: String },
}

/// Failures reported by camera hardware
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Unable to access camera")]
    NoCameraAvailable,

    #[error("Camera index {index} is out of range ({count} devices)")]
    InvalidDeviceIndex { index: u32, count: usize },

    #[error("Failed to open camera {index}: {details}")]
    DeviceOpen { index: u32, details: String },

    #[error("Unable to configure camera")]
    ParametersUnavailable,

    #[error("Camera configuration failed: {details}")]
    Configuration { details: String },

    #[error("Preview stream error: {details}")]
    Preview { details: String },

    #[error("Auto focus error: {details}")]
    AutoFocus { details: String },

    #[error("Camera has been released")]
    Released,
}

impl CameraError {
    /// Steady-state failures that the next surface event or timer tick retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CameraError::Configuration { .. }
                | CameraError::Preview { .. }
                | CameraError::AutoFocus { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum DecoderError {
    #[error("Failed to spawn decoder worker: {source}")]
    WorkerSpawn {
        #[source]
        source: std::io::Error,
    },

    #[error("Decoder is already processing a frame")]
    Busy,

    #[error("Invalid frame: {details}")]
    InvalidFrame { details: String },

    #[error("Decoding failed: {details}")]
    Decode { details: String },

    #[error("Decoder is not running")]
    Stopped,
}

impl ScannerError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn invalid_formats<S: Into<String>>(details: S) -> Self {
        Self::InvalidFormats {
            details: details.into(),
        }
    }

    /// Whether the controller can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            ScannerError::Camera(e) => e.is_transient(),
            ScannerError::Decoder(e) => matches!(
                e,
                DecoderError::Busy | DecoderError::InvalidFrame { .. } | DecoderError::Decode { .. }
            ),
            ScannerError::InvalidFormats { .. } => true,
            ScannerError::Config(_) | ScannerError::Io(_) | ScannerError::System { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_failures_are_not_recoverable() {
        assert!(!ScannerError::from(CameraError::NoCameraAvailable).is_recoverable());
        assert!(!ScannerError::from(CameraError::ParametersUnavailable).is_recoverable());
        assert!(!ScannerError::from(CameraError::DeviceOpen {
            index: 0,
            details: "busy".to_string(),
        })
        .is_recoverable());
    }

    #[test]
    fn test_runtime_hardware_failures_are_transient() {
        let error = CameraError::Preview {
            details: "surface lost".to_string(),
        };
        assert!(error.is_transient());
        assert!(ScannerError::from(error).is_recoverable());
        assert!(ScannerError::from(DecoderError::Busy).is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CameraError::NoCameraAvailable.to_string(),
            "Unable to access camera"
        );
        assert_eq!(
            ScannerError::from(CameraError::ParametersUnavailable).to_string(),
            "Camera error: Unable to configure camera"
        );
    }
}
