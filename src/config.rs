use crate::format::{BarcodeFormat, ALL_FORMATS};
use crate::scanner::{DEFAULT_AUTO_FOCUS_ATTEMPTS_THRESHOLD, DEFAULT_AUTO_FOCUS_INTERVAL};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScannerConfig {
    pub scanner: ScannerSection,
    pub auto_focus: AutoFocusConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScannerSection {
    /// Camera device index; unset picks the first back-facing camera
    #[serde(default)]
    pub camera_index: Option<u32>,

    /// Formats to recognise
    #[serde(default = "default_formats")]
    pub formats: Vec<BarcodeFormat>,

    /// Periodic auto focus
    #[serde(default = "default_auto_focus")]
    pub auto_focus: bool,

    /// Torch while previewing
    #[serde(default = "default_flash")]
    pub flash: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AutoFocusConfig {
    /// Delay between focus scheduler ticks
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Ticks a focus request may stay outstanding before it is reissued
    #[serde(default = "default_attempts_threshold")]
    pub attempts_threshold: u32,
}

impl ScannerConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("codescanner.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("scanner.auto_focus", default_auto_focus())?
            .set_default("scanner.flash", default_flash())?
            .set_default("auto_focus.interval_ms", default_interval_ms())?
            .set_default("auto_focus.attempts_threshold", default_attempts_threshold())?
            .add_source(File::with_name(&path_str).required(false))
            // CODESCANNER__SCANNER__FLASH=true style overrides
            .add_source(
                Environment::with_prefix("CODESCANNER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ScannerConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scanner.formats.is_empty() {
            return Err(ConfigError::Message(
                "At least one barcode format must be enabled".to_string(),
            ));
        }

        if self.auto_focus.interval_ms == 0 {
            return Err(ConfigError::Message(
                "Auto focus interval must be greater than 0".to_string(),
            ));
        }

        if self.auto_focus.attempts_threshold == 0 {
            return Err(ConfigError::Message(
                "Auto focus attempts threshold must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as TOML, e.g. to seed a configuration file
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Message(e.to_string()))
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerSection {
                camera_index: None,
                formats: default_formats(),
                auto_focus: default_auto_focus(),
                flash: default_flash(),
            },
            auto_focus: AutoFocusConfig {
                interval_ms: default_interval_ms(),
                attempts_threshold: default_attempts_threshold(),
            },
        }
    }
}

// Default value functions
fn default_formats() -> Vec<BarcodeFormat> {
    ALL_FORMATS.to_vec()
}
fn default_auto_focus() -> bool {
    true
}
fn default_flash() -> bool {
    false
}

fn default_interval_ms() -> u64 {
    DEFAULT_AUTO_FOCUS_INTERVAL.as_millis() as u64
}
fn default_attempts_threshold() -> u32 {
    DEFAULT_AUTO_FOCUS_ATTEMPTS_THRESHOLD
}
