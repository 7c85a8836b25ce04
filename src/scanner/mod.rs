//! Preview/decode lifecycle controller.
//!
//! [`CodeScanner`] owns the camera session and the state machine around it.
//! Camera setup runs on a worker thread; everything that touches the camera after
//! that runs on the interactive thread through the [`MainLoop`] action queue.

mod autofocus;
mod builder;
mod controller;
mod init;
mod main_loop;
mod session;
mod state;
#[cfg(test)]
mod tests;

pub use autofocus::{AutoFocusTiming, DEFAULT_AUTO_FOCUS_ATTEMPTS_THRESHOLD, DEFAULT_AUTO_FOCUS_INTERVAL};
pub use builder::CodeScannerBuilder;
pub use controller::{CodeScanner, DecodeCallback, ErrorCallback};
pub use main_loop::MainLoop;
pub use state::{ControllerState, FocusPhase, LifecyclePhase, PreviewPhase, ScanConfiguration};
