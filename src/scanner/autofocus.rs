use super::controller::{log_hardware_failure, Shared};
use super::main_loop::Action;
use crate::hardware::{AutoFocusCallback, CameraHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

pub const DEFAULT_AUTO_FOCUS_INTERVAL: Duration = Duration::from_millis(1500);

pub const DEFAULT_AUTO_FOCUS_ATTEMPTS_THRESHOLD: u32 = 2;

/// Auto-focus scheduling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoFocusTiming {
    /// Delay between scheduler ticks
    pub interval: Duration,
    /// Ticks a focus request may stay outstanding before a new one is issued
    pub attempts_threshold: u32,
}

impl Default for AutoFocusTiming {
    fn default() -> Self {
        Self {
            interval: DEFAULT_AUTO_FOCUS_INTERVAL,
            attempts_threshold: DEFAULT_AUTO_FOCUS_ATTEMPTS_THRESHOLD,
        }
    }
}

impl Shared {
    /// Arm the next tick; an already pending tick is replaced
    pub(super) fn schedule_auto_focus(&self) {
        self.main_thread
            .post_delayed(Action::AutoFocus, self.timing.interval);
    }

    /// One scheduler run. Keeps re-arming while the preview is running, even when
    /// focusing is disabled or unsupported.
    pub(super) fn auto_focus_tick(&self) {
        let request = {
            let mut inner = self.inner.lock();
            let enabled = inner.config.auto_focus_enabled;
            let threshold = self.timing.attempts_threshold;
            let Some(ready) = inner.lifecycle.ready_mut() else {
                return;
            };
            if !ready.is_running() {
                trace!("Auto focus scheduler idle: preview not running");
                return;
            }

            if !enabled || !ready.session.auto_focus_supported {
                None
            } else if ready.focus.focusing && ready.focus.attempts < threshold {
                ready.focus.attempts += 1;
                trace!(
                    "Focus request still outstanding ({}/{})",
                    ready.focus.attempts,
                    threshold
                );
                None
            } else {
                ready.focus.focusing = true;
                ready.focus.attempts = 0;
                Some((ready.session.id, Arc::clone(&ready.session.camera)))
            }
        };

        if let Some((session_id, camera)) = request {
            self.request_auto_focus(session_id, camera.as_ref());
        }
        self.schedule_auto_focus();
    }

    fn request_auto_focus(&self, session_id: u64, camera: &dyn CameraHandle) {
        debug!("Requesting auto focus");
        if let Err(e) = camera.auto_focus(self.auto_focus_callback(session_id)) {
            log_hardware_failure("request auto focus", &e);
            self.clear_focusing(session_id);
        }
    }

    fn auto_focus_callback(&self, session_id: u64) -> AutoFocusCallback {
        let weak = self.weak_self.clone();
        Box::new(move |success: bool| {
            trace!("Auto focus finished (success: {})", success);
            if let Some(shared) = weak.upgrade() {
                shared.clear_focusing(session_id);
            }
        })
    }

    fn clear_focusing(&self, session_id: u64) {
        if let Some(ready) = self.inner.lock().lifecycle.session_mut(session_id) {
            ready.focus.focusing = false;
        }
    }
}
