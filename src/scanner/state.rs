use super::session::Session;
use crate::format::FormatSet;

/// Caller-facing scan settings; survives re-initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfiguration {
    pub formats: FormatSet,
    pub auto_focus_enabled: bool,
    pub flash_enabled: bool,
    /// `None` picks the first back-facing device
    pub camera_index: Option<u32>,
}

impl Default for ScanConfiguration {
    fn default() -> Self {
        Self {
            formats: FormatSet::all(),
            auto_focus_enabled: true,
            flash_enabled: false,
            camera_index: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Uninitialized,
    Initializing,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewPhase {
    Inactive,
    Active,
    /// A code was decoded; frames are dropped until the stop action runs
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPhase {
    NotFocusing,
    Focusing,
}

/// Snapshot of the controller state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    pub lifecycle: LifecyclePhase,
    pub preview: PreviewPhase,
    pub focus: FocusPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) struct FocusState {
    pub(super) focusing: bool,
    /// Consecutive ticks that found a focus request still outstanding
    pub(super) attempts: u32,
}

pub(super) struct ReadyState {
    pub(super) session: Session,
    pub(super) preview: PreviewPhase,
    pub(super) focus: FocusState,
}

impl ReadyState {
    pub(super) fn new(session: Session) -> Self {
        Self {
            session,
            preview: PreviewPhase::Inactive,
            focus: FocusState::default(),
        }
    }

    /// Preview stream is running in hardware (possibly about to stop)
    pub(super) fn is_running(&self) -> bool {
        self.preview != PreviewPhase::Inactive
    }

    pub(super) fn set_preview(&mut self, preview: PreviewPhase) {
        self.preview = preview;
        self.focus = FocusState::default();
    }
}

/// Session exists exactly when the lifecycle is `Ready`
pub(super) enum Lifecycle {
    Uninitialized,
    Initializing { attempt: u64 },
    Ready(ReadyState),
}

impl Lifecycle {
    pub(super) fn phase(&self) -> LifecyclePhase {
        match self {
            Lifecycle::Uninitialized => LifecyclePhase::Uninitialized,
            Lifecycle::Initializing { .. } => LifecyclePhase::Initializing,
            Lifecycle::Ready(_) => LifecyclePhase::Ready,
        }
    }

    pub(super) fn is_initializing(&self, attempt: u64) -> bool {
        matches!(self, Lifecycle::Initializing { attempt: current } if *current == attempt)
    }

    pub(super) fn ready(&self) -> Option<&ReadyState> {
        match self {
            Lifecycle::Ready(ready) => Some(ready),
            _ => None,
        }
    }

    pub(super) fn ready_mut(&mut self) -> Option<&mut ReadyState> {
        match self {
            Lifecycle::Ready(ready) => Some(ready),
            _ => None,
        }
    }

    /// Ready state of the given session only
    pub(super) fn session_mut(&mut self, session_id: u64) -> Option<&mut ReadyState> {
        self.ready_mut()
            .filter(|ready| ready.session.id == session_id)
    }

    pub(super) fn snapshot(&self) -> ControllerState {
        match self {
            Lifecycle::Ready(ready) => ControllerState {
                lifecycle: LifecyclePhase::Ready,
                preview: ready.preview,
                focus: if ready.focus.focusing {
                    FocusPhase::Focusing
                } else {
                    FocusPhase::NotFocusing
                },
            },
            other => ControllerState {
                lifecycle: other.phase(),
                preview: PreviewPhase::Inactive,
                focus: FocusPhase::NotFocusing,
            },
        }
    }
}
