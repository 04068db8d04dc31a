//! Error types for bindings, the controller, and hotkey backends

/// Errors reported by a [`HotkeyBackend`](crate::backend::HotkeyBackend)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend rejected chord '{0}'")]
    InvalidChord(String),

    #[error("backend denied hook for '{chord}': {reason}")]
    Denied { chord: String, reason: String },

    #[error("chord '{0}' is not hooked")]
    NotHooked(String),
}

/// Errors surfaced by bindings and the controller
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("invalid chord identifier '{0}'")]
    InvalidChord(String),

    #[error("chord '{0}' is already bound")]
    DuplicateBinding(String),

    #[error("no binding registered for '{0}'")]
    UnknownBinding(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("action for '{chord}' failed: {source}")]
    Action {
        chord: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to spawn repeat task for '{chord}': {reason}")]
    TaskSpawn { chord: String, reason: String },
}

pub type Result<T, E = HotkeyError> = std::result::Result<T, E>;
