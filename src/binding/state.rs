//! Logical on/off state of a binding

use serde::{Deserialize, Serialize};

/// The two states a binding can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingState {
    /// The activate action has run (or its repeat task is running)
    Active,
    /// Initial state; the deactivate action has run or nothing has yet
    Disabled,
}

impl BindingState {
    /// The opposite state
    pub fn invert(self) -> Self {
        match self {
            BindingState::Active => BindingState::Disabled,
            BindingState::Disabled => BindingState::Active,
        }
    }

    pub fn is_active(self) -> bool {
        self == BindingState::Active
    }
}

impl Default for BindingState {
    fn default() -> Self {
        Self::Disabled
    }
}

impl std::fmt::Display for BindingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingState::Active => write!(f, "ACTIVE"),
            BindingState::Disabled => write!(f, "DISABLED"),
        }
    }
}
