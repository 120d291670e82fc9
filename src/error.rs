//! Unified error handling for pbxd.
//!
//! Registry and call errors are typed so the session layer can decide what
//! to do with them (refuse a connection, count a failed chat) and so each
//! carries a stable code for metric labeling.

use thiserror::Error;

/// Errors from switchboard registration bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("switchboard is full ({0} extensions)")]
    Exhausted(usize),

    #[error("extension {0} is already in use")]
    ExtensionInUse(u32),

    #[error("unit already holds an extension")]
    AlreadyRegistered,

    #[error("unit is not registered")]
    NotRegistered,

    #[error("switchboard is shutting down")]
    ShuttingDown,
}

impl RegistryError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Exhausted(_) => "exhausted",
            Self::ExtensionInUse(_) => "extension_in_use",
            Self::AlreadyRegistered => "already_registered",
            Self::NotRegistered => "not_registered",
            Self::ShuttingDown => "shutting_down",
        }
    }
}

/// Errors from telephone unit operations.
///
/// These are protocol outcomes, not faults: the unit has already notified
/// its own session of its current state by the time one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("no call in progress")]
    NotConnected,
}

impl CallError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_codes() {
        assert_eq!(RegistryError::Exhausted(64).error_code(), "exhausted");
        assert_eq!(RegistryError::NotRegistered.error_code(), "not_registered");
        assert_eq!(RegistryError::ShuttingDown.error_code(), "shutting_down");
    }

    #[test]
    fn call_error_codes() {
        assert_eq!(CallError::NotConnected.error_code(), "not_connected");
    }

    #[test]
    fn display_is_operator_readable() {
        assert_eq!(
            RegistryError::ExtensionInUse(7).to_string(),
            "extension 7 is already in use"
        );
    }
}
