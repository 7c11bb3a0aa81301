//! Error types for repo-state.
//!
//! Store operations (`get`, `update`, `subscribe`, unsubscribe) are total and
//! never return these. Errors only arise at the untyped edges: parsing key
//! names and dynamic JSON patches, and inside subscriber
//! callbacks, where [`SubscriberFailure`] is caught and logged rather than
//! propagated.

use std::error::Error as StdError;

use thiserror::Error;

use crate::key::KeySet;
use crate::monitor::registry::SubscriptionId;

/// Errors raised while interpreting untyped input.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Unknown state key '{key}'")]
    UnknownKey {
        key: String,
    },

    #[error("Invalid state patch: {reason}")]
    InvalidPatch {
        reason: String,
    },
}

impl StateError {
    /// Returns true if the error names a key outside the vocabulary.
    #[must_use]
    pub const fn is_unknown_key(&self) -> bool {
        matches!(self, Self::UnknownKey { .. })
    }

    /// Returns true if a dynamic patch was rejected.
    #[must_use]
    pub const fn is_invalid_patch(&self) -> bool {
        matches!(self, Self::InvalidPatch { .. })
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPatch {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for fallible repo-state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Boxed error a subscriber callback may return.
pub type CallbackError = Box<dyn StdError + Send + Sync + 'static>;

/// Return type of every subscriber callback.
pub type CallbackResult = Result<(), CallbackError>;

/// How a subscriber callback failed.
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("returned error: {0}")]
    Returned(#[source] CallbackError),

    #[error("panicked: {0}")]
    Panicked(String),
}

/// A subscriber callback failed during a dispatch pass.
///
/// Produced by the error boundary, logged, counted and then dropped. It never
/// reaches the caller of `update`.
#[derive(Debug, Error)]
#[error("subscriber {subscription} failed for repo '{repo_path}' (changed: {changed}): {cause}")]
pub struct SubscriberFailure {
    pub subscription: SubscriptionId,
    pub repo_path: String,
    pub changed: KeySet,
    #[source]
    pub cause: FailureCause,
}

impl SubscriberFailure {
    /// Returns true if the callback panicked rather than returning an error.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self.cause, FailureCause::Panicked(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::key::StateKey;

    #[test]
    fn test_unknown_key_message() {
        let err = StateError::UnknownKey {
            key: "show_remotes".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("show_remotes"));
        assert!(err.is_unknown_key());
        assert!(!err.is_invalid_patch());
    }

    #[test]
    fn test_invalid_patch_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StateError = json_err.into();
        assert!(err.is_invalid_patch());
        assert!(format!("{err}").contains("Invalid state patch"));
    }

    #[test]
    fn test_subscriber_failure_message_carries_context() {
        let failure = SubscriberFailure {
            subscription: SubscriptionId::new(),
            repo_path: "/tmp/repo".to_string(),
            changed: [StateKey::Status, StateKey::Head].into_iter().collect(),
            cause: FailureCause::Panicked("boom".to_string()),
        };
        let msg = format!("{failure}");
        assert!(msg.contains("/tmp/repo"));
        assert!(msg.contains("head"));
        assert!(msg.contains("status"));
        assert!(msg.contains("boom"));
        assert!(failure.is_panic());
    }

    #[test]
    fn test_returned_failure_is_not_panic() {
        let failure = SubscriberFailure {
            subscription: SubscriptionId::new(),
            repo_path: "r".to_string(),
            changed: KeySet::new(),
            cause: FailureCause::Returned("render failed".into()),
        };
        assert!(!failure.is_panic());
        assert!(format!("{failure}").contains("render failed"));
    }
}
