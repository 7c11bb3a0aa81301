//! Failure isolation for subscriber callbacks.
//!
//! A callback that returns an error or panics is caught here, logged with the
//! subscription id, repo path and changed keys, counted and then forgotten.
//! Nothing escapes to the caller of `update`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::error;

use crate::error::{FailureCause, SubscriberFailure};
use crate::key::KeySet;
use crate::storage::RepoState;

use super::registry::SubscriberRecord;

/// Runs subscriber callbacks so that their failures stay contained.
#[derive(Debug, Default)]
pub struct ErrorBoundary {
    failures: AtomicU64,
}

impl ErrorBoundary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke `record`'s callback. Returns the contained failure, if any, after
    /// it has been logged.
    pub fn run(
        &self,
        record: &SubscriberRecord,
        repo_path: &str,
        changed: &KeySet,
        state: &RepoState,
    ) -> Option<SubscriberFailure> {
        // The callback only sees shared references; a panic cannot leave the
        // store half-written.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            record.subscriber().on_state_changed(repo_path, changed, state)
        }));

        let cause = match outcome {
            Ok(Ok(())) => return None,
            Ok(Err(err)) => FailureCause::Returned(err),
            Err(payload) => FailureCause::Panicked(panic_message(payload.as_ref())),
        };

        let failure = SubscriberFailure {
            subscription: record.id,
            repo_path: repo_path.to_string(),
            changed: *changed,
            cause,
        };
        self.failures.fetch_add(1, Ordering::Relaxed);
        error!(
            subscription = %failure.subscription,
            filter = %record.filter,
            repo_path = %failure.repo_path,
            changed = %failure.changed,
            cause = %failure.cause,
            "subscriber callback failed"
        );
        Some(failure)
    }

    /// Failures contained since creation.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
