//! Notification dispatch.
//!
//! One dispatch pass runs per `update`, on the updating thread, after the
//! store locks have been released. It walks a registry snapshot taken at the
//! start of the pass and calls every record whose repo filter and interest
//! keys match, each through the [`ErrorBoundary`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::key::KeySet;
use crate::storage::RepoState;

use super::boundary::ErrorBoundary;
use super::registry::SubscriptionRegistry;

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Records whose filter and interest matched.
    pub matched: usize,
    /// Matched records whose callback failed.
    pub failed: usize,
}

/// Fans a state change out to matching subscribers.
#[derive(Debug)]
pub struct NotificationDispatcher {
    registry: SubscriptionRegistry,
    boundary: ErrorBoundary,
    slow_callback_threshold: Option<Duration>,
    delivered: AtomicU64,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(registry: SubscriptionRegistry, slow_callback_threshold: Option<Duration>) -> Self {
        Self {
            registry,
            boundary: ErrorBoundary::new(),
            slow_callback_threshold,
            delivered: AtomicU64::new(0),
        }
    }

    /// Notify every subscriber interested in `changed` keys of `repo_path`.
    ///
    /// No ordering among subscribers is promised. Callbacks receive the live
    /// `state`, which may already include later updates.
    pub fn dispatch(&self, repo_path: &str, changed: &KeySet, state: &RepoState) -> DispatchReport {
        let mut report = DispatchReport::default();
        if changed.is_empty() {
            return report;
        }

        for record in self.registry.snapshot() {
            if !record.matches(repo_path, changed) {
                continue;
            }
            report.matched += 1;

            let started = Instant::now();
            if self.boundary.run(&record, repo_path, changed, state).is_some() {
                report.failed += 1;
            } else {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }

            let elapsed = started.elapsed();
            if let Some(threshold) = self.slow_callback_threshold {
                if elapsed > threshold {
                    warn!(
                        subscription = %record.id,
                        repo_path,
                        changed = %changed,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "slow subscriber callback"
                    );
                }
            }
        }

        trace!(
            repo_path,
            changed = %changed,
            matched = report.matched,
            failed = report.failed,
            "dispatched"
        );
        report
    }

    /// The registry this dispatcher reads from.
    #[must_use]
    pub const fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Callbacks that completed without error.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Callbacks that failed and were contained.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.boundary.failures()
    }
}
