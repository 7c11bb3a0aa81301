use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::error::CallbackResult;
use crate::key::KeySet;
use crate::storage::RepoState;

use super::registry::{Subscriber, Subscription, SubscriptionId};

/// A change notification delivered through a [`StateWatch`].
///
/// Only the repo path and the changed keys travel through the channel; read
/// the values themselves from the store when handling the change.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub repo_path: String,
    pub changed: KeySet,
    pub at: DateTime<Utc>,
}

/// Errors receiving from a [`StateWatch`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WatchError {
    #[error("Timed out after {duration_ms}ms waiting for a state change")]
    Timeout { duration_ms: u64 },

    #[error("No state change queued")]
    Empty,

    #[error("State watch disconnected")]
    Disconnected,
}

pub(crate) struct ChannelSubscriber {
    tx: Sender<StateChange>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSubscriber {
    pub(crate) fn new(capacity: usize) -> (Self, Receiver<StateChange>, Arc<AtomicU64>) {
        let (tx, rx) = bounded(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let sub = Self {
            tx,
            dropped: Arc::clone(&dropped),
        };
        (sub, rx, dropped)
    }
}

impl Subscriber for ChannelSubscriber {
    fn on_state_changed(
        &self,
        repo_path: &str,
        changed: &KeySet,
        _state: &RepoState,
    ) -> CallbackResult {
        let change = StateChange {
            repo_path: repo_path.to_string(),
            changed: *changed,
            at: Utc::now(),
        };

        // Never block the updating thread: drop if the watcher is slow.
        match self.tx.try_send(change) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(repo_path, changed = %changed, dropped, "state watch full, change dropped");
            }
        }
        Ok(())
    }
}

/// A subscription that queues [`StateChange`]s instead of running a callback.
///
/// Dropping the watch unsubscribes.
#[derive(Debug)]
pub struct StateWatch {
    subscription: Subscription,
    rx: Receiver<StateChange>,
    dropped: Arc<AtomicU64>,
}

impl StateWatch {
    pub(crate) fn new(
        subscription: Subscription,
        rx: Receiver<StateChange>,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        Self {
            subscription,
            rx,
            dropped,
        }
    }

    /// The subscription id backing this watch.
    #[must_use]
    pub const fn subscription_id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    /// Stop receiving changes. Idempotent; queued changes stay readable.
    pub fn unsubscribe(&self) {
        self.subscription.unsubscribe();
    }

    /// Receive the next change (blocking).
    pub fn recv(&self) -> Result<StateChange, WatchError> {
        self.rx.recv().map_err(|_| WatchError::Disconnected)
    }

    /// Receive the next change with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<StateChange, WatchError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => WatchError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            },
            RecvTimeoutError::Disconnected => WatchError::Disconnected,
        })
    }

    /// Receive a queued change without waiting.
    pub fn try_recv(&self) -> Result<StateChange, WatchError> {
        self.rx.try_recv().map_err(|err| match err {
            TryRecvError::Empty => WatchError::Empty,
            TryRecvError::Disconnected => WatchError::Disconnected,
        })
    }

    /// Drain every queued change.
    pub fn drain(&self) -> Vec<StateChange> {
        self.rx.try_iter().collect()
    }

    /// Changes dropped because the queue was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
