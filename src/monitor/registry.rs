//! Subscriber records and their lifecycle.
//!
//! The registry maps a [`SubscriptionId`] to a [`SubscriberRecord`]. Dispatch
//! never iterates the live map: it takes a [`SubscriptionRegistry::snapshot`]
//! first, so concurrent subscribe/unsubscribe calls cannot disturb a pass that
//! is already running.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::CallbackResult;
use crate::key::KeySet;
use crate::storage::RepoState;

/// Filter string that matches every repository.
pub const WILDCARD: &str = "*";

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Which repositories a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoFilter {
    /// Exactly this repo path.
    Repo(String),
    /// Every repo path.
    Any,
}

impl RepoFilter {
    #[must_use]
    pub fn matches(&self, repo_path: &str) -> bool {
        match self {
            Self::Repo(path) => path == repo_path,
            Self::Any => true,
        }
    }
}

impl From<&str> for RepoFilter {
    fn from(s: &str) -> Self {
        if s == WILDCARD {
            Self::Any
        } else {
            Self::Repo(s.to_string())
        }
    }
}

impl From<String> for RepoFilter {
    fn from(s: String) -> Self {
        if s == WILDCARD {
            Self::Any
        } else {
            Self::Repo(s)
        }
    }
}

impl fmt::Display for RepoFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repo(path) => f.write_str(path),
            Self::Any => f.write_str(WILDCARD),
        }
    }
}

/// Something that wants to hear about state changes.
///
/// Implementations must be fast and must not block: they run synchronously on
/// the thread that called `update`. They receive the live aggregate, which may
/// already reflect later updates than the one that triggered the call, so they
/// should re-read every field they depend on.
pub trait Subscriber: Send + Sync {
    /// Called once per matching update.
    fn on_state_changed(
        &self,
        repo_path: &str,
        changed: &KeySet,
        state: &RepoState,
    ) -> CallbackResult;
}

struct FnSubscriber<F>(F);

impl<F> Subscriber for FnSubscriber<F>
where
    F: Fn(&str, &RepoState) -> CallbackResult + Send + Sync,
{
    fn on_state_changed(
        &self,
        repo_path: &str,
        _changed: &KeySet,
        state: &RepoState,
    ) -> CallbackResult {
        (self.0)(repo_path, state)
    }
}

/// Adapt a plain `(repo_path, state)` callback into a [`Subscriber`].
pub fn subscriber_fn<F>(f: F) -> Arc<dyn Subscriber>
where
    F: Fn(&str, &RepoState) -> CallbackResult + Send + Sync + 'static,
{
    Arc::new(FnSubscriber(f))
}

/// One registered subscription.
pub struct SubscriberRecord {
    /// Identity used for removal and in failure logs.
    pub id: SubscriptionId,
    /// Repositories this record listens to.
    pub filter: RepoFilter,
    /// Keys that trigger a call.
    pub interest: KeySet,
    seq: u64,
    subscriber: Arc<dyn Subscriber>,
}

impl SubscriberRecord {
    /// True if an update of `changed` keys on `repo_path` concerns this record.
    #[must_use]
    pub fn matches(&self, repo_path: &str, changed: &KeySet) -> bool {
        self.filter.matches(repo_path) && self.interest.intersects(changed)
    }

    pub(crate) fn subscriber(&self) -> &dyn Subscriber {
        self.subscriber.as_ref()
    }
}

impl fmt::Debug for SubscriberRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRecord")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .field("interest", &self.interest)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct RegistryInner {
    records: RwLock<HashMap<SubscriptionId, Arc<SubscriberRecord>>>,
    next_seq: AtomicU64,
}

impl RegistryInner {
    fn remove(&self, id: SubscriptionId) -> bool {
        let removed = self.records.write().remove(&id).is_some();
        if removed {
            debug!(subscription = %id, "unsubscribed");
        }
        removed
    }
}

/// Thread-safe set of subscriber records.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` and return the handle that removes it again.
    pub fn subscribe(
        &self,
        filter: RepoFilter,
        interest: KeySet,
        subscriber: Arc<dyn Subscriber>,
    ) -> Subscription {
        let id = SubscriptionId::new();
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        debug!(subscription = %id, %filter, %interest, "subscribed");

        let record = Arc::new(SubscriberRecord {
            id,
            filter,
            interest,
            seq,
            subscriber,
        });
        self.inner.records.write().insert(id, record);

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
            released: AtomicBool::new(false),
        }
    }

    /// Remove a record. Unknown or already removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.remove(id);
    }

    /// Registered records in registration order, detached from the live map.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<SubscriberRecord>> {
        let mut records: Vec<Arc<SubscriberRecord>> =
            self.inner.records.read().values().cloned().collect();
        records.sort_by_key(|r| r.seq);
        records
    }

    #[must_use]
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.inner.records.read().contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

/// Handle to a registered subscription.
///
/// Dropping the handle unsubscribes. Call [`Subscription::detach`] to keep the
/// subscription for as long as the registry lives.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<RegistryInner>,
    released: AtomicBool,
}

impl Subscription {
    /// The id backing this subscription.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the subscription. Idempotent.
    pub fn unsubscribe(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }

    /// Give up the handle without unsubscribing.
    pub fn detach(self) -> SubscriptionId {
        self.released.store(true, Ordering::Release);
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
