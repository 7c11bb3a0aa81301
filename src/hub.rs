//! The state hub: store, registry, dispatcher and error boundary bundled into
//! one instantiable service.
//!
//! `update` merges under the store's locks, releases them, and only then
//! dispatches on the caller's thread. A subscriber may therefore call back
//! into the hub (`get`, `update`, `subscribe`) without deadlocking, at the
//! price of latest-wins reads: the state it is handed may already include a
//! racing update that happened after the one that triggered it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::error::{CallbackResult, StateResult};
use crate::key::{KeySet, StateKey};
use crate::model::Stash;
use crate::monitor::stream::ChannelSubscriber;
use crate::monitor::{
    subscriber_fn, DispatchReport, NotificationDispatcher, RepoFilter, StateWatch, Subscriber,
    Subscription, SubscriptionId, SubscriptionRegistry,
};
use crate::repo_store::{RepoPath, RepoStorePatch};
use crate::stash::parse_stash_list;
use crate::storage::{InMemoryStateStore, RepoState, StateStore};

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct StateHubConfig {
    /// Repositories to reserve room for up front.
    pub initial_repo_capacity: usize,
    /// Callbacks slower than this are logged at `warn`. `None` disables the check.
    pub slow_callback_threshold: Option<Duration>,
    /// Queue length used by [`StateHub::watch`].
    pub default_watch_capacity: usize,
}

impl Default for StateHubConfig {
    fn default() -> Self {
        Self {
            initial_repo_capacity: 64,
            slow_callback_threshold: Some(Duration::from_millis(50)),
            default_watch_capacity: 1024,
        }
    }
}

/// Counters describing hub activity.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub repos: usize,
    pub subscribers: usize,
    pub updates: u64,
    pub notifications_delivered: u64,
    pub callback_failures: u64,
    pub last_update_at: Option<DateTime<Utc>>,
}

/// Process-scoped publish-subscribe store of repository state.
pub struct StateHub {
    cfg: StateHubConfig,
    store: Box<dyn StateStore>,
    dispatcher: NotificationDispatcher,
    updates: AtomicU64,
    last_update_at: Mutex<Option<DateTime<Utc>>>,
}

impl StateHub {
    /// Create a hub backed by an in-memory store.
    #[must_use]
    pub fn new(cfg: StateHubConfig) -> Self {
        let store = InMemoryStateStore::with_capacity(cfg.initial_repo_capacity.max(1));
        Self::with_store(cfg, Box::new(store))
    }

    /// Create a hub over a custom store.
    #[must_use]
    pub fn with_store(cfg: StateHubConfig, store: Box<dyn StateStore>) -> Self {
        let dispatcher =
            NotificationDispatcher::new(SubscriptionRegistry::new(), cfg.slow_callback_threshold);
        Self {
            cfg,
            store,
            dispatcher,
            updates: AtomicU64::new(0),
            last_update_at: Mutex::new(None),
        }
    }

    /// The process-wide hub, created with the default config on first use.
    ///
    /// Prefer an owned `StateHub` where isolation matters (tests, embedding).
    pub fn global() -> &'static StateHub {
        static GLOBAL: OnceLock<StateHub> = OnceLock::new();
        GLOBAL.get_or_init(|| StateHub::new(StateHubConfig::default()))
    }

    /// The configuration this hub was created with.
    #[must_use]
    pub const fn config(&self) -> &StateHubConfig {
        &self.cfg
    }

    /// Live state of `repo_path`, created on first access.
    #[must_use]
    pub fn get(&self, repo_path: &str) -> RepoState {
        self.store.get(repo_path)
    }

    /// Merge `patch` into `repo_path` and notify interested subscribers.
    ///
    /// Returns exactly the keys `patch` supplied. Subscriber failures are
    /// contained and logged; they never reach the caller.
    pub fn update(&self, repo_path: &str, patch: RepoStorePatch) -> KeySet {
        let changed = self.store.update(repo_path, patch);
        self.publish(repo_path, changed);
        changed
    }

    /// Merge an untyped JSON patch.
    ///
    /// Fails before touching any state if the patch names a field outside the
    /// vocabulary or carries a value of the wrong shape.
    pub fn update_json(&self, repo_path: &str, patch: &serde_json::Value) -> StateResult<KeySet> {
        let patch = RepoStorePatch::from_json(patch)?;
        Ok(self.update(repo_path, patch))
    }

    /// Record `branch` as the most recently used branch of `repo_path`.
    pub fn remember_branch(&self, repo_path: &str, branch: &str) {
        let changed = self.store.modify(repo_path, &mut |repo| {
            repo.last_branches.push(branch);
            KeySet::single(StateKey::LastBranches)
        });
        self.publish(repo_path, changed);
    }

    /// Parse `git stash list` output and publish it under `stashes`.
    pub fn record_stashes(&self, repo_path: &str, stash_list_stdout: &str) -> Vec<Stash> {
        let stashes = parse_stash_list(stash_list_stdout);
        self.update(repo_path, RepoStorePatch::new().with_stashes(stashes.clone()));
        stashes
    }

    fn publish(&self, repo_path: &str, changed: KeySet) -> DispatchReport {
        self.updates.fetch_add(1, Ordering::Relaxed);
        *self.last_update_at.lock() = Some(Utc::now());
        debug!(repo_path, changed = %changed, "state updated");

        let state = self.store.get(repo_path);
        self.dispatcher.dispatch(repo_path, &changed, &state)
    }

    /// Call `callback` whenever an update to a repo matching `filter` touches
    /// any of `interest`. Drop the returned handle to unsubscribe.
    pub fn subscribe<F>(
        &self,
        filter: impl Into<RepoFilter>,
        interest: impl Into<KeySet>,
        callback: F,
    ) -> Subscription
    where
        F: Fn(&str, &RepoState) -> CallbackResult + Send + Sync + 'static,
    {
        self.subscribe_subscriber(filter, interest, subscriber_fn(callback))
    }

    /// Register a [`Subscriber`] implementation.
    pub fn subscribe_subscriber(
        &self,
        filter: impl Into<RepoFilter>,
        interest: impl Into<KeySet>,
        subscriber: Arc<dyn Subscriber>,
    ) -> Subscription {
        self.dispatcher
            .registry()
            .subscribe(filter.into(), interest.into(), subscriber)
    }

    /// Queue matching changes on a bounded channel instead of calling back.
    #[must_use]
    pub fn watch(&self, filter: impl Into<RepoFilter>, interest: impl Into<KeySet>) -> StateWatch {
        self.watch_with_capacity(filter, interest, self.cfg.default_watch_capacity)
    }

    /// [`StateHub::watch`] with an explicit queue length.
    #[must_use]
    pub fn watch_with_capacity(
        &self,
        filter: impl Into<RepoFilter>,
        interest: impl Into<KeySet>,
        capacity: usize,
    ) -> StateWatch {
        let (sub, rx, dropped) = ChannelSubscriber::new(capacity);
        let subscription = self.subscribe_subscriber(filter, interest, Arc::new(sub));
        StateWatch::new(subscription, rx, dropped)
    }

    /// Remove a subscription by id. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.dispatcher.registry().unsubscribe(id);
    }

    /// Live subscriptions, callbacks and watches alike.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.dispatcher.registry().len()
    }

    /// Every repo path touched so far, sorted.
    #[must_use]
    pub fn repo_paths(&self) -> Vec<RepoPath> {
        self.store.repo_paths()
    }

    /// Point-in-time activity counters.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            repos: self.store.len(),
            subscribers: self.subscriber_count(),
            updates: self.updates.load(Ordering::Relaxed),
            notifications_delivered: self.dispatcher.delivered(),
            callback_failures: self.dispatcher.failures(),
            last_update_at: *self.last_update_at.lock(),
        }
    }
}

impl Default for StateHub {
    fn default() -> Self {
        Self::new(StateHubConfig::default())
    }
}

impl std::fmt::Debug for StateHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateHub")
            .field("cfg", &self.cfg)
            .field("repos", &self.store.len())
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}
