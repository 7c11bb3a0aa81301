//! In-memory storage backend.
//!
//! The repo map sits behind one mutex that only guards structural changes
//! (lazy creation). Each aggregate has its own `RwLock`; merges take the write
//! side, so a reader sees a patch either fully applied or not at all. The map
//! lock is always released before an aggregate lock is taken.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tracing::trace;

use crate::key::KeySet;
use crate::repo_store::{RepoPath, RepoStore, RepoStorePatch};
use crate::storage::traits::StateStore;

/// Live, shared handle to one repository's aggregate.
///
/// Cloning is cheap and every clone observes the same, latest values. A
/// subscriber handed a `RepoState` may therefore see state newer than the
/// update that notified it.
///
/// Do not hold a [`RepoState::read`] guard while updating the same repository
/// from the same thread; the update waits for the guard and deadlocks.
/// Read guards are not recursive either: a second `read()` on the same repo
/// while the first guard is alive blocks as soon as another thread is waiting
/// to write. Callbacks that read more than once should take one
/// [`RepoState::snapshot`] instead.
#[derive(Clone, Default)]
pub struct RepoState {
    inner: Arc<RwLock<RepoStore>>,
}

impl RepoState {
    fn new() -> Self {
        Self::default()
    }

    /// Shared read access to the current values.
    pub fn read(&self) -> RwLockReadGuard<'_, RepoStore> {
        self.inner.read()
    }

    /// Owned copy of the current values.
    #[must_use]
    pub fn snapshot(&self) -> RepoStore {
        self.inner.read().clone()
    }

    /// True if both handles point at the same aggregate.
    #[must_use]
    pub fn ptr_eq(&self, other: &RepoState) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn apply(&self, patch: RepoStorePatch) -> KeySet {
        self.inner.write().apply(patch)
    }

    fn modify(&self, f: &mut dyn FnMut(&mut RepoStore) -> KeySet) -> KeySet {
        let mut guard = self.inner.write();
        f(&mut *guard)
    }
}

impl fmt::Debug for RepoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_read() {
            Some(store) => f.debug_tuple("RepoState").field(&*store).finish(),
            None => f.write_str("RepoState(<locked>)"),
        }
    }
}

/// Thread-safe in-memory state store.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    repos: Mutex<HashMap<RepoPath, RepoState>>,
}

impl InMemoryStateStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with room for `capacity` repositories.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            repos: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    fn entry(&self, repo_path: &str) -> RepoState {
        let mut repos = self.repos.lock();
        if let Some(state) = repos.get(repo_path) {
            return state.clone();
        }

        trace!(repo_path, "creating initial repo state");
        let state = RepoState::new();
        repos.insert(repo_path.to_string(), state.clone());
        state
    }
}

impl StateStore for InMemoryStateStore {
    fn get(&self, repo_path: &str) -> RepoState {
        self.entry(repo_path)
    }

    fn update(&self, repo_path: &str, patch: RepoStorePatch) -> KeySet {
        self.entry(repo_path).apply(patch)
    }

    fn modify(&self, repo_path: &str, f: &mut dyn FnMut(&mut RepoStore) -> KeySet) -> KeySet {
        self.entry(repo_path).modify(f)
    }

    fn contains(&self, repo_path: &str) -> bool {
        self.repos.lock().contains_key(repo_path)
    }

    fn repo_paths(&self) -> Vec<RepoPath> {
        let mut paths: Vec<RepoPath> = self.repos.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn len(&self) -> usize {
        self.repos.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    use crate::key::StateKey;
    use crate::model::{HeadState, WorkingDirState};

    #[test]
    fn get_creates_initial_state_once() {
        let store = InMemoryStateStore::new();
        assert!(store.is_empty());
        assert!(!store.contains("/repo"));

        let first = store.get("/repo");
        let second = store.get("/repo");
        assert!(first.ptr_eq(&second));
        assert_eq!(store.len(), 1);
        assert_eq!(first.snapshot(), RepoStore::initial());
    }

    #[test]
    fn any_string_is_a_valid_repo_path() {
        let store = InMemoryStateStore::new();
        store.get("");
        store.get("not a path at all");
        store.get("*");
        assert_eq!(store.repo_paths(), ["", "*", "not a path at all"]);
    }

    #[test]
    fn update_merges_into_live_handle() {
        let store = InMemoryStateStore::new();
        let live = store.get("/repo");

        store.update(
            "/repo",
            RepoStorePatch::new().with_head(HeadState {
                branch: Some("main".to_string()),
                ..HeadState::default()
            }),
        );
        let changed =
            store.update("/repo", RepoStorePatch::new().with_status(WorkingDirState::default()));

        assert_eq!(changed, KeySet::single(StateKey::Status));
        let state = live.read();
        assert_eq!(state.status, Some(WorkingDirState::default()));
        assert_eq!(state.head.as_ref().and_then(|h| h.branch.as_deref()), Some("main"));
    }

    #[test]
    fn update_on_unknown_repo_creates_it() {
        let store = InMemoryStateStore::new();
        store.update("/fresh", RepoStorePatch::new().with_short_hash_length(9));
        assert!(store.contains("/fresh"));
        let state = store.get("/fresh").snapshot();
        assert_eq!(state.short_hash_length, Some(9));
        assert_eq!(state.last_branches.as_slice(), &[None, None]);
    }

    #[test]
    fn modify_is_exclusive_read_modify_write() {
        let store = InMemoryStateStore::new();

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        store.modify("/repo", &mut |repo| {
                            let len = repo.short_hash_length.unwrap_or(0);
                            repo.short_hash_length = Some(len + 1);
                            KeySet::single(StateKey::ShortHashLength)
                        });
                    }
                });
            }
        });

        assert_eq!(store.get("/repo").read().short_hash_length, Some(400));
    }
}
