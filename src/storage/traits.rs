//! Storage contract for repository state.
//!
//! Every operation is total: unknown repo paths are created on first touch
//! and nothing here returns an error.

use crate::key::KeySet;
use crate::repo_store::{RepoPath, RepoStore, RepoStorePatch};
use crate::storage::RepoState;

/// Keyed store of repository aggregates.
///
/// # Concurrency
/// - Implementations must be safe to share across threads
/// - A merge must be atomic: no reader may observe half of a patch applied
pub trait StateStore: Send + Sync {
    /// Live handle to the aggregate for `repo_path`, created on first access.
    fn get(&self, repo_path: &str) -> RepoState;

    /// Merge `patch` into the aggregate and return the keys it supplied.
    fn update(&self, repo_path: &str, patch: RepoStorePatch) -> KeySet;

    /// Run `f` with exclusive access to the aggregate and return the keys it
    /// reports as changed. Used for read-modify-write updates.
    fn modify(&self, repo_path: &str, f: &mut dyn FnMut(&mut RepoStore) -> KeySet) -> KeySet;

    /// True if `repo_path` has been touched before.
    fn contains(&self, repo_path: &str) -> bool;

    /// Every repo path touched so far, sorted.
    fn repo_paths(&self) -> Vec<RepoPath>;

    /// Number of repositories held.
    fn len(&self) -> usize;

    /// True if no repository has been touched.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
