//! The per-repository aggregate and the partial patch merged into it.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::StateResult;
use crate::history::BranchHistory;
use crate::key::{KeySet, StateKey};
use crate::model::{Branch, Commit, HeadState, Stash, TagList, WorkingDirState};

/// Opaque repository identifier, usually a filesystem path.
pub type RepoPath = String;

/// Everything currently known about one repository.
///
/// Absent fields are `None`, never an empty container. The branch history is
/// the one exception: it always holds exactly two slots.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoStore {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkingDirState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<HeadState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<Branch>>,
    /// Remote name to URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remotes: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_tags: Option<TagList>,
    pub last_branches: BranchHistory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_local_branch_for_rebase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_remote_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_remote_used_for_push: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_remote_used_with_option_all: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reset_mode_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_hash_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stashes: Option<Vec<Stash>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_commits: Option<Vec<Commit>>,
    /// Branch name to description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptions: Option<BTreeMap<String, String>>,
}

impl RepoStore {
    /// The state of a repository nobody has reported on yet.
    #[must_use]
    pub fn initial() -> Self {
        Self::default()
    }

    /// Keys that currently hold a value. The branch history always counts.
    #[must_use]
    pub fn present_keys(&self) -> KeySet {
        let mut keys = KeySet::single(StateKey::LastBranches);
        let mut mark = |present: bool, key: StateKey| {
            if present {
                keys.insert(key);
            }
        };
        mark(self.status.is_some(), StateKey::Status);
        mark(self.head.is_some(), StateKey::Head);
        mark(self.long_status.is_some(), StateKey::LongStatus);
        mark(self.short_status.is_some(), StateKey::ShortStatus);
        mark(self.branches.is_some(), StateKey::Branches);
        mark(self.remotes.is_some(), StateKey::Remotes);
        mark(self.local_tags.is_some(), StateKey::LocalTags);
        mark(self.last_local_branch_for_rebase.is_some(), StateKey::LastLocalBranchForRebase);
        mark(self.last_remote_used.is_some(), StateKey::LastRemoteUsed);
        mark(self.last_remote_used_for_push.is_some(), StateKey::LastRemoteUsedForPush);
        mark(
            self.last_remote_used_with_option_all.is_some(),
            StateKey::LastRemoteUsedWithOptionAll,
        );
        mark(self.last_reset_mode_used.is_some(), StateKey::LastResetModeUsed);
        mark(self.short_hash_length.is_some(), StateKey::ShortHashLength);
        mark(self.stashes.is_some(), StateKey::Stashes);
        mark(self.recent_commits.is_some(), StateKey::RecentCommits);
        mark(self.descriptions.is_some(), StateKey::Descriptions);
        keys
    }

    /// Shallow-merge `patch`: each supplied field replaces the stored one,
    /// everything else is left untouched. Returns the supplied keys.
    pub fn apply(&mut self, patch: RepoStorePatch) -> KeySet {
        let keys = patch.keys();
        let RepoStorePatch {
            status,
            head,
            long_status,
            short_status,
            branches,
            remotes,
            local_tags,
            last_branches,
            last_local_branch_for_rebase,
            last_remote_used,
            last_remote_used_for_push,
            last_remote_used_with_option_all,
            last_reset_mode_used,
            short_hash_length,
            stashes,
            recent_commits,
            descriptions,
        } = patch;

        fn set<T>(slot: &mut Option<T>, value: Option<T>) {
            if let Some(v) = value {
                *slot = Some(v);
            }
        }

        fn set_nullable<T>(slot: &mut Option<T>, value: Option<Option<T>>) {
            if let Some(v) = value {
                *slot = v;
            }
        }

        set(&mut self.status, status);
        set(&mut self.head, head);
        set(&mut self.long_status, long_status);
        set(&mut self.short_status, short_status);
        set(&mut self.branches, branches);
        set(&mut self.remotes, remotes);
        set(&mut self.local_tags, local_tags);
        if let Some(history) = last_branches {
            self.last_branches = history;
        }
        set_nullable(&mut self.last_local_branch_for_rebase, last_local_branch_for_rebase);
        set_nullable(&mut self.last_remote_used, last_remote_used);
        set_nullable(&mut self.last_remote_used_for_push, last_remote_used_for_push);
        set_nullable(
            &mut self.last_remote_used_with_option_all,
            last_remote_used_with_option_all,
        );
        set_nullable(&mut self.last_reset_mode_used, last_reset_mode_used);
        set(&mut self.short_hash_length, short_hash_length);
        set(&mut self.stashes, stashes);
        set(&mut self.recent_commits, recent_commits);
        set(&mut self.descriptions, descriptions);

        keys
    }
}

/// A partial update of a [`RepoStore`].
///
/// `None` means "not supplied". The "last used" fields are nullable in the
/// aggregate, so their patch type is `Option<Option<String>>`: `Some(None)`
/// clears the stored value. From JSON an explicit `null` clears and an
/// omitted field is left alone; `null` for any other field is rejected, as
/// are field names outside the vocabulary.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepoStorePatch {
    #[serde(deserialize_with = "non_null")]
    pub status: Option<WorkingDirState>,
    #[serde(deserialize_with = "non_null")]
    pub head: Option<HeadState>,
    #[serde(deserialize_with = "non_null")]
    pub long_status: Option<String>,
    #[serde(deserialize_with = "non_null")]
    pub short_status: Option<String>,
    #[serde(deserialize_with = "non_null")]
    pub branches: Option<Vec<Branch>>,
    #[serde(deserialize_with = "non_null")]
    pub remotes: Option<BTreeMap<String, String>>,
    #[serde(deserialize_with = "non_null")]
    pub local_tags: Option<TagList>,
    #[serde(deserialize_with = "non_null")]
    pub last_branches: Option<BranchHistory>,
    #[serde(deserialize_with = "explicit_null")]
    pub last_local_branch_for_rebase: Option<Option<String>>,
    #[serde(deserialize_with = "explicit_null")]
    pub last_remote_used: Option<Option<String>>,
    #[serde(deserialize_with = "explicit_null")]
    pub last_remote_used_for_push: Option<Option<String>>,
    #[serde(deserialize_with = "explicit_null")]
    pub last_remote_used_with_option_all: Option<Option<String>>,
    #[serde(deserialize_with = "explicit_null")]
    pub last_reset_mode_used: Option<Option<String>>,
    #[serde(deserialize_with = "non_null")]
    pub short_hash_length: Option<usize>,
    #[serde(deserialize_with = "non_null")]
    pub stashes: Option<Vec<Stash>>,
    #[serde(deserialize_with = "non_null")]
    pub recent_commits: Option<Vec<Commit>>,
    #[serde(deserialize_with = "non_null")]
    pub descriptions: Option<BTreeMap<String, String>>,
}

// Only runs when the field is present; `null` is not a value for these fields.
fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// Only runs when the field is present, so `null` becomes `Some(None)`.
fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl RepoStorePatch {
    /// An empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a dynamic patch, rejecting unknown field names.
    pub fn from_json(value: &serde_json::Value) -> StateResult<Self> {
        Ok(Self::deserialize(value)?)
    }

    /// Parse a dynamic patch from a JSON string.
    pub fn from_json_str(s: &str) -> StateResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Exactly the keys this patch supplies.
    #[must_use]
    pub fn keys(&self) -> KeySet {
        let mut keys = KeySet::new();
        let mut mark = |present: bool, key: StateKey| {
            if present {
                keys.insert(key);
            }
        };
        mark(self.status.is_some(), StateKey::Status);
        mark(self.head.is_some(), StateKey::Head);
        mark(self.long_status.is_some(), StateKey::LongStatus);
        mark(self.short_status.is_some(), StateKey::ShortStatus);
        mark(self.branches.is_some(), StateKey::Branches);
        mark(self.remotes.is_some(), StateKey::Remotes);
        mark(self.local_tags.is_some(), StateKey::LocalTags);
        mark(self.last_branches.is_some(), StateKey::LastBranches);
        mark(self.last_local_branch_for_rebase.is_some(), StateKey::LastLocalBranchForRebase);
        mark(self.last_remote_used.is_some(), StateKey::LastRemoteUsed);
        mark(self.last_remote_used_for_push.is_some(), StateKey::LastRemoteUsedForPush);
        mark(
            self.last_remote_used_with_option_all.is_some(),
            StateKey::LastRemoteUsedWithOptionAll,
        );
        mark(self.last_reset_mode_used.is_some(), StateKey::LastResetModeUsed);
        mark(self.short_hash_length.is_some(), StateKey::ShortHashLength);
        mark(self.stashes.is_some(), StateKey::Stashes);
        mark(self.recent_commits.is_some(), StateKey::RecentCommits);
        mark(self.descriptions.is_some(), StateKey::Descriptions);
        keys
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    #[must_use]
    pub fn with_status(mut self, status: WorkingDirState) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_head(mut self, head: HeadState) -> Self {
        self.head = Some(head);
        self
    }

    #[must_use]
    pub fn with_long_status(mut self, long_status: impl Into<String>) -> Self {
        self.long_status = Some(long_status.into());
        self
    }

    #[must_use]
    pub fn with_short_status(mut self, short_status: impl Into<String>) -> Self {
        self.short_status = Some(short_status.into());
        self
    }

    #[must_use]
    pub fn with_branches(mut self, branches: Vec<Branch>) -> Self {
        self.branches = Some(branches);
        self
    }

    #[must_use]
    pub fn with_remotes(mut self, remotes: BTreeMap<String, String>) -> Self {
        self.remotes = Some(remotes);
        self
    }

    #[must_use]
    pub fn with_local_tags(mut self, tags: TagList) -> Self {
        self.local_tags = Some(tags);
        self
    }

    #[must_use]
    pub fn with_last_branches(mut self, history: BranchHistory) -> Self {
        self.last_branches = Some(history);
        self
    }

    #[must_use]
    pub fn with_last_local_branch_for_rebase(mut self, branch: Option<String>) -> Self {
        self.last_local_branch_for_rebase = Some(branch);
        self
    }

    #[must_use]
    pub fn with_last_remote_used(mut self, remote: Option<String>) -> Self {
        self.last_remote_used = Some(remote);
        self
    }

    #[must_use]
    pub fn with_last_remote_used_for_push(mut self, remote: Option<String>) -> Self {
        self.last_remote_used_for_push = Some(remote);
        self
    }

    #[must_use]
    pub fn with_last_remote_used_with_option_all(mut self, remote: Option<String>) -> Self {
        self.last_remote_used_with_option_all = Some(remote);
        self
    }

    #[must_use]
    pub fn with_last_reset_mode_used(mut self, mode: Option<String>) -> Self {
        self.last_reset_mode_used = Some(mode);
        self
    }

    #[must_use]
    pub fn with_short_hash_length(mut self, len: usize) -> Self {
        self.short_hash_length = Some(len);
        self
    }

    #[must_use]
    pub fn with_stashes(mut self, stashes: Vec<Stash>) -> Self {
        self.stashes = Some(stashes);
        self
    }

    #[must_use]
    pub fn with_recent_commits(mut self, commits: Vec<Commit>) -> Self {
        self.recent_commits = Some(commits);
        self
    }

    #[must_use]
    pub fn with_descriptions(mut self, descriptions: BTreeMap<String, String>) -> Self {
        self.descriptions = Some(descriptions);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn head_on(branch: &str) -> HeadState {
        HeadState {
            branch: Some(branch.to_string()),
            ..HeadState::default()
        }
    }

    #[test]
    fn initial_state_only_has_branch_history() {
        let store = RepoStore::initial();
        assert_eq!(store.present_keys(), KeySet::single(StateKey::LastBranches));
        assert_eq!(store.last_branches.as_slice(), &[None, None]);
        assert!(store.status.is_none());
        assert!(store.branches.is_none());
        assert!(store.remotes.is_none());
    }

    #[test]
    fn apply_overwrites_only_supplied_fields() {
        let mut store = RepoStore::initial();
        store.apply(RepoStorePatch::new().with_head(head_on("main")));

        let changed = store.apply(
            RepoStorePatch::new()
                .with_status(WorkingDirState::default())
                .with_short_status("clean"),
        );

        assert_eq!(changed, KeySet::from([StateKey::Status, StateKey::ShortStatus]));
        assert_eq!(store.head, Some(head_on("main")));
        assert_eq!(store.short_status.as_deref(), Some("clean"));
        assert!(store.long_status.is_none());
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut store = RepoStore::initial();
        let changed = store.apply(RepoStorePatch::new());
        assert!(changed.is_empty());
        assert_eq!(store, RepoStore::initial());
    }

    #[test]
    fn nullable_field_can_be_cleared() {
        let mut store = RepoStore::initial();
        store.apply(RepoStorePatch::new().with_last_remote_used(Some("origin".to_string())));
        assert_eq!(store.last_remote_used.as_deref(), Some("origin"));

        let changed = store.apply(RepoStorePatch::new().with_last_remote_used(None));
        assert_eq!(changed, KeySet::single(StateKey::LastRemoteUsed));
        assert!(store.last_remote_used.is_none());
    }

    #[test]
    fn json_patch_distinguishes_null_from_missing() {
        let patch = RepoStorePatch::from_json(&json!({
            "last_remote_used": null,
            "short_hash_length": 7
        }))
        .unwrap();

        assert_eq!(patch.last_remote_used, Some(None));
        assert_eq!(patch.last_remote_used_for_push, None);
        assert_eq!(
            patch.keys(),
            KeySet::from([StateKey::LastRemoteUsed, StateKey::ShortHashLength])
        );
    }

    #[test]
    fn json_patch_rejects_unknown_fields() {
        let err = RepoStorePatch::from_json_str(r#"{"status_of_view": 1}"#).unwrap_err();
        assert!(err.is_invalid_patch());
        assert!(err.to_string().contains("status_of_view"));
    }

    #[test]
    fn json_patch_rejects_null_for_non_nullable_fields() {
        for field in ["status", "head", "branches", "last_branches", "short_hash_length"] {
            let err = RepoStorePatch::from_json(&json!({ field: null })).unwrap_err();
            assert!(err.is_invalid_patch(), "{field}: {err}");
        }

        let err = RepoStorePatch::from_json(&json!({"short_status": "x", "status": null}))
            .unwrap_err();
        assert!(err.is_invalid_patch());
    }

    #[test]
    fn json_patch_with_stashes_and_remotes() {
        let patch = RepoStorePatch::from_json(&json!({
            "stashes": [{"id": "0", "description": "wip"}],
            "remotes": {"origin": "git@example.com:a/b.git"}
        }))
        .unwrap();

        let mut store = RepoStore::initial();
        store.apply(patch);
        assert_eq!(store.stashes.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            store.remotes.as_ref().and_then(|r| r.get("origin")).map(String::as_str),
            Some("git@example.com:a/b.git")
        );
    }

    #[test]
    fn serialized_store_omits_absent_fields() {
        let mut store = RepoStore::initial();
        store.apply(RepoStorePatch::new().with_short_hash_length(7));
        let value = serde_json::to_value(&store).unwrap();
        assert_eq!(value, json!({"last_branches": [null, null], "short_hash_length": 7}));
    }
}
