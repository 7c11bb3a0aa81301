//! Facts about a repository, as produced by version-control query collaborators.
//!
//! The store treats all of these as opaque values: it merges and hands them
//! out but never inspects them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of one path in the working directory or index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    /// Current path.
    pub path: String,
    /// Original path for renames and copies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_alt: Option<String>,
    /// Index status code (porcelain `X`).
    pub index_status: String,
    /// Working tree status code (porcelain `Y`).
    pub working_status: String,
}

impl FileStatus {
    /// `old -> new` for renames, otherwise just the path.
    #[must_use]
    pub fn display_path(&self) -> String {
        match &self.path_alt {
            Some(alt) => format!("{alt} -> {}", self.path),
            None => self.path.clone(),
        }
    }
}

/// Snapshot of `git status`.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingDirState {
    pub staged_files: Vec<FileStatus>,
    pub unstaged_files: Vec<FileStatus>,
    pub untracked_files: Vec<FileStatus>,
    pub merge_conflicts: Vec<FileStatus>,
}

impl WorkingDirState {
    /// True if nothing is staged, modified, untracked or conflicted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.staged_files.is_empty()
            && self.unstaged_files.is_empty()
            && self.untracked_files.is_empty()
            && self.merge_conflicts.is_empty()
    }
}

/// Where HEAD points and how it relates to its upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadState {
    /// Checked out branch, `None` when detached or on an unborn branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Abbreviated commit HEAD points at, `None` before the first commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub detached: bool,
    /// Upstream in `remote/branch` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    /// The upstream is configured but no longer exists.
    pub gone: bool,
}

/// Upstream tracking information of a local branch.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upstream {
    pub remote: String,
    pub branch: String,
    /// Human readable tracking status, e.g. `ahead 2, behind 1` or `gone`.
    #[serde(default)]
    pub status: String,
}

impl Upstream {
    /// `remote/branch`.
    #[must_use]
    pub fn canonical_name(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }
}

/// A local or remote-tracking branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Short name without the remote prefix.
    pub name: String,
    /// Remote name for remote-tracking branches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    pub commit_hash: String,
    pub commit_msg: String,
    /// Currently checked out.
    pub active: bool,
    pub committer_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<Upstream>,
}

impl Branch {
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// `remote/name` for remote-tracking branches, otherwise `name`.
    #[must_use]
    pub fn canonical_name(&self) -> String {
        match &self.remote {
            Some(remote) => format!("{remote}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A tag and the commit it points at.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub sha: String,
    pub tag: String,
}

/// Local tags, split into version-like tags and the rest.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagList {
    pub regular: Vec<Tag>,
    pub versions: Vec<Tag>,
}

impl TagList {
    /// Regular tags followed by version tags.
    pub fn all(&self) -> impl Iterator<Item = &Tag> {
        self.regular.iter().chain(self.versions.iter())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regular.is_empty() && self.versions.is_empty()
    }
}

/// An entry of `git stash list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stash {
    /// The `N` of `stash@{N}`.
    pub id: String,
    pub description: String,
}

impl Stash {
    /// `stash@{N}`, the form git expects on the command line.
    #[must_use]
    pub fn refname(&self) -> String {
        format!("stash@{{{}}}", self.id)
    }
}

/// A commit in the recent history list.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub message: String,
}
