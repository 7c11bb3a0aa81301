//! # repo-state
//!
//! A process-scoped, concurrency-safe publish-subscribe store for facts about
//! version-control repositories: status, HEAD, branches, remotes, tags,
//! stashes, recent commits and the "last used" bookkeeping of interactive
//! commands.
//!
//! ## Core Concepts
//!
//! - **RepoPath**: opaque key of one repository's state bucket
//! - **RepoStore**: the partial aggregate of known facts for one repository
//! - **RepoStorePatch**: a partial update; only supplied fields are overwritten
//! - **Subscription**: a repo filter (one path or `*`), a set of interest keys
//!   and a callback, removed again when its handle is dropped
//!
//! Producers call [`StateHub::update`]; the patch is merged atomically, then
//! every subscriber whose filter matches and whose interest keys intersect the
//! patch's keys is called with the live aggregate. A failing subscriber is
//! logged and skipped; it never affects other subscribers or the producer.
//!
//! ## Usage
//!
//! ```rust
//! use repo_state::{RepoStorePatch, StateHub, StateHubConfig, StateKey};
//!
//! let hub = StateHub::new(StateHubConfig::default());
//!
//! let _subscription = hub.subscribe("/work/repo", StateKey::Branches, |repo, state| {
//!     let branches = state.read().branches.as_ref().map_or(0, Vec::len);
//!     println!("{repo}: {branches} branches");
//!     Ok(())
//! });
//!
//! hub.update("/work/repo", RepoStorePatch::new().with_short_status("clean"));
//! assert_eq!(hub.get("/work/repo").read().short_status.as_deref(), Some("clean"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod history;
pub mod hub;
pub mod key;
pub mod model;
pub mod monitor;
pub mod repo_store;
pub mod stash;
pub mod storage;

pub use error::{
    CallbackError, CallbackResult, FailureCause, StateError, StateResult, SubscriberFailure,
};
pub use history::{BranchHistory, BRANCH_HISTORY_LEN};
pub use hub::{HubStats, StateHub, StateHubConfig};
pub use key::{KeySet, StateKey};
pub use model::{
    Branch, Commit, FileStatus, HeadState, Stash, Tag, TagList, Upstream, WorkingDirState,
};
pub use monitor::{
    subscriber_fn, DispatchReport, RepoFilter, StateChange, StateWatch, Subscriber, Subscription,
    SubscriptionId, WatchError, WILDCARD,
};
pub use repo_store::{RepoPath, RepoStore, RepoStorePatch};
pub use stash::parse_stash_list;
pub use storage::{InMemoryStateStore, RepoState, StateStore};
