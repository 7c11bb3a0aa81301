//! Storage for repository aggregates.
//!
//! [`StateStore`] is the contract; [`InMemoryStateStore`] is the process-local
//! implementation. Aggregates are handed out as [`RepoState`] handles that
//! always read the latest merged values.

mod memory;
mod traits;

pub use memory::{InMemoryStateStore, RepoState};
pub use traits::StateStore;
