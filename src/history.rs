//! Rolling history of the last used branch names.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of slots in [`BranchHistory`].
pub const BRANCH_HISTORY_LEN: usize = 2;

/// A fixed two-slot ring of branch names, oldest first.
///
/// The length never changes: pushing evicts the oldest entry, and an unused
/// slot is `None` ("no branch").
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BranchHistory {
    slots: [Option<String>; BRANCH_HISTORY_LEN],
}

impl BranchHistory {
    /// A history holding only "no branch" entries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` as the most recent branch, evicting the oldest.
    pub fn push(&mut self, name: impl Into<String>) {
        self.push_slot(Some(name.into()));
    }

    /// Record a raw slot value, `None` meaning "no branch".
    pub fn push_slot(&mut self, slot: Option<String>) {
        self.slots.rotate_left(1);
        self.slots[BRANCH_HISTORY_LEN - 1] = slot;
    }

    /// The most recently recorded branch.
    #[must_use]
    pub fn latest(&self) -> Option<&str> {
        self.slots[BRANCH_HISTORY_LEN - 1].as_deref()
    }

    /// The branch recorded before [`Self::latest`].
    #[must_use]
    pub fn previous(&self) -> Option<&str> {
        self.slots[BRANCH_HISTORY_LEN - 2].as_deref()
    }

    /// Slots oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.slots.iter().map(Option::as_deref)
    }

    #[must_use]
    pub const fn as_slice(&self) -> &[Option<String>] {
        &self.slots
    }

    /// Always [`BRANCH_HISTORY_LEN`].
    #[must_use]
    pub const fn len(&self) -> usize {
        BRANCH_HISTORY_LEN
    }

    /// Never true; present for API symmetry with `len`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl<S: Into<String>> FromIterator<S> for BranchHistory {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut history = Self::new();
        for name in iter {
            history.push(name);
        }
        history
    }
}

impl fmt::Debug for BranchHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.slots.iter()).finish()
    }
}

impl Serialize for BranchHistory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.slots.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BranchHistory {
    /// Accepts any list; only the newest two entries are kept and missing
    /// slots are filled with `None`.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<Option<String>>::deserialize(deserializer)?;
        let mut history = Self::new();
        for slot in entries {
            history.push_slot(slot);
        }
        Ok(history)
    }
}
