//! The field vocabulary of a repository aggregate.
//!
//! `StateKey` is the only schema contract shared with producers and
//! subscribers. `KeySet` is a small bitset over it, used both for the keys a
//! patch touched and for the keys a subscriber is interested in.

use std::fmt;
use std::str::FromStr;

use serde::de::{Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// A named field of [`crate::RepoStore`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKey {
    Status,
    Head,
    LongStatus,
    ShortStatus,
    Branches,
    Remotes,
    LocalTags,
    LastBranches,
    LastLocalBranchForRebase,
    LastRemoteUsed,
    LastRemoteUsedForPush,
    LastRemoteUsedWithOptionAll,
    LastResetModeUsed,
    ShortHashLength,
    Stashes,
    RecentCommits,
    Descriptions,
}

impl StateKey {
    /// Every key, in declaration order.
    pub const ALL: [StateKey; 17] = [
        StateKey::Status,
        StateKey::Head,
        StateKey::LongStatus,
        StateKey::ShortStatus,
        StateKey::Branches,
        StateKey::Remotes,
        StateKey::LocalTags,
        StateKey::LastBranches,
        StateKey::LastLocalBranchForRebase,
        StateKey::LastRemoteUsed,
        StateKey::LastRemoteUsedForPush,
        StateKey::LastRemoteUsedWithOptionAll,
        StateKey::LastResetModeUsed,
        StateKey::ShortHashLength,
        StateKey::Stashes,
        StateKey::RecentCommits,
        StateKey::Descriptions,
    ];

    /// The wire name of this key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Head => "head",
            Self::LongStatus => "long_status",
            Self::ShortStatus => "short_status",
            Self::Branches => "branches",
            Self::Remotes => "remotes",
            Self::LocalTags => "local_tags",
            Self::LastBranches => "last_branches",
            Self::LastLocalBranchForRebase => "last_local_branch_for_rebase",
            Self::LastRemoteUsed => "last_remote_used",
            Self::LastRemoteUsedForPush => "last_remote_used_for_push",
            Self::LastRemoteUsedWithOptionAll => "last_remote_used_with_option_all",
            Self::LastResetModeUsed => "last_reset_mode_used",
            Self::ShortHashLength => "short_hash_length",
            Self::Stashes => "stashes",
            Self::RecentCommits => "recent_commits",
            Self::Descriptions => "descriptions",
        }
    }

    const fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateKey {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| StateError::UnknownKey { key: s.to_string() })
    }
}

/// A set of [`StateKey`]s.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeySet(u32);

impl KeySet {
    /// The empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// The set of every key.
    #[must_use]
    pub const fn all() -> Self {
        Self((1u32 << (StateKey::ALL.len() as u32)) - 1)
    }

    /// A set holding just `key`.
    #[must_use]
    pub const fn single(key: StateKey) -> Self {
        Self(key.bit())
    }

    /// Parse key names, failing on the first name outside the vocabulary.
    pub fn parse<'a, I>(names: I) -> Result<Self, StateError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().map(str::parse::<StateKey>).collect()
    }

    pub fn insert(&mut self, key: StateKey) {
        self.0 |= key.bit();
    }

    #[must_use]
    pub const fn contains(&self, key: StateKey) -> bool {
        self.0 & key.bit() != 0
    }

    /// True if the two sets share at least one key.
    #[must_use]
    pub const fn intersects(&self, other: &KeySet) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn union(&self, other: &KeySet) -> KeySet {
        KeySet(self.0 | other.0)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Keys in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = StateKey> + '_ {
        StateKey::ALL.iter().copied().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<StateKey> for KeySet {
    fn from_iter<I: IntoIterator<Item = StateKey>>(iter: I) -> Self {
        let mut set = KeySet::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

impl From<StateKey> for KeySet {
    fn from(key: StateKey) -> Self {
        Self::single(key)
    }
}

impl<const N: usize> From<[StateKey; N]> for KeySet {
    fn from(keys: [StateKey; N]) -> Self {
        keys.into_iter().collect()
    }
}

impl fmt::Display for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&'static str> = self.iter().map(StateKey::as_str).collect();
        names.sort_unstable();
        f.write_str(&names.join(","))
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for KeySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for key in self.iter() {
            seq.serialize_element(&key)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for KeySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeySetVisitor;

        impl<'de> Visitor<'de> for KeySetVisitor {
            type Value = KeySet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of state key names")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<KeySet, A::Error> {
                let mut set = KeySet::new();
                while let Some(key) = seq.next_element::<StateKey>()? {
                    set.insert(key);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_seq(KeySetVisitor)
    }
}
