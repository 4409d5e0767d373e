//! Reactions a participant can make to posts and comments.
//!
//! Posts can be liked, disliked, shared, flagged, or skipped. Comments only
//! support like/dislike. Which of these are offered is decided per study via
//! [`ReactionSet`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A single reaction to a post or comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
    Share,
    Flag,
    /// Explicit "no reaction". Counts towards completion but never changes scores.
    Skip,
}

impl Reaction {
    /// All reaction variants for iteration.
    pub const ALL: [Reaction; 5] = [
        Reaction::Like,
        Reaction::Dislike,
        Reaction::Share,
        Reaction::Flag,
        Reaction::Skip,
    ];

    /// Reactions that may be enabled on posts (skip is always available).
    pub const POST: [Reaction; 4] = [
        Reaction::Like,
        Reaction::Dislike,
        Reaction::Share,
        Reaction::Flag,
    ];

    /// Reactions that may be enabled on comments.
    pub const COMMENT: [Reaction; 2] = [Reaction::Like, Reaction::Dislike];

    pub fn as_str(self) -> &'static str {
        match self {
            Reaction::Like => "like",
            Reaction::Dislike => "dislike",
            Reaction::Share => "share",
            Reaction::Flag => "flag",
            Reaction::Skip => "skip",
        }
    }

    /// Whether this reaction affects the participant's scores.
    pub fn is_scored(self) -> bool {
        self != Reaction::Skip
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reaction {
    type Err = UnknownReaction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reaction::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownReaction(s.to_string()))
    }
}

/// Returned when parsing a reaction name that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown reaction: {0}")]
pub struct UnknownReaction(pub String);

/// Sampled number of reactions shown next to a post or comment.
pub type ReactionCounts = BTreeMap<Reaction, f64>;

/// The set of reactions a study enables for posts or for comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionSet(BTreeSet<Reaction>);

impl ReactionSet {
    pub fn new(reactions: impl IntoIterator<Item = Reaction>) -> Self {
        Self(reactions.into_iter().collect())
    }

    /// Builds a set from a `{reaction: enabled}` flag map.
    pub fn from_flags(flags: &BTreeMap<Reaction, bool>) -> Self {
        Self(
            flags
                .iter()
                .filter(|(_, enabled)| **enabled)
                .map(|(reaction, _)| *reaction)
                .collect(),
        )
    }

    pub fn contains(&self, reaction: Reaction) -> bool {
        self.0.contains(&reaction)
    }

    pub fn iter(&self) -> impl Iterator<Item = Reaction> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
