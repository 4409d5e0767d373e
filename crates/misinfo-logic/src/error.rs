//! Error types for the pure simulation logic.

use thiserror::Error;

use crate::reactions::Reaction;

/// A study definition that could not be turned into a playable [`Study`](crate::study::Study).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StudyError {
    #[error("study JSON could not be parsed: {0}")]
    Parse(String),

    #[error("invalid distribution for {context}: {reason}")]
    InvalidDistribution { context: String, reason: String },

    #[error("duplicate {kind} ID: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("study must contain at least one {0}")]
    Empty(&'static str),

    #[error("study length must be at least 1")]
    ZeroLength,

    #[error("source {id} has invalid maxPosts {max_posts} (expected -1 or a positive count)")]
    InvalidMaxPosts { id: String, max_posts: i32 },

    #[error("true post percentage {0} is outside 0..=100")]
    InvalidTruePostPercentage(f64),

    #[error("completion codes must have between 1 and 18 digits, got {0}")]
    InvalidCompletionCodeDigits(u32),

    #[error("post {post_id} is missing a {kind} change distribution for enabled reaction {reaction}")]
    MissingChangeDistribution {
        post_id: String,
        kind: &'static str,
        reaction: Reaction,
    },
}

/// A source or post instance rejected by its constructor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstanceError {
    #[error("credibility {0} is outside 0..=100")]
    Credibility(f64),

    #[error("followers {0} must be finite and non-negative")]
    Followers(f64),

    #[error("remaining uses {0} must be -1 or greater")]
    RemainingUses(i32),

    #[error("reaction count for {reaction} must be finite, got {value}")]
    ReactionCount { reaction: Reaction, value: f64 },

    #[error("post {post_id} has {expected} comments but {found} were supplied")]
    CommentCount {
        post_id: String,
        expected: usize,
        found: usize,
    },
}

/// The candidate pool ran dry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("all sources hit their maximum number of posts")]
    SourcesExhausted,

    #[error("used up all available posts")]
    PostsExhausted,
}

/// Failure to advance the game by one step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("already calculated all {length} states for the study")]
    AlreadyComplete { length: usize },

    #[error(transparent)]
    Exhausted(#[from] SelectionError),

    #[error("selection returned {kind} {id}, which is not in the current round")]
    UnknownSelection { kind: &'static str, id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteractionError {
    #[error("comment index {index} is out of range for a post with {count} comments")]
    CommentOutOfRange { index: usize, count: usize },
}

/// Participant data that breaks the ledger invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error(
        "history lengths ({credibility} credibility, {followers} followers) must equal interactions + 1 ({interactions} interactions)"
    )]
    HistoryLength {
        credibility: usize,
        followers: usize,
        interactions: usize,
    },

    #[error(transparent)]
    Value(#[from] InstanceError),
}
