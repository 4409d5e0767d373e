//! Errors raised by the game controller and its persistence layer.

use thiserror::Error;

use misinfo_logic::error::{InstanceError, LedgerError, StepError, StudyError};
use misinfo_logic::reactions::Reaction;

/// Errors from the local snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A results upload that did not go through. The message is shown to the
/// participant as-is, so it is kept as plain text and can be cloned into
/// every holder of the shared upload handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UploadError {
    pub message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure to convert a session to or from its persisted form.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("persisted game is missing {0}")]
    MissingField(&'static str),

    #[error("could not find source with ID {0}")]
    UnknownSource(String),

    #[error("could not find post with ID {0}")]
    UnknownPost(String),

    #[error("invalid persisted {context}: {source}")]
    Instance {
        context: String,
        #[source]
        source: InstanceError,
    },

    #[error("invalid persisted participant: {0}")]
    Ledger(#[from] LedgerError),

    #[error("persisted game has {found} states but the study requires {expected}")]
    StateCount { expected: usize, found: usize },

    #[error(
        "saved game is for study {found_id} (version {found_version}), expected study {expected_id} (version {expected_version})"
    )]
    StudyMismatch {
        expected_id: String,
        expected_version: i64,
        found_id: String,
        found_version: i64,
    },

    #[error("local store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by [`Game`](crate::engine::Game) operations.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("the study is broken: {0}")]
    BrokenStudy(StudyError),

    #[error("the interaction with the current post must be completed")]
    IncompleteInteraction,

    #[error("reaction {reaction} is not enabled for {target}")]
    ReactionNotEnabled {
        reaction: Reaction,
        target: &'static str,
    },

    #[error("interaction covers {found} comments but the post has {expected}")]
    CommentMismatch { expected: usize, found: usize },

    #[error("the game has been finished")]
    Finished,

    #[error("no interactions were submitted")]
    NoInteractions,

    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}
