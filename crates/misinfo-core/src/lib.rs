//! Game controller and persistence for the misinformation game.
//!
//! Wraps the pure logic in `misinfo_logic` with everything that touches the
//! outside world: the session clock, local snapshots, results upload, and the
//! JSON wire format.
//!
//! # Example
//!
//! ```rust,no_run
//! use misinfo_core::prelude::*;
//! use misinfo_logic::config::load_study;
//! use misinfo_logic::interaction::PostInteraction;
//! use misinfo_logic::reactions::Reaction;
//! use std::sync::Arc;
//!
//! let entry = load_study(&std::fs::read_to_string("data/example_study.json").unwrap());
//! let services = GameServices::new(Some(Arc::new(MemoryStore::new())), Arc::new(MemorySink::new()));
//! let mut game = Game::create_new(&entry, services).unwrap();
//!
//! game.dismiss_prompt();
//! while !game.is_finished() {
//!     let comments = game.current_state().unwrap().post().comments().len();
//!     let like = PostInteraction::empty(comments).with_toggled_post_reaction(Reaction::Like);
//!     game.submit_interaction(like).unwrap();
//! }
//! futures::executor::block_on(game.save_to_database()).unwrap();
//! ```

pub mod compress;
pub mod diff;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod session;
pub mod sink;
pub mod storage;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::engine::{Game, GameServices, Stage, SubmissionOutcome};
    pub use crate::error::{GameError, PersistError, UploadError};
    pub use crate::sink::{MemorySink, ResultsSink, UploadStatus};
    pub use crate::storage::{FileStore, LocalStore, MemoryStore};
}
