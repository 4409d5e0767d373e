//! Pure simulation logic for the misinformation game.
//!
//! A participant is shown a scripted sequence of posts from sources with
//! randomized credibility and follower counts, reacts to each one, and sees
//! their own credibility and followers move according to the study's
//! configured distributions. This crate holds all of that logic with no I/O,
//! no clock, and no async: every function takes plain data plus an injected
//! random source and returns results.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Study JSON schema and validation into a [`study::Study`] |
//! | [`distribution`] | Opaque random-variate generators and their JSON specs |
//! | [`error`] | Error types for every layer of the logic |
//! | [`interaction`] | Toggle-based reaction accumulator and completion policy |
//! | [`participant`] | Participant credibility/follower ledger with history |
//! | [`post`] | Sampled post and comment instances |
//! | [`reactions`] | Reaction kinds and per-study enablement |
//! | [`selection`] | Source/post selection strategy |
//! | [`source`] | Sampled source instances and score clamping rules |
//! | [`stepper`] | Round pools and the one-step state advance |
//! | [`study`] | Immutable study catalog and templates |

pub mod config;
pub mod distribution;
pub mod error;
pub mod interaction;
pub mod participant;
pub mod post;
pub mod reactions;
pub mod selection;
pub mod source;
pub mod stepper;
pub mod study;
