//! Advancing the game one step at a time.
//!
//! A round pool holds one sampled instance per template. Each step asks the
//! study's selection strategy for a (source, post) pair, records what was
//! presented as a [`GameState`], and hands back a pool in which only the
//! chosen source (after its share adjustment) and the chosen post (now
//! shown) were replaced. The pool is owned by the caller and threaded
//! through successive calls.

use rand::RngCore;
use std::sync::Arc;

use crate::error::StepError;
use crate::post::GamePost;
use crate::reactions::Reaction;
use crate::selection::{PostPool, SourcePool};
use crate::source::GameSource;
use crate::study::Study;

/// One full pool of source and post instances sampled together.
#[derive(Debug, Clone)]
pub struct RoundPool {
    sources: SourcePool,
    posts: PostPool,
}

impl RoundPool {
    pub fn new(sources: SourcePool, posts: PostPool) -> Self {
        Self { sources, posts }
    }

    /// Samples one instance of every template in the study.
    pub fn sample(study: &Study, rng: &mut dyn RngCore) -> Self {
        let sources = study
            .sources()
            .iter()
            .map(|template| {
                let source = GameSource::sample_new(Arc::clone(template), rng);
                (source.id().clone(), source)
            })
            .collect();
        let posts = study
            .posts()
            .iter()
            .map(|template| {
                let post = GamePost::sample_new(Arc::clone(template), rng);
                (post.id().clone(), post)
            })
            .collect();
        Self { sources, posts }
    }

    pub fn sources(&self) -> &SourcePool {
        &self.sources
    }

    pub fn posts(&self) -> &PostPool {
        &self.posts
    }

    fn replace_source(&mut self, source: GameSource) {
        self.sources.insert(source.id().clone(), source);
    }

    fn replace_post(&mut self, post: GamePost) {
        self.posts.insert(post.id().clone(), post);
    }
}

/// What was presented to the participant at one step.
#[derive(Debug, Clone)]
pub struct GameState {
    index: usize,
    source: GameSource,
    post: GamePost,
}

impl GameState {
    pub fn new(index: usize, source: GameSource, post: GamePost) -> Self {
        Self {
            index,
            source,
            post,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn source(&self) -> &GameSource {
        &self.source
    }

    pub fn post(&self) -> &GamePost {
        &self.post
    }
}

/// Result of a single step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub state: GameState,
    /// The pool to pass into the next step.
    pub round: RoundPool,
}

/// Computes the state at index `step_count`.
///
/// `prior` is the pool returned by the previous step, or `None` to sample a
/// fresh round. The returned state records the source and post exactly as
/// they were selected, before the source's share adjustment is applied.
pub fn advance_one_step(
    study: &Study,
    prior: Option<RoundPool>,
    step_count: usize,
    rng: &mut dyn RngCore,
) -> Result<StepOutcome, StepError> {
    if step_count >= study.length() {
        return Err(StepError::AlreadyComplete {
            length: study.length(),
        });
    }

    let mut round = match prior {
        Some(round) => round,
        None => RoundPool::sample(study, rng),
    };

    let (source_id, post_id) =
        study
            .selection()
            .select_next(step_count, round.sources(), round.posts(), rng)?;

    let selected_source = round
        .sources
        .get(&source_id)
        .cloned()
        .ok_or_else(|| StepError::UnknownSelection {
            kind: "source",
            id: source_id.0.clone(),
        })?;
    let selected_post = round
        .posts
        .get(&post_id)
        .cloned()
        .ok_or_else(|| StepError::UnknownSelection {
            kind: "post",
            id: post_id.0.clone(),
        })?;

    // Share distributions are absent when sharing is disabled.
    let post_template = selected_post.template();
    let credibility_change = post_template
        .changes_to_credibility
        .sample(Reaction::Share, rng)
        .unwrap_or(0.0);
    let followers_change = post_template
        .changes_to_followers
        .sample(Reaction::Share, rng)
        .unwrap_or(0.0);

    round.replace_source(selected_source.adjust_after_post(credibility_change, followers_change));
    round.replace_post(selected_post.adjust_after_shown());

    Ok(StepOutcome {
        state: GameState::new(step_count, selected_source, selected_post),
        round,
    })
}
