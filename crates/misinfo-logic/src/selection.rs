//! Choosing which source and post to show next.
//!
//! Sources are drawn with probability proportional to their `maxPosts`
//! (unlimited sources form a zero-weight tier that is only drawn from,
//! uniformly, when no limited source is left). Posts are drawn uniformly from
//! the unshown ones, preferring the truthfulness bucket picked by a Bernoulli
//! draw but falling back to any unshown post when that bucket is empty.

use rand::distributions::{Distribution as _, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{SelectionError, StudyError};
use crate::post::GamePost;
use crate::source::GameSource;
use crate::study::{PostId, SourceId};

/// Source instances of the current round, keyed by template ID.
pub type SourcePool = BTreeMap<SourceId, GameSource>;

/// Post instances of the current round, keyed by template ID.
pub type PostPool = BTreeMap<PostId, GamePost>;

/// Picks the (source, post) pair for the step at `step_index`.
pub trait SelectionStrategy: fmt::Debug + Send + Sync {
    fn select_next(
        &self,
        step_index: usize,
        sources: &SourcePool,
        posts: &PostPool,
        rng: &mut dyn RngCore,
    ) -> Result<(SourceId, PostId), SelectionError>;
}

/// Shows true posts with a fixed probability across the whole session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverallRatioSelection {
    true_post_percentage: f64,
}

impl OverallRatioSelection {
    pub fn new(true_post_percentage: f64) -> Result<Self, StudyError> {
        if !true_post_percentage.is_finite() || !(0.0..=100.0).contains(&true_post_percentage) {
            return Err(StudyError::InvalidTruePostPercentage(true_post_percentage));
        }
        Ok(Self {
            true_post_percentage,
        })
    }

    pub fn true_post_percentage(&self) -> f64 {
        self.true_post_percentage
    }
}

impl SelectionStrategy for OverallRatioSelection {
    fn select_next(
        &self,
        _step_index: usize,
        sources: &SourcePool,
        posts: &PostPool,
        rng: &mut dyn RngCore,
    ) -> Result<(SourceId, PostId), SelectionError> {
        let source = select_random_source(sources, rng)?;
        let post = select_random_post(posts, self.true_post_percentage, rng)?;
        Ok((source.id().clone(), post.id().clone()))
    }
}

/// Picks an available source, weighted by its template's `maxPosts`.
pub fn select_random_source<'a>(
    sources: &'a SourcePool,
    rng: &mut dyn RngCore,
) -> Result<&'a GameSource, SelectionError> {
    let available: Vec<&GameSource> = sources.values().filter(|s| s.is_available()).collect();
    if available.is_empty() {
        return Err(SelectionError::SourcesExhausted);
    }
    select_weighted(&available, |s| s.template().selection_weight(), rng)
        .ok_or(SelectionError::SourcesExhausted)
}

/// Picks an unshown post, preferring true posts with probability
/// `true_post_percentage / 100`.
pub fn select_random_post<'a>(
    posts: &'a PostPool,
    true_post_percentage: f64,
    rng: &mut dyn RngCore,
) -> Result<&'a GamePost, SelectionError> {
    let select_true_posts = rng.gen_bool((true_post_percentage / 100.0).clamp(0.0, 1.0));
    let available: Vec<&GamePost> = posts.values().filter(|p| !p.shown()).collect();
    if available.is_empty() {
        return Err(SelectionError::PostsExhausted);
    }
    select_preferring(&available, |p| p.is_true() == select_true_posts, rng)
        .ok_or(SelectionError::PostsExhausted)
}

/// Uniform pick among the items matching `prefer`, or among all items if none match.
fn select_preferring<'a, T>(
    items: &[&'a T],
    prefer: impl Fn(&T) -> bool,
    rng: &mut dyn RngCore,
) -> Option<&'a T> {
    let preferred: Vec<&'a T> = items.iter().copied().filter(|item| prefer(item)).collect();
    let pool = if preferred.is_empty() {
        items
    } else {
        preferred.as_slice()
    };
    pool.choose(rng).copied()
}

/// Weighted pick; falls back to a uniform pick when every weight is zero.
fn select_weighted<'a, T>(
    items: &[&'a T],
    weight: impl Fn(&T) -> f64,
    rng: &mut dyn RngCore,
) -> Option<&'a T> {
    let weights: Vec<f64> = items.iter().map(|item| weight(item).max(0.0)).collect();
    match WeightedIndex::new(&weights) {
        Ok(index) => items.get(index.sample(rng)).copied(),
        Err(_) => items.choose(rng).copied(),
    }
}
