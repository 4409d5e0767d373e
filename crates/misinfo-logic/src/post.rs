//! Sampled post and comment instances.

use rand::RngCore;
use std::sync::Arc;

use crate::error::InstanceError;
use crate::reactions::ReactionCounts;
use crate::study::{CommentTemplate, PostId, PostTemplate};

fn check_counts(counts: ReactionCounts) -> Result<ReactionCounts, InstanceError> {
    for (reaction, value) in &counts {
        if !value.is_finite() {
            return Err(InstanceError::ReactionCount {
                reaction: *reaction,
                value: *value,
            });
        }
    }
    Ok(counts)
}

/// Reaction counts shown next to one comment.
#[derive(Debug, Clone, PartialEq)]
pub struct GameComment {
    number_of_reactions: ReactionCounts,
}

impl GameComment {
    pub fn new(number_of_reactions: ReactionCounts) -> Result<Self, InstanceError> {
        Ok(Self {
            number_of_reactions: check_counts(number_of_reactions)?,
        })
    }

    pub fn sample_new(template: &CommentTemplate, rng: &mut dyn RngCore) -> Self {
        Self {
            number_of_reactions: template.number_of_reactions.sample_all(rng),
        }
    }

    pub fn number_of_reactions(&self) -> &ReactionCounts {
        &self.number_of_reactions
    }
}

/// A post as it exists in one session round.
#[derive(Debug, Clone)]
pub struct GamePost {
    template: Arc<PostTemplate>,
    number_of_reactions: ReactionCounts,
    comments: Vec<GameComment>,
    shown: bool,
}

impl GamePost {
    /// Builds a post instance; comments must line up one-to-one with the template's.
    pub fn new(
        template: Arc<PostTemplate>,
        number_of_reactions: ReactionCounts,
        comments: Vec<GameComment>,
        shown: bool,
    ) -> Result<Self, InstanceError> {
        if comments.len() != template.comments.len() {
            return Err(InstanceError::CommentCount {
                post_id: template.id.0.clone(),
                expected: template.comments.len(),
                found: comments.len(),
            });
        }
        Ok(Self {
            template,
            number_of_reactions: check_counts(number_of_reactions)?,
            comments,
            shown,
        })
    }

    /// Samples the post's reaction counts and each comment's independently.
    pub fn sample_new(template: Arc<PostTemplate>, rng: &mut dyn RngCore) -> Self {
        let number_of_reactions = template.number_of_reactions.sample_all(rng);
        let comments = template
            .comments
            .iter()
            .map(|comment| GameComment::sample_new(comment, rng))
            .collect();
        Self {
            template,
            number_of_reactions,
            comments,
            shown: false,
        }
    }

    pub fn template(&self) -> &Arc<PostTemplate> {
        &self.template
    }

    pub fn id(&self) -> &PostId {
        &self.template.id
    }

    pub fn is_true(&self) -> bool {
        self.template.is_true
    }

    pub fn number_of_reactions(&self) -> &ReactionCounts {
        &self.number_of_reactions
    }

    pub fn comments(&self) -> &[GameComment] {
        &self.comments
    }

    pub fn shown(&self) -> bool {
        self.shown
    }

    /// A copy of this post marked as shown.
    pub fn adjust_after_shown(&self) -> Self {
        Self {
            shown: true,
            ..self.clone()
        }
    }
}
