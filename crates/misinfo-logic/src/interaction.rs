//! The participant's in-progress reactions to the post on screen.
//!
//! [`PostInteraction`] is a value type: every toggle returns a new value and
//! leaves the old one untouched. The renderer keeps the latest value, hands it
//! to the controller on submission, and starts over from
//! [`PostInteraction::empty`].
//!
//! ```
//! use misinfo_logic::interaction::{PostInteraction, ReactionRequirements};
//! use misinfo_logic::reactions::Reaction;
//!
//! let interaction = PostInteraction::empty(0).with_toggled_post_reaction(Reaction::Like);
//! assert!(interaction.is_completed(&ReactionRequirements::default()));
//!
//! let cleared = interaction.with_toggled_post_reaction(Reaction::Like);
//! assert_eq!(cleared.post_reaction(), None);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::InteractionError;
use crate::reactions::Reaction;

/// Decides when an interaction may be submitted.
pub trait CompletionPolicy {
    fn is_completed(&self, interaction: &PostInteraction) -> bool;
}

/// The stock completion policy driven by study settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionRequirements {
    /// The post itself needs a reaction (skip counts).
    pub post: bool,
    /// Every comment needs a reaction too.
    pub comments: bool,
}

impl Default for ReactionRequirements {
    fn default() -> Self {
        Self {
            post: true,
            comments: false,
        }
    }
}

impl CompletionPolicy for ReactionRequirements {
    fn is_completed(&self, interaction: &PostInteraction) -> bool {
        let post_done = !self.post || interaction.post_reaction.is_some();
        let comments_done =
            !self.comments || interaction.comment_reactions.iter().all(Option::is_some);
        post_done && comments_done
    }
}

/// Reactions to one post and its comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInteraction {
    post_reaction: Option<Reaction>,
    /// Indexed by comment position on the post.
    comment_reactions: Vec<Option<Reaction>>,
}

impl PostInteraction {
    /// No reactions yet, for a post with `comment_count` comments.
    pub fn empty(comment_count: usize) -> Self {
        Self {
            post_reaction: None,
            comment_reactions: vec![None; comment_count],
        }
    }

    pub fn new(post_reaction: Option<Reaction>, comment_reactions: Vec<Option<Reaction>>) -> Self {
        Self {
            post_reaction,
            comment_reactions,
        }
    }

    pub fn post_reaction(&self) -> Option<Reaction> {
        self.post_reaction
    }

    pub fn comment_reaction(&self, index: usize) -> Option<Reaction> {
        self.comment_reactions.get(index).copied().flatten()
    }

    pub fn comment_reactions(&self) -> &[Option<Reaction>] {
        &self.comment_reactions
    }

    pub fn comment_count(&self) -> usize {
        self.comment_reactions.len()
    }

    /// Selects `reaction`, or clears it if it is already selected.
    pub fn with_toggled_post_reaction(&self, reaction: Reaction) -> Self {
        let post_reaction = toggle(self.post_reaction, reaction);
        Self {
            post_reaction,
            comment_reactions: self.comment_reactions.clone(),
        }
    }

    /// Same toggle semantics as the post, for the comment at `index`.
    pub fn with_toggled_comment_reaction(
        &self,
        index: usize,
        reaction: Reaction,
    ) -> Result<Self, InteractionError> {
        let count = self.comment_reactions.len();
        let current = *self
            .comment_reactions
            .get(index)
            .ok_or(InteractionError::CommentOutOfRange { index, count })?;

        let mut comment_reactions = self.comment_reactions.clone();
        comment_reactions[index] = toggle(current, reaction);
        Ok(Self {
            post_reaction: self.post_reaction,
            comment_reactions,
        })
    }

    pub fn is_completed(&self, policy: &dyn CompletionPolicy) -> bool {
        policy.is_completed(self)
    }

    /// Every selected reaction, post first, then comments in order.
    pub fn reactions(&self) -> impl Iterator<Item = Reaction> + '_ {
        self.post_reaction
            .into_iter()
            .chain(self.comment_reactions.iter().flatten().copied())
    }

    /// Selected reactions that change scores (everything except skip).
    pub fn scored_reactions(&self) -> impl Iterator<Item = Reaction> + '_ {
        self.reactions().filter(|r| r.is_scored())
    }
}

fn toggle(current: Option<Reaction>, reaction: Reaction) -> Option<Reaction> {
    if current == Some(reaction) {
        None
    } else {
        Some(reaction)
    }
}
