//! The participant's running scores and full history.
//!
//! Both history sequences start with the seed value and gain exactly one
//! entry per submitted interaction, so they are always one longer than the
//! interaction log. Nothing is ever removed.

use crate::error::LedgerError;
use crate::interaction::PostInteraction;
use crate::source::{adjust_credibility, adjust_followers, check_credibility, check_followers};

/// Credibility a new participant starts with.
pub const INITIAL_CREDIBILITY: f64 = 50.0;

/// Followers a new participant starts with.
pub const INITIAL_FOLLOWERS: f64 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GameParticipant {
    participant_id: Option<String>,
    credibility: f64,
    followers: f64,
    interactions: Vec<PostInteraction>,
    credibility_history: Vec<f64>,
    follower_history: Vec<f64>,
}

impl Default for GameParticipant {
    fn default() -> Self {
        Self::new(INITIAL_CREDIBILITY, INITIAL_FOLLOWERS)
    }
}

impl GameParticipant {
    /// A participant with no submissions, histories seeded with the initial values.
    pub fn new(credibility: f64, followers: f64) -> Self {
        let credibility = adjust_credibility(credibility, 0.0);
        let followers = adjust_followers(followers, 0.0);
        Self {
            participant_id: None,
            credibility,
            followers,
            interactions: Vec::new(),
            credibility_history: vec![credibility],
            follower_history: vec![followers],
        }
    }

    /// Reassembles a participant from stored parts, checking every invariant.
    pub fn from_parts(
        participant_id: Option<String>,
        credibility: f64,
        followers: f64,
        interactions: Vec<PostInteraction>,
        credibility_history: Vec<f64>,
        follower_history: Vec<f64>,
    ) -> Result<Self, LedgerError> {
        let expected = interactions.len() + 1;
        if credibility_history.len() != expected || follower_history.len() != expected {
            return Err(LedgerError::HistoryLength {
                credibility: credibility_history.len(),
                followers: follower_history.len(),
                interactions: interactions.len(),
            });
        }
        for value in &credibility_history {
            check_credibility(*value)?;
        }
        for value in &follower_history {
            check_followers(*value)?;
        }
        Ok(Self {
            participant_id,
            credibility: check_credibility(credibility)?,
            followers: check_followers(followers)?,
            interactions,
            credibility_history,
            follower_history,
        })
    }

    pub fn participant_id(&self) -> Option<&str> {
        self.participant_id.as_deref()
    }

    pub fn set_participant_id(&mut self, id: impl Into<String>) {
        self.participant_id = Some(id.into());
    }

    pub fn credibility(&self) -> f64 {
        self.credibility
    }

    pub fn followers(&self) -> f64 {
        self.followers
    }

    pub fn interactions(&self) -> &[PostInteraction] {
        &self.interactions
    }

    pub fn submitted_count(&self) -> usize {
        self.interactions.len()
    }

    pub fn credibility_history(&self) -> &[f64] {
        &self.credibility_history
    }

    pub fn follower_history(&self) -> &[f64] {
        &self.follower_history
    }

    /// Records a submission and applies its score changes.
    pub fn add_submission(
        &mut self,
        interaction: PostInteraction,
        credibility_change: f64,
        followers_change: f64,
    ) {
        self.interactions.push(interaction);
        self.credibility = adjust_credibility(self.credibility, credibility_change);
        self.followers = adjust_followers(self.followers, followers_change);
        self.credibility_history.push(self.credibility);
        self.follower_history.push(self.followers);
    }
}
