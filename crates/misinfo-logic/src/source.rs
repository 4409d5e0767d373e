//! Sampled source instances and the score adjustment rules.
//!
//! Credibility is always kept within `[0, 100]` and followers stay within
//! `[0, f64::MAX]`. The same two rules apply to sources after they post and to the
//! participant after each submission.

use rand::RngCore;
use std::sync::Arc;

use crate::error::InstanceError;
use crate::study::{SourceId, SourceTemplate};

pub const MIN_CREDIBILITY: f64 = 0.0;
pub const MAX_CREDIBILITY: f64 = 100.0;
pub const MAX_FOLLOWERS: f64 = f64::MAX;

/// Applies a credibility change, clamped to `[0, 100]`.
pub fn adjust_credibility(current: f64, change: f64) -> f64 {
    (current + change).clamp(MIN_CREDIBILITY, MAX_CREDIBILITY)
}

/// Applies a follower change, floored at zero and saturating at
/// [`MAX_FOLLOWERS`].
pub fn adjust_followers(current: f64, change: f64) -> f64 {
    (current + change).clamp(0.0, MAX_FOLLOWERS)
}

pub(crate) fn check_credibility(value: f64) -> Result<f64, InstanceError> {
    if value.is_finite() && (MIN_CREDIBILITY..=MAX_CREDIBILITY).contains(&value) {
        Ok(value)
    } else {
        Err(InstanceError::Credibility(value))
    }
}

pub(crate) fn check_followers(value: f64) -> Result<f64, InstanceError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(InstanceError::Followers(value))
    }
}

/// A source as it exists in one session round.
#[derive(Debug, Clone)]
pub struct GameSource {
    template: Arc<SourceTemplate>,
    credibility: f64,
    followers: f64,
    /// Posts this source may still make, or -1 for unlimited.
    remaining_uses: i32,
}

impl GameSource {
    pub fn new(
        template: Arc<SourceTemplate>,
        credibility: f64,
        followers: f64,
        remaining_uses: i32,
    ) -> Result<Self, InstanceError> {
        if remaining_uses < -1 {
            return Err(InstanceError::RemainingUses(remaining_uses));
        }
        Ok(Self {
            template,
            credibility: check_credibility(credibility)?,
            followers: check_followers(followers)?,
            remaining_uses,
        })
    }

    /// Samples credibility and followers independently from the template.
    pub fn sample_new(template: Arc<SourceTemplate>, rng: &mut dyn RngCore) -> Self {
        let credibility = adjust_credibility(template.credibility.sample(rng), 0.0);
        let followers = adjust_followers(template.followers.sample(rng), 0.0);
        let remaining_uses = template.max_posts;
        Self {
            template,
            credibility,
            followers,
            remaining_uses,
        }
    }

    pub fn template(&self) -> &Arc<SourceTemplate> {
        &self.template
    }

    pub fn id(&self) -> &SourceId {
        &self.template.id
    }

    pub fn credibility(&self) -> f64 {
        self.credibility
    }

    pub fn followers(&self) -> f64 {
        self.followers
    }

    pub fn remaining_uses(&self) -> i32 {
        self.remaining_uses
    }

    /// Whether this source may still be selected to post.
    pub fn is_available(&self) -> bool {
        self.remaining_uses == -1 || self.remaining_uses > 0
    }

    /// A copy of this source after it has posted once.
    pub fn adjust_after_post(&self, credibility_change: f64, followers_change: f64) -> Self {
        Self {
            template: Arc::clone(&self.template),
            credibility: adjust_credibility(self.credibility, credibility_change),
            followers: adjust_followers(self.followers, followers_change),
            remaining_uses: (self.remaining_uses - 1).max(-1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Constant;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn template(max_posts: i32, credibility: f64, followers: f64) -> Arc<SourceTemplate> {
        Arc::new(SourceTemplate {
            id: SourceId::from("s1"),
            name: "Daily Planet".into(),
            avatar: None,
            max_posts,
            credibility: Arc::new(Constant(credibility)),
            followers: Arc::new(Constant(followers)),
        })
    }

    #[test]
    fn test_adjust_credibility_clamps() {
        assert_eq!(adjust_credibility(95.0, 10.0), 100.0);
        assert_eq!(adjust_credibility(3.0, -10.0), 0.0);
        assert_eq!(adjust_credibility(50.0, 5.0), 55.0);
    }

    #[test]
    fn test_adjust_followers_floors_at_zero() {
        assert_eq!(adjust_followers(4.0, -10.0), 0.0);
        assert_eq!(adjust_followers(4.0, 10.0), 14.0);
    }

    #[test]
    fn test_adjust_followers_saturates() {
        let once = adjust_followers(0.0, 1e308);
        let twice = adjust_followers(once, 1e308);
        assert_eq!(twice, MAX_FOLLOWERS);
        assert!(twice.is_finite());
    }

    #[test]
    fn test_sample_new_keeps_followers_finite() {
        let mut rng = StdRng::seed_from_u64(0);
        let source = GameSource::sample_new(template(1, 50.0, f64::MAX), &mut rng);
        let after = source.adjust_after_post(0.0, 1e308);
        assert_eq!(after.followers(), MAX_FOLLOWERS);
    }

    #[test]
    fn test_sample_new_clamps_out_of_range_samples() {
        let mut rng = StdRng::seed_from_u64(0);
        let source = GameSource::sample_new(template(3, 140.0, -20.0), &mut rng);
        assert_eq!(source.credibility(), 100.0);
        assert_eq!(source.followers(), 0.0);
        assert_eq!(source.remaining_uses(), 3);
    }

    #[test]
    fn test_adjust_after_post_decrements_uses() {
        let mut rng = StdRng::seed_from_u64(0);
        let source = GameSource::sample_new(template(1, 50.0, 10.0), &mut rng);
        let after = source.adjust_after_post(-60.0, 5.0);
        assert_eq!(after.credibility(), 0.0);
        assert_eq!(after.followers(), 15.0);
        assert_eq!(after.remaining_uses(), 0);
        assert!(!after.is_available());
        // The original is untouched.
        assert_eq!(source.remaining_uses(), 1);
    }

    #[test]
    fn test_unlimited_source_stays_unlimited() {
        let mut rng = StdRng::seed_from_u64(0);
        let source = GameSource::sample_new(template(-1, 50.0, 10.0), &mut rng);
        let after = source.adjust_after_post(0.0, 0.0).adjust_after_post(0.0, 0.0);
        assert_eq!(after.remaining_uses(), -1);
        assert!(after.is_available());
    }

    #[test]
    fn test_constructor_rejects_bad_values() {
        let t = template(1, 50.0, 0.0);
        assert!(GameSource::new(Arc::clone(&t), 101.0, 0.0, 1).is_err());
        assert!(GameSource::new(Arc::clone(&t), 50.0, -1.0, 1).is_err());
        assert!(GameSource::new(Arc::clone(&t), 50.0, 0.0, -2).is_err());
        assert!(GameSource::new(t, f64::NAN, 0.0, 1).is_err());
    }
}
