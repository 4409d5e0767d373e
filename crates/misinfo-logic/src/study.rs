//! The immutable study catalog: source and post templates plus settings.
//!
//! A [`Study`] is built once from configuration (see [`crate::config`]) and
//! shared read-only by every session that runs it. Sessions hold instances
//! that point back at these templates by ID.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::distribution::{DistributionRef, ReactionDistributions};
use crate::error::StudyError;
use crate::interaction::ReactionRequirements;
use crate::reactions::ReactionSet;
use crate::selection::SelectionStrategy;

/// Identifier of a source template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub String);

/// Identifier of a post template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub String);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for PostId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A source whose credibility and followers are sampled per session.
#[derive(Debug, Clone)]
pub struct SourceTemplate {
    pub id: SourceId,
    pub name: String,
    pub avatar: Option<String>,
    /// Maximum number of posts this source may make, or -1 for unlimited.
    pub max_posts: i32,
    pub credibility: DistributionRef,
    pub followers: DistributionRef,
}

impl SourceTemplate {
    /// Selection weight: unlimited sources sit in the zero-weight tier.
    pub fn selection_weight(&self) -> f64 {
        if self.max_posts == -1 {
            0.0
        } else {
            f64::from(self.max_posts)
        }
    }
}

/// What a post shows: either inline text or an image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostContent {
    Text(String),
    Image { image: String },
}

#[derive(Debug, Clone)]
pub struct CommentTemplate {
    pub source_name: String,
    pub message: String,
    pub number_of_reactions: ReactionDistributions,
}

#[derive(Debug, Clone)]
pub struct PostTemplate {
    pub id: PostId,
    pub headline: String,
    pub content: PostContent,
    pub is_true: bool,
    pub changes_to_credibility: ReactionDistributions,
    pub changes_to_followers: ReactionDistributions,
    pub number_of_reactions: ReactionDistributions,
    pub comments: Vec<CommentTemplate>,
}

/// Format of generated completion codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionCodeFormat {
    digits: u32,
}

impl CompletionCodeFormat {
    pub const DEFAULT_DIGITS: u32 = 6;

    pub fn new(digits: u32) -> Result<Self, StudyError> {
        if !(1..=18).contains(&digits) {
            return Err(StudyError::InvalidCompletionCodeDigits(digits));
        }
        Ok(Self { digits })
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// A random code with exactly `digits` digits and no leading zero.
    pub fn generate(&self, rng: &mut impl Rng) -> String {
        let low = 10u64.pow(self.digits - 1);
        let high = 10u64.pow(self.digits);
        let code = if self.digits == 1 {
            rng.gen_range(0..high)
        } else {
            rng.gen_range(low..high)
        };
        code.to_string()
    }
}

/// Per-study switches that shape a session.
#[derive(Debug, Clone)]
pub struct StudySettings {
    /// Number of posts each participant must react to.
    pub length: usize,
    pub require_identification: bool,
    pub reaction_requirements: ReactionRequirements,
    pub post_reactions: ReactionSet,
    pub comment_reactions: ReactionSet,
    /// `None` when the study does not hand out completion codes.
    pub completion_code: Option<CompletionCodeFormat>,
}

/// A validated, playable study.
pub struct Study {
    pub id: String,
    pub name: String,
    /// UNIX seconds of the last edit, used to detect stale sessions.
    pub last_modified_time: i64,
    pub settings: StudySettings,
    sources: Vec<Arc<SourceTemplate>>,
    posts: Vec<Arc<PostTemplate>>,
    source_index: HashMap<SourceId, usize>,
    post_index: HashMap<PostId, usize>,
    selection: Arc<dyn SelectionStrategy>,
}

impl fmt::Debug for Study {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Study")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("last_modified_time", &self.last_modified_time)
            .field("sources", &self.sources.len())
            .field("posts", &self.posts.len())
            .field("selection", &self.selection)
            .finish()
    }
}

impl Study {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        last_modified_time: i64,
        settings: StudySettings,
        sources: Vec<SourceTemplate>,
        posts: Vec<PostTemplate>,
        selection: Arc<dyn SelectionStrategy>,
    ) -> Result<Self, StudyError> {
        if settings.length == 0 {
            return Err(StudyError::ZeroLength);
        }
        if sources.is_empty() {
            return Err(StudyError::Empty("source"));
        }
        if posts.is_empty() {
            return Err(StudyError::Empty("post"));
        }

        let mut source_index = HashMap::with_capacity(sources.len());
        for (idx, source) in sources.iter().enumerate() {
            if source.max_posts == 0 || source.max_posts < -1 {
                return Err(StudyError::InvalidMaxPosts {
                    id: source.id.0.clone(),
                    max_posts: source.max_posts,
                });
            }
            if source_index.insert(source.id.clone(), idx).is_some() {
                return Err(StudyError::DuplicateId {
                    kind: "source",
                    id: source.id.0.clone(),
                });
            }
        }

        let mut post_index = HashMap::with_capacity(posts.len());
        for (idx, post) in posts.iter().enumerate() {
            if post_index.insert(post.id.clone(), idx).is_some() {
                return Err(StudyError::DuplicateId {
                    kind: "post",
                    id: post.id.0.clone(),
                });
            }
        }

        Ok(Self {
            id: id.into(),
            name: name.into(),
            last_modified_time,
            settings,
            sources: sources.into_iter().map(Arc::new).collect(),
            posts: posts.into_iter().map(Arc::new).collect(),
            source_index,
            post_index,
            selection,
        })
    }

    pub fn sources(&self) -> &[Arc<SourceTemplate>] {
        &self.sources
    }

    pub fn posts(&self) -> &[Arc<PostTemplate>] {
        &self.posts
    }

    pub fn get_source(&self, id: &SourceId) -> Option<&Arc<SourceTemplate>> {
        self.source_index.get(id).map(|&idx| &self.sources[idx])
    }

    pub fn get_post(&self, id: &PostId) -> Option<&Arc<PostTemplate>> {
        self.post_index.get(id).map(|&idx| &self.posts[idx])
    }

    pub fn selection(&self) -> &dyn SelectionStrategy {
        self.selection.as_ref()
    }

    pub fn length(&self) -> usize {
        self.settings.length
    }

    /// Generates a completion code if the study hands them out.
    pub fn generate_completion_code(&self, rng: &mut impl Rng) -> Option<String> {
        self.settings
            .completion_code
            .map(|format| format.generate(rng))
    }
}

/// A study definition that failed validation, kept so that starting a
/// session can report why.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokenStudy {
    pub id: String,
    pub error: StudyError,
}

/// A catalog entry: either playable or broken.
#[derive(Debug, Clone)]
pub enum StudyEntry {
    Ready(Arc<Study>),
    Broken(BrokenStudy),
}

impl StudyEntry {
    pub fn id(&self) -> &str {
        match self {
            StudyEntry::Ready(study) => &study.id,
            StudyEntry::Broken(broken) => &broken.id,
        }
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, StudyEntry::Broken(_))
    }
}

impl From<Study> for StudyEntry {
    fn from(study: Study) -> Self {
        StudyEntry::Ready(Arc::new(study))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_completion_code_has_requested_digits() {
        let mut rng = StdRng::seed_from_u64(9);
        let format = CompletionCodeFormat::new(6).unwrap();
        for _ in 0..100 {
            let code = format.generate(&mut rng);
            assert_eq!(code.len(), 6);
            assert!(!code.starts_with('0'));
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_completion_code_digit_bounds() {
        assert!(CompletionCodeFormat::new(0).is_err());
        assert!(CompletionCodeFormat::new(19).is_err());
        let mut rng = StdRng::seed_from_u64(10);
        let code = CompletionCodeFormat::new(18).unwrap().generate(&mut rng);
        assert_eq!(code.len(), 18);
    }

    #[test]
    fn test_post_content_json_forms() {
        let text: PostContent = serde_json::from_str("\"Breaking news\"").unwrap();
        assert_eq!(text, PostContent::Text("Breaking news".into()));
        let image: PostContent = serde_json::from_str(r#"{"image":"img/a.png"}"#).unwrap();
        assert_eq!(
            image,
            PostContent::Image {
                image: "img/a.png".into()
            }
        );
    }
}
