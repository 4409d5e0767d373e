//! Study configuration: the JSON document researchers author.
//!
//! [`StudyConfig`] mirrors the JSON one-to-one. [`StudyConfig::into_study`]
//! validates it and produces the immutable [`Study`] the engine runs, with
//! every distribution turned into an opaque sampler. [`load_study`] never
//! fails: a document that does not validate becomes a
//! [`StudyEntry::Broken`] carrying the reason.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::distribution::{DistributionSpec, ReactionDistributions};
use crate::error::StudyError;
use crate::interaction::ReactionRequirements;
use crate::reactions::{Reaction, ReactionSet};
use crate::selection::OverallRatioSelection;
use crate::study::{
    BrokenStudy, CommentTemplate, CompletionCodeFormat, PostContent, PostId, PostTemplate,
    SourceId, SourceTemplate, Study, StudyEntry, StudySettings,
};

fn yes() -> bool {
    true
}

fn default_completion_code_digits() -> u32 {
    CompletionCodeFormat::DEFAULT_DIGITS
}

fn default_post_reactions() -> BTreeMap<Reaction, bool> {
    Reaction::POST.into_iter().map(|r| (r, true)).collect()
}

fn default_comment_reactions() -> BTreeMap<Reaction, bool> {
    Reaction::COMMENT.into_iter().map(|r| (r, true)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicSettings {
    pub length: usize,
    #[serde(default)]
    pub require_identification: bool,
    #[serde(default = "yes")]
    pub require_reactions: bool,
    #[serde(default)]
    pub require_comment_reactions: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSettings {
    #[serde(default)]
    pub gen_completion_code: bool,
    #[serde(default = "default_completion_code_digits")]
    pub completion_code_digits: u32,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            gen_completion_code: false,
            completion_code_digits: default_completion_code_digits(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SelectionMethodConfig {
    #[serde(rename_all = "camelCase")]
    Overall { true_post_percentage: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub max_posts: i32,
    pub credibility: DistributionSpec,
    pub followers: DistributionSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentConfig {
    pub source_name: String,
    pub message: String,
    #[serde(default)]
    pub number_of_reactions: BTreeMap<Reaction, DistributionSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostConfig {
    pub id: String,
    pub headline: String,
    pub content: PostContent,
    pub is_true: bool,
    #[serde(default)]
    pub changes_to_credibility: BTreeMap<Reaction, DistributionSpec>,
    #[serde(default)]
    pub changes_to_followers: BTreeMap<Reaction, DistributionSpec>,
    #[serde(default)]
    pub number_of_reactions: BTreeMap<Reaction, DistributionSpec>,
    #[serde(default)]
    pub comments: Vec<CommentConfig>,
}

/// A study definition exactly as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyConfig {
    pub id: String,
    pub name: String,
    pub last_modified_time: i64,
    pub basic_settings: BasicSettings,
    #[serde(default)]
    pub advanced_settings: AdvancedSettings,
    #[serde(default = "default_post_reactions")]
    pub post_enabled_reactions: BTreeMap<Reaction, bool>,
    #[serde(default = "default_comment_reactions")]
    pub comment_enabled_reactions: BTreeMap<Reaction, bool>,
    pub source_post_selection_method: SelectionMethodConfig,
    pub sources: Vec<SourceConfig>,
    pub posts: Vec<PostConfig>,
}

impl StudyConfig {
    pub fn from_json(json: &str) -> Result<Self, StudyError> {
        serde_json::from_str(json).map_err(|e| StudyError::Parse(e.to_string()))
    }

    /// Validates the definition and builds the playable study.
    pub fn into_study(self) -> Result<Study, StudyError> {
        let post_reactions = ReactionSet::from_flags(&self.post_enabled_reactions);
        let comment_reactions = ReactionSet::from_flags(&self.comment_enabled_reactions);

        let completion_code = if self.advanced_settings.gen_completion_code {
            Some(CompletionCodeFormat::new(
                self.advanced_settings.completion_code_digits,
            )?)
        } else {
            None
        };

        let settings = StudySettings {
            length: self.basic_settings.length,
            require_identification: self.basic_settings.require_identification,
            reaction_requirements: ReactionRequirements {
                post: self.basic_settings.require_reactions,
                comments: self.basic_settings.require_comment_reactions,
            },
            post_reactions,
            comment_reactions,
            completion_code,
        };

        let selection = match self.source_post_selection_method {
            SelectionMethodConfig::Overall {
                true_post_percentage,
            } => Arc::new(OverallRatioSelection::new(true_post_percentage)?),
        };

        let sources = self
            .sources
            .into_iter()
            .map(build_source)
            .collect::<Result<Vec<_>, _>>()?;
        let posts = self
            .posts
            .into_iter()
            .map(|post| build_post(post, &settings.post_reactions))
            .collect::<Result<Vec<_>, _>>()?;

        Study::new(
            self.id,
            self.name,
            self.last_modified_time,
            settings,
            sources,
            posts,
            selection,
        )
    }
}

fn build_source(config: SourceConfig) -> Result<SourceTemplate, StudyError> {
    let context = format!("source {}", config.id);
    Ok(SourceTemplate {
        credibility: config
            .credibility
            .build(&format!("{context}.credibility"))?,
        followers: config.followers.build(&format!("{context}.followers"))?,
        id: SourceId(config.id),
        name: config.name,
        avatar: config.avatar,
        max_posts: config.max_posts,
    })
}

fn build_post(config: PostConfig, enabled: &ReactionSet) -> Result<PostTemplate, StudyError> {
    for reaction in enabled.iter().filter(|r| r.is_scored()) {
        if !config.changes_to_credibility.contains_key(&reaction) {
            return Err(StudyError::MissingChangeDistribution {
                post_id: config.id.clone(),
                kind: "credibility",
                reaction,
            });
        }
        if !config.changes_to_followers.contains_key(&reaction) {
            return Err(StudyError::MissingChangeDistribution {
                post_id: config.id.clone(),
                kind: "followers",
                reaction,
            });
        }
    }

    let context = format!("post {}", config.id);
    let comments = config
        .comments
        .iter()
        .enumerate()
        .map(|(idx, comment)| -> Result<CommentTemplate, StudyError> {
            Ok(CommentTemplate {
                source_name: comment.source_name.clone(),
                message: comment.message.clone(),
                number_of_reactions: ReactionDistributions::from_specs(
                    &comment.number_of_reactions,
                    &format!("{context}.comments[{idx}].numberOfReactions"),
                )?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PostTemplate {
        changes_to_credibility: ReactionDistributions::from_specs(
            &config.changes_to_credibility,
            &format!("{context}.changesToCredibility"),
        )?,
        changes_to_followers: ReactionDistributions::from_specs(
            &config.changes_to_followers,
            &format!("{context}.changesToFollowers"),
        )?,
        number_of_reactions: ReactionDistributions::from_specs(
            &config.number_of_reactions,
            &format!("{context}.numberOfReactions"),
        )?,
        id: PostId(config.id),
        headline: config.headline,
        content: config.content,
        is_true: config.is_true,
        comments,
    })
}

/// Parses and validates a study document into a catalog entry.
pub fn load_study(json: &str) -> StudyEntry {
    match StudyConfig::from_json(json).and_then(StudyConfig::into_study) {
        Ok(study) => StudyEntry::Ready(Arc::new(study)),
        Err(error) => {
            let id = serde_json::from_str::<serde_json::Value>(json)
                .ok()
                .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string))
                .unwrap_or_default();
            StudyEntry::Broken(BrokenStudy { id, error })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> serde_json::Value {
        json!({
            "id": "study-1",
            "name": "Minimal",
            "lastModifiedTime": 1700000000,
            "basicSettings": {"length": 1},
            "postEnabledReactions": {"like": true, "share": false},
            "commentEnabledReactions": {"like": true},
            "sourcePostSelectionMethod": {"type": "overall", "truePostPercentage": 100},
            "sources": [{
                "id": "s1", "name": "Source", "maxPosts": 1,
                "credibility": {"type": "constant", "value": 50},
                "followers": {"type": "uniform", "min": 0, "max": 10}
            }],
            "posts": [{
                "id": "p1", "headline": "Headline", "content": "Body", "isTrue": true,
                "changesToCredibility": {"like": {"type": "constant", "value": 5}},
                "changesToFollowers": {"like": {"type": "constant", "value": 2}},
                "numberOfReactions": {"like": {"type": "constant", "value": 30}},
                "comments": [{"sourceName": "c", "message": "hi"}]
            }]
        })
    }

    #[test]
    fn test_minimal_study_loads() {
        let entry = load_study(&minimal().to_string());
        let StudyEntry::Ready(study) = entry else {
            panic!("expected a playable study");
        };
        assert_eq!(study.id, "study-1");
        assert_eq!(study.length(), 1);
        assert_eq!(study.last_modified_time, 1700000000);
        assert!(study.settings.reaction_requirements.post);
        assert!(!study.settings.reaction_requirements.comments);
        assert!(study.settings.post_reactions.contains(Reaction::Like));
        assert!(!study.settings.post_reactions.contains(Reaction::Share));
        assert!(study.settings.completion_code.is_none());
        assert_eq!(study.posts()[0].comments.len(), 1);
        assert!(study.get_source(&SourceId::from("s1")).is_some());
        assert!(study.get_post(&PostId::from("nope")).is_none());
    }

    #[test]
    fn test_missing_change_distribution_is_broken() {
        let mut doc = minimal();
        doc["postEnabledReactions"]["flag"] = json!(true);
        let entry = load_study(&doc.to_string());
        let StudyEntry::Broken(broken) = entry else {
            panic!("expected a broken study");
        };
        assert_eq!(broken.id, "study-1");
        assert!(matches!(
            broken.error,
            StudyError::MissingChangeDistribution {
                reaction: Reaction::Flag,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut doc = minimal();
        let source = doc["sources"][0].clone();
        doc["sources"].as_array_mut().unwrap().push(source);
        let entry = load_study(&doc.to_string());
        assert!(entry.is_broken());
    }

    #[test]
    fn test_unparseable_document_is_broken() {
        let entry = load_study("{\"id\": \"half\", \"name\": 3}");
        assert!(entry.is_broken());
        assert_eq!(entry.id(), "half");
    }

    #[test]
    fn test_invalid_percentage_is_broken() {
        let mut doc = minimal();
        doc["sourcePostSelectionMethod"]["truePostPercentage"] = json!(150);
        assert!(load_study(&doc.to_string()).is_broken());
    }

    #[test]
    fn test_completion_code_settings() {
        let mut doc = minimal();
        doc["advancedSettings"] = json!({"genCompletionCode": true, "completionCodeDigits": 8});
        let StudyEntry::Ready(study) = load_study(&doc.to_string()) else {
            panic!("expected a playable study");
        };
        assert_eq!(study.settings.completion_code.map(|f| f.digits()), Some(8));
    }
}
