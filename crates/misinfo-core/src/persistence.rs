//! Persisted form of a session.
//!
//! The persisted JSON is what is saved locally under [`SAVE_KEY`] and what is
//! uploaded as the participant's results. Templates are never stored: sources
//! and posts are saved by ID and resolved against the study on load. Older
//! blobs embedded the whole study under a `study` key; those are migrated by
//! reading the study's modification time from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use misinfo_logic::interaction::PostInteraction;
use misinfo_logic::participant::GameParticipant;
use misinfo_logic::post::{GameComment, GamePost};
use misinfo_logic::reactions::ReactionCounts;
use misinfo_logic::source::GameSource;
use misinfo_logic::stepper::GameState;
use misinfo_logic::study::{PostId, SourceId, Study};

use crate::compress::{compress, decompress};
use crate::error::PersistError;

/// Local store key the current session is saved under.
pub const SAVE_KEY: &str = "game";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSource {
    #[serde(rename = "sourceID")]
    pub source_id: String,
    pub credibility: f64,
    pub followers: f64,
    pub remaining_uses: i32,
}

impl From<&GameSource> for PersistedSource {
    fn from(source: &GameSource) -> Self {
        Self {
            source_id: source.id().0.clone(),
            credibility: source.credibility(),
            followers: source.followers(),
            remaining_uses: source.remaining_uses(),
        }
    }
}

impl PersistedSource {
    pub fn restore(&self, study: &Study) -> Result<GameSource, PersistError> {
        let template = study
            .get_source(&SourceId(self.source_id.clone()))
            .ok_or_else(|| PersistError::UnknownSource(self.source_id.clone()))?;
        GameSource::new(
            Arc::clone(template),
            self.credibility,
            self.followers,
            self.remaining_uses,
        )
        .map_err(|source| PersistError::Instance {
            context: format!("source {}", self.source_id),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedComment {
    pub number_of_reactions: ReactionCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPost {
    #[serde(rename = "postID")]
    pub post_id: String,
    pub number_of_reactions: ReactionCounts,
    pub comments: Vec<PersistedComment>,
    pub shown: bool,
}

impl From<&GamePost> for PersistedPost {
    fn from(post: &GamePost) -> Self {
        Self {
            post_id: post.id().0.clone(),
            number_of_reactions: post.number_of_reactions().clone(),
            comments: post
                .comments()
                .iter()
                .map(|comment| PersistedComment {
                    number_of_reactions: comment.number_of_reactions().clone(),
                })
                .collect(),
            shown: post.shown(),
        }
    }
}

impl PersistedPost {
    pub fn restore(&self, study: &Study) -> Result<GamePost, PersistError> {
        let template = study
            .get_post(&PostId(self.post_id.clone()))
            .ok_or_else(|| PersistError::UnknownPost(self.post_id.clone()))?;
        let context = || format!("post {}", self.post_id);
        let comments = self
            .comments
            .iter()
            .map(|comment| {
                GameComment::new(comment.number_of_reactions.clone()).map_err(|source| {
                    PersistError::Instance {
                        context: context(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        GamePost::new(
            Arc::clone(template),
            self.number_of_reactions.clone(),
            comments,
            self.shown,
        )
        .map_err(|source| PersistError::Instance {
            context: context(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub current_source: PersistedSource,
    pub current_post: PersistedPost,
}

impl From<&GameState> for PersistedState {
    fn from(state: &GameState) -> Self {
        Self {
            current_source: state.source().into(),
            current_post: state.post().into(),
        }
    }
}

impl PersistedState {
    pub fn restore(&self, index: usize, study: &Study) -> Result<GameState, PersistError> {
        Ok(GameState::new(
            index,
            self.current_source.restore(study)?,
            self.current_post.restore(study)?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedParticipant {
    #[serde(rename = "participantID", default)]
    pub participant_id: Option<String>,
    pub credibility: f64,
    pub followers: f64,
    #[serde(default)]
    pub interactions: Vec<PostInteraction>,
    /// Absent in the oldest blobs; seeded from the current value when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credibility_history: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_history: Option<Vec<f64>>,
}

impl From<&GameParticipant> for PersistedParticipant {
    fn from(participant: &GameParticipant) -> Self {
        Self {
            participant_id: participant.participant_id().map(str::to_string),
            credibility: participant.credibility(),
            followers: participant.followers(),
            interactions: participant.interactions().to_vec(),
            credibility_history: Some(participant.credibility_history().to_vec()),
            follower_history: Some(participant.follower_history().to_vec()),
        }
    }
}

impl PersistedParticipant {
    pub fn restore(&self) -> Result<GameParticipant, PersistError> {
        let credibility_history = self
            .credibility_history
            .clone()
            .unwrap_or_else(|| vec![self.credibility]);
        let follower_history = self
            .follower_history
            .clone()
            .unwrap_or_else(|| vec![self.followers]);
        Ok(GameParticipant::from_parts(
            self.participant_id.clone(),
            self.credibility,
            self.followers,
            self.interactions.clone(),
            credibility_history,
            follower_history,
        )?)
    }
}

/// The full persisted session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedGame {
    #[serde(rename = "studyID")]
    pub study_id: String,
    /// Modification time of the study the session was created against.
    pub study_mod_time: i64,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub states: Vec<PersistedState>,
    pub participant: PersistedParticipant,
    pub dismissed_prompt: bool,
    pub completion_code: Option<String>,
}

/// Only the part of an embedded legacy study that is still needed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyStudy {
    last_modified_time: i64,
}

/// Anything a saved blob may look like, before migration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPersistedGame {
    #[serde(rename = "studyID")]
    study_id: String,
    #[serde(default)]
    study_mod_time: Option<i64>,
    #[serde(default)]
    study: Option<LegacyStudy>,
    #[serde(rename = "sessionID")]
    session_id: String,
    start_time: i64,
    #[serde(default)]
    end_time: Option<i64>,
    states: Vec<PersistedState>,
    participant: PersistedParticipant,
    #[serde(default)]
    dismissed_prompt: bool,
    #[serde(default)]
    completion_code: Option<String>,
}

impl TryFrom<RawPersistedGame> for PersistedGame {
    type Error = PersistError;

    fn try_from(raw: RawPersistedGame) -> Result<Self, Self::Error> {
        let study_mod_time = match (raw.study, raw.study_mod_time) {
            (Some(legacy), _) => legacy.last_modified_time,
            (None, Some(time)) => time,
            (None, None) => return Err(PersistError::MissingField("studyModTime")),
        };
        Ok(Self {
            study_id: raw.study_id,
            study_mod_time,
            session_id: raw.session_id,
            start_time: raw.start_time,
            end_time: raw.end_time,
            states: raw.states,
            participant: raw.participant,
            dismissed_prompt: raw.dismissed_prompt,
            completion_code: raw.completion_code.filter(|code| !code.is_empty()),
        })
    }
}

impl PersistedGame {
    /// Reads a decompressed blob, migrating legacy layouts.
    pub fn from_value(value: Value) -> Result<Self, PersistError> {
        let raw: RawPersistedGame = serde_json::from_value(value)?;
        raw.try_into()
    }

    pub fn to_value(&self) -> Result<Value, PersistError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Encodes a session for the local store: compressed keys, compact JSON.
pub fn encode_blob(game: &PersistedGame) -> Result<String, PersistError> {
    let packed = compress(game.to_value()?);
    Ok(serde_json::to_string(&packed)?)
}

/// Decodes a blob written by [`encode_blob`]. Uncompressed blobs are read
/// as well.
pub fn decode_blob(blob: &str) -> Result<PersistedGame, PersistError> {
    let packed: Value = serde_json::from_str(blob)?;
    PersistedGame::from_value(decompress(packed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blob() -> Value {
        json!({
            "studyID": "study-1",
            "studyModTime": 1700000000,
            "sessionID": "abc",
            "startTime": 1700000100,
            "endTime": null,
            "states": [{
                "currentSource": {"sourceID": "s1", "credibility": 40.5, "followers": 120.0, "remainingUses": 2},
                "currentPost": {
                    "postID": "p1",
                    "numberOfReactions": {"like": 3.0, "share": 1.0},
                    "comments": [{"numberOfReactions": {"like": 2.0}}],
                    "shown": false
                }
            }],
            "participant": {
                "participantID": null,
                "credibility": 50.0,
                "followers": 0.0,
                "interactions": [],
                "credibilityHistory": [50.0],
                "followerHistory": [0.0]
            },
            "dismissedPrompt": false,
            "completionCode": null
        })
    }

    #[test]
    fn test_current_blob_reads_and_writes_identically() {
        let game = PersistedGame::from_value(blob()).unwrap();
        assert_eq!(game.study_mod_time, 1700000000);
        assert_eq!(game.states[0].current_source.remaining_uses, 2);
        assert_eq!(game.to_value().unwrap(), blob());
    }

    #[test]
    fn test_legacy_study_mod_time_is_migrated() {
        let mut legacy = blob();
        let object = legacy.as_object_mut().unwrap();
        object.remove("studyModTime");
        object.remove("dismissedPrompt");
        object.insert(
            "study".into(),
            json!({"name": "Old", "lastModifiedTime": 1600000000, "sources": []}),
        );

        let game = PersistedGame::from_value(legacy).unwrap();
        assert_eq!(game.study_mod_time, 1600000000);
        assert!(!game.dismissed_prompt);

        let written = game.to_value().unwrap();
        assert!(written.get("study").is_none());
        assert_eq!(written["studyModTime"], json!(1600000000));
    }

    #[test]
    fn test_missing_mod_time_is_rejected() {
        let mut value = blob();
        value.as_object_mut().unwrap().remove("studyModTime");
        let err = PersistedGame::from_value(value).unwrap_err();
        assert!(matches!(err, PersistError::MissingField("studyModTime")));
    }

    #[test]
    fn test_blob_encoding_reverses() {
        let game = PersistedGame::from_value(blob()).unwrap();
        let encoded = encode_blob(&game).unwrap();
        assert!(!encoded.contains("numberOfReactions"));
        assert_eq!(decode_blob(&encoded).unwrap(), game);

        let plain = serde_json::to_string(&blob()).unwrap();
        assert_eq!(decode_blob(&plain).unwrap(), game);
    }

    #[test]
    fn test_participant_without_history_is_seeded() {
        let participant = PersistedParticipant {
            participant_id: Some("p".into()),
            credibility: 61.0,
            followers: 4.0,
            interactions: vec![],
            credibility_history: None,
            follower_history: None,
        };
        let restored = participant.restore().unwrap();
        assert_eq!(restored.credibility_history(), &[61.0]);
        assert_eq!(restored.follower_history(), &[4.0]);
    }
}
