//! Game controller - main entry point for running a session

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use misinfo_logic::interaction::PostInteraction;
use misinfo_logic::participant::GameParticipant;
use misinfo_logic::reactions::{Reaction, ReactionSet};
use misinfo_logic::stepper::GameState;
use misinfo_logic::study::{Study, StudyEntry};

use crate::diff::Change;
use crate::error::{GameError, PersistError};
use crate::persistence::{decode_blob, encode_blob, PersistedGame, SAVE_KEY};
use crate::session::{check_compatibility, Session};
use crate::sink::{start_upload, ResultsSink, UploadHandle, UploadStatus};
use crate::storage::LocalStore;

/// Which screen the participant should be looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Introduction,
    Identification,
    Game,
    Debrief,
}

/// Collaborators a game talks to. The store is optional: without one the
/// session simply is not saved locally.
#[derive(Clone)]
pub struct GameServices {
    pub store: Option<Arc<dyn LocalStore>>,
    pub sink: Arc<dyn ResultsSink>,
}

impl GameServices {
    pub fn new(store: Option<Arc<dyn LocalStore>>, sink: Arc<dyn ResultsSink>) -> Self {
        Self { store, sink }
    }
}

/// Scores before and after a submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubmissionOutcome {
    pub credibility_before: f64,
    pub credibility_after: f64,
    pub followers_before: f64,
    pub followers_after: f64,
    pub finished: bool,
}

/// Drives one participant's session.
pub struct Game {
    session: Session,
    services: GameServices,
    rng: StdRng,
    upload: Option<UploadHandle>,
}

impl Game {
    /// Starts a new session for `entry`, seeded from system entropy.
    pub fn create_new(entry: &StudyEntry, services: GameServices) -> Result<Self, GameError> {
        Self::create_new_with_rng(entry, services, StdRng::from_entropy())
    }

    /// Starts a new session with every state precomputed up front.
    pub fn create_new_with_rng(
        entry: &StudyEntry,
        services: GameServices,
        mut rng: StdRng,
    ) -> Result<Self, GameError> {
        let study = match entry {
            StudyEntry::Ready(study) => Arc::clone(study),
            StudyEntry::Broken(broken) => {
                warn!("refusing to start study {}: {}", broken.id, broken.error);
                return Err(GameError::BrokenStudy(broken.error.clone()));
            }
        };

        let session_id = uuid::Builder::from_random_bytes(rng.gen())
            .into_uuid()
            .to_string();
        let mut session = Session::new(study, session_id, chrono::Utc::now().timestamp());
        session.calculate_all_states(&mut rng)?;
        info!(
            "Created session {} for study {} ({} posts)",
            session.session_id(),
            session.study().id,
            session.states().len()
        );

        let game = Self {
            session,
            services,
            rng,
            upload: None,
        };
        game.save_locally();
        Ok(game)
    }

    /// Rebuilds a game from its persisted form.
    pub fn from_persisted(
        persisted: PersistedGame,
        study: Arc<Study>,
        services: GameServices,
    ) -> Result<Self, GameError> {
        let session = Session::from_persisted(persisted, study)?;
        Ok(Self {
            session,
            services,
            rng: StdRng::from_entropy(),
            upload: None,
        })
    }

    /// Loads the locally saved session for `study`, if there is one.
    ///
    /// A saved session created against a different study, or a different
    /// version of it, is rejected with [`PersistError::StudyMismatch`].
    pub fn restore(study: Arc<Study>, services: GameServices) -> Result<Option<Self>, GameError> {
        let Some(store) = services.store.as_ref() else {
            return Ok(None);
        };
        let Some(blob) = store.load(SAVE_KEY).map_err(PersistError::from)? else {
            return Ok(None);
        };
        let persisted = decode_blob(&blob)?;
        check_compatibility(&persisted, &study)?;
        let game = Self::from_persisted(persisted, study, services)?;
        info!(
            "Restored session {} at post {}/{}",
            game.session.session_id(),
            game.session.participant().submitted_count(),
            game.session.study().length()
        );
        Ok(Some(game))
    }

    /// Replaces the random source, for reproducible runs.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn study(&self) -> &Arc<Study> {
        self.session.study()
    }

    pub fn participant(&self) -> &GameParticipant {
        self.session.participant()
    }

    pub fn is_finished(&self) -> bool {
        self.session.is_finished()
    }

    pub fn completion_code(&self) -> Option<&str> {
        self.session.completion_code()
    }

    pub fn end_time(&self) -> Option<i64> {
        self.session.end_time()
    }

    /// (submitted, total) posts.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.session.participant().submitted_count(),
            self.session.study().length(),
        )
    }

    pub fn current_stage(&self) -> Stage {
        if self.session.participant().participant_id().is_none()
            && self.session.study().settings.require_identification
        {
            Stage::Identification
        } else if self.session.is_finished() {
            Stage::Debrief
        } else if self.session.dismissed_prompt() {
            Stage::Game
        } else {
            Stage::Introduction
        }
    }

    pub fn current_state(&self) -> Result<&GameState, GameError> {
        self.session.current_state().ok_or(GameError::Finished)
    }

    pub fn next_state(&self) -> Option<&GameState> {
        self.session.next_state()
    }

    pub fn set_participant_id(&mut self, id: impl Into<String>) {
        self.session.participant_mut().set_participant_id(id);
        self.save_locally();
    }

    pub fn dismiss_prompt(&mut self) {
        self.session.set_dismissed_prompt();
        self.save_locally();
    }

    pub fn submit_interaction(
        &mut self,
        interaction: PostInteraction,
    ) -> Result<SubmissionOutcome, GameError> {
        self.submit_interactions(vec![interaction])
    }

    /// Submits one interaction per post, starting at the current post.
    ///
    /// The whole batch is validated before any of it is applied. When the
    /// last post is submitted, the end time and completion code are set,
    /// and the results upload is started.
    pub fn submit_interactions(
        &mut self,
        interactions: Vec<PostInteraction>,
    ) -> Result<SubmissionOutcome, GameError> {
        if interactions.is_empty() {
            return Err(if self.is_finished() {
                GameError::Finished
            } else {
                GameError::NoInteractions
            });
        }
        let start = self.session.participant().submitted_count();
        for (offset, interaction) in interactions.iter().enumerate() {
            let state = self
                .session
                .states()
                .get(start + offset)
                .ok_or(GameError::Finished)?;
            self.validate(state, interaction)?;
        }

        let credibility_before = self.session.participant().credibility();
        let followers_before = self.session.participant().followers();

        for interaction in interactions {
            let index = self.session.participant().submitted_count();
            let template = Arc::clone(self.session.states()[index].post().template());

            let mut credibility_change = 0.0;
            let mut followers_change = 0.0;
            for reaction in interaction.scored_reactions() {
                credibility_change += template
                    .changes_to_credibility
                    .sample(reaction, &mut self.rng)
                    .unwrap_or(0.0);
                followers_change += template
                    .changes_to_followers
                    .sample(reaction, &mut self.rng)
                    .unwrap_or(0.0);
            }
            debug!(
                "Post {} ({}): credibility {:+.2}, followers {:+.2}",
                index, template.id, credibility_change, followers_change
            );
            self.session
                .participant_mut()
                .add_submission(interaction, credibility_change, followers_change);
        }

        let finished = self.session.is_finished();
        if finished && self.session.end_time().is_none() {
            let code = self.session.study().generate_completion_code(&mut self.rng);
            self.session.finish(chrono::Utc::now().timestamp(), code);
            info!(
                "Session {} finished with credibility {:.1} and {:.0} followers",
                self.session.session_id(),
                self.session.participant().credibility(),
                self.session.participant().followers()
            );
        }

        self.save_locally();
        if finished {
            self.save_to_database();
        }

        Ok(SubmissionOutcome {
            credibility_before,
            credibility_after: self.session.participant().credibility(),
            followers_before,
            followers_after: self.session.participant().followers(),
            finished,
        })
    }

    fn validate(&self, state: &GameState, interaction: &PostInteraction) -> Result<(), GameError> {
        let settings = &self.session.study().settings;
        if !interaction.is_completed(&settings.reaction_requirements) {
            return Err(GameError::IncompleteInteraction);
        }

        let expected = state.post().comments().len();
        if interaction.comment_count() != expected {
            return Err(GameError::CommentMismatch {
                expected,
                found: interaction.comment_count(),
            });
        }

        check_enabled(interaction.post_reaction(), &settings.post_reactions, "posts")?;
        for reaction in interaction.comment_reactions() {
            check_enabled(*reaction, &settings.comment_reactions, "comments")?;
        }
        Ok(())
    }

    /// Writes the session to the local store. Failures are logged, not
    /// returned: losing the local copy must not interrupt the participant.
    pub fn save_locally(&self) {
        let Some(store) = self.services.store.as_ref() else {
            return;
        };
        let result = encode_blob(&self.session.to_persisted())
            .and_then(|blob| store.save(SAVE_KEY, &blob).map_err(PersistError::from));
        if let Err(e) = result {
            warn!(
                "Failed to save session {} locally: {}",
                self.session.session_id(),
                e
            );
        }
    }

    /// Returns the results upload, starting it unless one is already in
    /// flight or has succeeded.
    pub fn save_to_database(&mut self) -> UploadHandle {
        if let Some(handle) = &self.upload {
            if !matches!(UploadStatus::of(Some(handle)), UploadStatus::Failed(_)) {
                return handle.clone();
            }
        }
        self.begin_upload()
    }

    /// Starts a fresh upload if the last one failed.
    pub fn retry_upload(&mut self) -> Option<UploadHandle> {
        match self.upload_status() {
            UploadStatus::Failed(reason) => {
                info!("Retrying results upload after failure: {}", reason);
                Some(self.begin_upload())
            }
            _ => None,
        }
    }

    fn begin_upload(&mut self) -> UploadHandle {
        info!("Uploading results for session {}", self.session.session_id());
        let handle = start_upload(
            Arc::clone(&self.services.sink),
            Arc::clone(self.session.study()),
            self.session.to_persisted(),
        );
        self.upload = Some(handle.clone());
        handle
    }

    /// The current upload, if one was started.
    pub fn upload_handle(&self) -> Option<UploadHandle> {
        self.upload.clone()
    }

    /// Status of the current upload. The handle is lazy, so this reports
    /// `InFlight` as soon as an upload exists, even before anything has
    /// polled it.
    pub fn upload_status(&self) -> UploadStatus {
        UploadStatus::of(self.upload.as_ref())
    }

    pub fn round_trip_changes(&self) -> Result<Vec<Change>, GameError> {
        Ok(self.session.round_trip_changes()?)
    }
}

/// Skip is always accepted as "no reaction".
fn check_enabled(
    reaction: Option<Reaction>,
    enabled: &ReactionSet,
    target: &'static str,
) -> Result<(), GameError> {
    match reaction {
        Some(reaction) if reaction != Reaction::Skip && !enabled.contains(reaction) => {
            Err(GameError::ReactionNotEnabled { reaction, target })
        }
        _ => Ok(()),
    }
}
