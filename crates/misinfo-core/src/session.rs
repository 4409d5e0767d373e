//! Session data: the precomputed states, the participant ledger, and the
//! bookkeeping needed to persist and restore them.

use log::debug;
use rand::RngCore;
use serde_json::Value;
use std::sync::Arc;

use misinfo_logic::error::StepError;
use misinfo_logic::participant::GameParticipant;
use misinfo_logic::stepper::{advance_one_step, GameState, RoundPool};
use misinfo_logic::study::Study;

use crate::compress::{compress, decompress};
use crate::diff::{diff, Change};
use crate::error::PersistError;
use crate::persistence::{PersistedGame, PersistedParticipant, PersistedState};

/// One participant's run through a study.
#[derive(Debug, Clone)]
pub struct Session {
    study: Arc<Study>,
    study_mod_time: i64,
    session_id: String,
    start_time: i64,
    end_time: Option<i64>,
    states: Vec<GameState>,
    participant: GameParticipant,
    dismissed_prompt: bool,
    completion_code: Option<String>,
    /// Pool left behind by the latest step. Not persisted.
    round: Option<RoundPool>,
}

impl Session {
    /// An empty session: no states yet and a fresh participant.
    pub fn new(study: Arc<Study>, session_id: impl Into<String>, start_time: i64) -> Self {
        Self {
            study_mod_time: study.last_modified_time,
            study,
            session_id: session_id.into(),
            start_time,
            end_time: None,
            states: Vec::new(),
            participant: GameParticipant::default(),
            dismissed_prompt: false,
            completion_code: None,
            round: None,
        }
    }

    /// Appends the next state, threading the round pool from the last one.
    pub fn calculate_next_state(&mut self, rng: &mut dyn RngCore) -> Result<&GameState, StepError> {
        let outcome = advance_one_step(&self.study, self.round.take(), self.states.len(), rng)?;
        debug!(
            "Step {}: source {} (credibility {:.1}), post {}",
            outcome.state.index(),
            outcome.state.source().id(),
            outcome.state.source().credibility(),
            outcome.state.post().id()
        );
        self.round = Some(outcome.round);
        self.states.push(outcome.state);
        Ok(&self.states[self.states.len() - 1])
    }

    /// Calculates states until there is one per step of the study.
    pub fn calculate_all_states(&mut self, rng: &mut dyn RngCore) -> Result<(), StepError> {
        self.states.reserve(self.study.length().saturating_sub(self.states.len()));
        while self.states.len() < self.study.length() {
            self.calculate_next_state(rng)?;
        }
        Ok(())
    }

    pub fn study(&self) -> &Arc<Study> {
        &self.study
    }

    pub fn study_mod_time(&self) -> i64 {
        self.study_mod_time
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn end_time(&self) -> Option<i64> {
        self.end_time
    }

    pub fn states(&self) -> &[GameState] {
        &self.states
    }

    pub fn participant(&self) -> &GameParticipant {
        &self.participant
    }

    pub fn dismissed_prompt(&self) -> bool {
        self.dismissed_prompt
    }

    pub fn completion_code(&self) -> Option<&str> {
        self.completion_code.as_deref()
    }

    /// Every step has been submitted.
    pub fn is_finished(&self) -> bool {
        self.participant.submitted_count() >= self.study.length()
    }

    /// The state the participant is reacting to, if any remain.
    pub fn current_state(&self) -> Option<&GameState> {
        if self.is_finished() {
            return None;
        }
        self.states.get(self.participant.submitted_count())
    }

    /// The state after the current one, for preloading its media.
    pub fn next_state(&self) -> Option<&GameState> {
        self.states.get(self.participant.submitted_count() + 1)
    }

    pub(crate) fn participant_mut(&mut self) -> &mut GameParticipant {
        &mut self.participant
    }

    pub(crate) fn set_dismissed_prompt(&mut self) {
        self.dismissed_prompt = true;
    }

    pub(crate) fn finish(&mut self, end_time: i64, completion_code: Option<String>) {
        self.end_time = Some(end_time);
        self.completion_code = completion_code;
    }

    pub fn to_persisted(&self) -> PersistedGame {
        PersistedGame {
            study_id: self.study.id.clone(),
            study_mod_time: self.study_mod_time,
            session_id: self.session_id.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            states: self.states.iter().map(PersistedState::from).collect(),
            participant: PersistedParticipant::from(&self.participant),
            dismissed_prompt: self.dismissed_prompt,
            completion_code: self.completion_code.clone(),
        }
    }

    /// Rebuilds a session against `study`, which must be the study it was
    /// created for. Every state must be present.
    pub fn from_persisted(persisted: PersistedGame, study: Arc<Study>) -> Result<Self, PersistError> {
        if persisted.study_id != study.id {
            return Err(mismatch(&persisted, &study));
        }
        if persisted.states.len() != study.length() {
            return Err(PersistError::StateCount {
                expected: study.length(),
                found: persisted.states.len(),
            });
        }

        let states = persisted
            .states
            .iter()
            .enumerate()
            .map(|(index, state)| state.restore(index, &study))
            .collect::<Result<Vec<_>, _>>()?;
        let participant = persisted.participant.restore()?;

        Ok(Self {
            study,
            study_mod_time: persisted.study_mod_time,
            session_id: persisted.session_id,
            start_time: persisted.start_time,
            end_time: persisted.end_time,
            states,
            participant,
            dismissed_prompt: persisted.dismissed_prompt,
            completion_code: persisted.completion_code,
            round: None,
        })
    }

    /// Lists the differences introduced by encoding this session, decoding
    /// it, and encoding the result again. Empty when persistence is lossless.
    pub fn round_trip_changes(&self) -> Result<Vec<Change>, PersistError> {
        let packed = compress(self.to_persisted().to_value()?);
        let text = serde_json::to_string(&packed)?;

        let reparsed: Value = serde_json::from_str(&text)?;
        let persisted = PersistedGame::from_value(decompress(reparsed))?;
        let rebuilt = Session::from_persisted(persisted, Arc::clone(&self.study))?;

        let repacked = compress(rebuilt.to_persisted().to_value()?);
        Ok(diff(&packed, &repacked))
    }
}

/// Checks that a saved session belongs to the current version of `study`.
pub fn check_compatibility(persisted: &PersistedGame, study: &Study) -> Result<(), PersistError> {
    if persisted.study_id != study.id || persisted.study_mod_time != study.last_modified_time {
        return Err(mismatch(persisted, study));
    }
    Ok(())
}

fn mismatch(persisted: &PersistedGame, study: &Study) -> PersistError {
    PersistError::StudyMismatch {
        expected_id: study.id.clone(),
        expected_version: study.last_modified_time,
        found_id: persisted.study_id.clone(),
        found_version: persisted.study_mod_time,
    }
}
