//! Integration tests for a full session: creation, play, persistence,
//! restore, and results upload.
//!
//! Everything runs in memory with seeded randomness.

use futures::executor::block_on;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::sync::Arc;

use misinfo_core::compress::compress;
use misinfo_core::persistence::{decode_blob, PersistedGame, SAVE_KEY};
use misinfo_core::prelude::*;
use misinfo_logic::config::load_study;
use misinfo_logic::error::StudyError;
use misinfo_logic::interaction::PostInteraction;
use misinfo_logic::reactions::Reaction;
use misinfo_logic::study::{Study, StudyEntry};

const EXAMPLE_STUDY: &str = include_str!("../../../data/example_study.json");

// ── Helpers ────────────────────────────────────────────────────────────

fn single_post_study(gen_completion_code: bool) -> Value {
    json!({
        "id": "single",
        "name": "Single post",
        "lastModifiedTime": 1700000000,
        "basicSettings": {"length": 1},
        "advancedSettings": {"genCompletionCode": gen_completion_code},
        "postEnabledReactions": {"like": true, "dislike": false, "share": false, "flag": false},
        "sourcePostSelectionMethod": {"type": "overall", "truePostPercentage": 100},
        "sources": [{
            "id": "s1", "name": "Only source", "maxPosts": 1,
            "credibility": {"type": "constant", "value": 50},
            "followers": {"type": "constant", "value": 10}
        }],
        "posts": [{
            "id": "p1", "headline": "Only post", "content": "text", "isTrue": true,
            "changesToCredibility": {"like": {"type": "constant", "value": 5}},
            "changesToFollowers": {"like": {"type": "constant", "value": 1}}
        }]
    })
}

fn ready(entry: &StudyEntry) -> Arc<Study> {
    match entry {
        StudyEntry::Ready(study) => Arc::clone(study),
        StudyEntry::Broken(broken) => panic!("study {} is broken: {}", broken.id, broken.error),
    }
}

fn services() -> (GameServices, Arc<MemoryStore>, Arc<MemorySink>) {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(MemorySink::new());
    let services = GameServices::new(Some(store.clone()), sink.clone());
    (services, store, sink)
}

fn like_current(game: &Game) -> PostInteraction {
    let comments = game.current_state().unwrap().post().comments().len();
    PostInteraction::empty(comments).with_toggled_post_reaction(Reaction::Like)
}

/// Plays every post with a random enabled reaction.
fn play_to_end(game: &mut Game, rng: &mut StdRng) {
    let choices = [Reaction::Like, Reaction::Dislike, Reaction::Share, Reaction::Flag, Reaction::Skip];
    while !game.is_finished() {
        let comments = game.current_state().unwrap().post().comments().len();
        let reaction = choices[rng.gen_range(0..choices.len())];
        let interaction = PostInteraction::empty(comments).with_toggled_post_reaction(reaction);
        game.submit_interaction(interaction).unwrap();
    }
}

// ── Scenarios ──────────────────────────────────────────────────────────

#[test]
fn single_like_finishes_the_game() {
    let entry = load_study(&single_post_study(false).to_string());
    let (services, _, _) = services();
    let mut game = Game::create_new_with_rng(&entry, services, StdRng::seed_from_u64(1)).unwrap();

    assert_eq!(game.session().states().len(), 1);
    let state = game.current_state().unwrap();
    assert_eq!(state.source().id().0, "s1");
    assert_eq!(state.post().id().0, "p1");
    assert_eq!(state.source().remaining_uses(), 1);
    assert!(!state.post().shown());

    game.dismiss_prompt();
    let outcome = game.submit_interaction(like_current(&game)).unwrap();
    assert_eq!(outcome.credibility_before, 50.0);
    assert_eq!(outcome.credibility_after, 55.0);
    assert_eq!(outcome.followers_after, 1.0);
    assert!(outcome.finished);
    assert!(game.is_finished());
    assert!(game.end_time().is_some());
    assert_eq!(game.current_stage(), Stage::Debrief);
}

#[test]
fn incomplete_interaction_is_rejected() {
    let entry = load_study(&single_post_study(false).to_string());
    let (services, _, _) = services();
    let mut game = Game::create_new_with_rng(&entry, services, StdRng::seed_from_u64(2)).unwrap();

    let err = game.submit_interaction(PostInteraction::empty(0)).unwrap_err();
    assert!(matches!(err, GameError::IncompleteInteraction));
    assert!(!game.is_finished());
    assert_eq!(game.participant().submitted_count(), 0);
    assert!(game.end_time().is_none());
}

#[test]
fn broken_study_cannot_start() {
    let mut doc = single_post_study(false);
    doc["basicSettings"]["length"] = json!(0);
    let entry = load_study(&doc.to_string());
    assert!(entry.is_broken());

    let (services, store, _) = services();
    let err = Game::create_new(&entry, services).err().unwrap();
    assert!(matches!(err, GameError::BrokenStudy(StudyError::ZeroLength)));
    assert!(store.load(SAVE_KEY).unwrap().is_none());
}

#[test]
fn completion_code_only_when_enabled() {
    for enabled in [false, true] {
        let entry = load_study(&single_post_study(enabled).to_string());
        let (services, _, _) = services();
        let mut game =
            Game::create_new_with_rng(&entry, services, StdRng::seed_from_u64(3)).unwrap();
        game.submit_interaction(like_current(&game)).unwrap();

        match game.completion_code() {
            Some(code) => {
                assert!(enabled);
                assert_eq!(code.len(), 6);
                assert!(code.chars().all(|c| c.is_ascii_digit()));
                assert!(!code.starts_with('0'));
            }
            None => assert!(!enabled),
        }
    }
}

// ── Invariants ─────────────────────────────────────────────────────────

#[test]
fn session_invariants_hold_across_seeds() {
    let entry = load_study(EXAMPLE_STUDY);
    let study = ready(&entry);

    for seed in 0..25 {
        let (services, _, _) = services();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut game = Game::create_new_with_rng(&entry, services, StdRng::seed_from_u64(seed))
            .unwrap();

        let states = game.session().states();
        assert_eq!(states.len(), study.length());
        let mut post_ids: Vec<_> = states.iter().map(|s| s.post().id().clone()).collect();
        post_ids.sort();
        post_ids.dedup();
        assert_eq!(post_ids.len(), states.len(), "seed {seed}: post shown twice");

        for template in study.sources() {
            if template.max_posts >= 0 {
                let uses = states.iter().filter(|s| s.source().id() == &template.id).count();
                assert!(uses <= template.max_posts as usize, "seed {seed}: {} overused", template.id);
            }
        }

        game.set_participant_id(format!("participant-{seed}"));
        game.dismiss_prompt();
        play_to_end(&mut game, &mut rng);

        let participant = game.participant();
        let n = participant.submitted_count();
        assert_eq!(n, study.length());
        assert_eq!(participant.credibility_history().len(), n + 1);
        assert_eq!(participant.follower_history().len(), n + 1);
        assert!(participant
            .credibility_history()
            .iter()
            .all(|c| (0.0..=100.0).contains(c)));
        assert!(participant.follower_history().iter().all(|f| *f >= 0.0));
        assert!(game.completion_code().is_some());
    }
}

#[test]
fn round_trip_has_no_changes() {
    let entry = load_study(EXAMPLE_STUDY);
    for seed in [4, 17, 99] {
        let (services, _, _) = services();
        let mut game = Game::create_new_with_rng(&entry, services, StdRng::seed_from_u64(seed))
            .unwrap();
        assert!(game.round_trip_changes().unwrap().is_empty());

        game.set_participant_id("rt");
        game.dismiss_prompt();
        game.submit_interaction(like_current(&game)).unwrap();
        assert!(game.round_trip_changes().unwrap().is_empty());

        play_to_end(&mut game, &mut StdRng::seed_from_u64(seed));
        let changes = game.round_trip_changes().unwrap();
        assert!(changes.is_empty(), "seed {seed}: {changes:?}");
    }
}

#[test]
fn huge_follower_changes_stay_saveable() {
    let doc = json!({
        "id": "viral",
        "name": "Viral",
        "lastModifiedTime": 1700000000,
        "basicSettings": {"length": 2},
        "postEnabledReactions": {"like": true, "dislike": false, "share": false, "flag": false},
        "sourcePostSelectionMethod": {"type": "overall", "truePostPercentage": 100},
        "sources": [{
            "id": "s1", "name": "Only source", "maxPosts": -1,
            "credibility": {"type": "constant", "value": 50},
            "followers": {"type": "constant", "value": 10}
        }],
        "posts": [
            {"id": "p1", "headline": "One", "content": "a", "isTrue": true,
             "changesToFollowers": {"like": {"type": "constant", "value": 1e308}}},
            {"id": "p2", "headline": "Two", "content": "b", "isTrue": true,
             "changesToFollowers": {"like": {"type": "constant", "value": 1e308}}}
        ]
    });
    let entry = load_study(&doc.to_string());
    let (services, store, _) = services();
    let mut game = Game::create_new_with_rng(&entry, services, StdRng::seed_from_u64(12)).unwrap();

    game.submit_interaction(like_current(&game)).unwrap();
    game.submit_interaction(like_current(&game)).unwrap();

    assert!(game.is_finished());
    assert_eq!(game.participant().followers(), f64::MAX);
    assert!(game.round_trip_changes().unwrap().is_empty());
    let blob = store.load(SAVE_KEY).unwrap().unwrap();
    assert_eq!(decode_blob(&blob).unwrap().participant.followers, f64::MAX);
}

// ── Persistence ────────────────────────────────────────────────────────

#[test]
fn local_save_restores_mid_game() {
    let entry = load_study(EXAMPLE_STUDY);
    let study = ready(&entry);
    let (services, store, sink) = services();
    let mut game =
        Game::create_new_with_rng(&entry, services.clone(), StdRng::seed_from_u64(5)).unwrap();
    game.set_participant_id("p-5");
    game.dismiss_prompt();
    game.submit_interaction(like_current(&game)).unwrap();
    game.submit_interaction(like_current(&game)).unwrap();

    let blob = store.load(SAVE_KEY).unwrap().unwrap();
    assert_eq!(decode_blob(&blob).unwrap(), game.session().to_persisted());

    let restored = Game::restore(Arc::clone(&study), services).unwrap().unwrap();
    assert_eq!(restored.progress(), (2, study.length()));
    assert_eq!(restored.current_stage(), Stage::Game);
    assert_eq!(restored.participant(), game.participant());
    assert_eq!(
        restored.current_state().unwrap().post().id(),
        game.current_state().unwrap().post().id()
    );
    assert_eq!(sink.submission_count(), 0);
}

#[test]
fn restore_rejects_newer_study_version() {
    let entry = load_study(EXAMPLE_STUDY);
    let (services, _, _) = services();
    Game::create_new_with_rng(&entry, services.clone(), StdRng::seed_from_u64(6)).unwrap();

    let mut doc: Value = serde_json::from_str(EXAMPLE_STUDY).unwrap();
    doc["lastModifiedTime"] = json!(1800000000);
    let edited = ready(&load_study(&doc.to_string()));

    let err = Game::restore(edited, services).err().unwrap();
    assert!(matches!(
        err,
        GameError::Persist(PersistError::StudyMismatch {
            expected_version: 1800000000,
            found_version: 1700000000,
            ..
        })
    ));
}

#[test]
fn legacy_blob_uses_embedded_study_time() {
    let entry = load_study(EXAMPLE_STUDY);
    let study = ready(&entry);
    let (services, store, _) = services();
    let game = Game::create_new_with_rng(&entry, services, StdRng::seed_from_u64(7)).unwrap();

    let mut legacy = game.session().to_persisted().to_value().unwrap();
    let object = legacy.as_object_mut().unwrap();
    object.remove("studyModTime");
    object.remove("completionCode");
    object.insert(
        "study".into(),
        json!({"name": "Headlines and Trust", "lastModifiedTime": 1700000000}),
    );
    store
        .save(SAVE_KEY, &serde_json::to_string(&compress(legacy.clone())).unwrap())
        .unwrap();

    let persisted = PersistedGame::from_value(legacy).unwrap();
    assert_eq!(persisted.study_mod_time, 1700000000);
    assert_eq!(persisted.completion_code, None);

    let restore_services = GameServices::new(Some(store), Arc::new(MemorySink::new()));
    let restored = Game::restore(study, restore_services).unwrap().unwrap();
    assert_eq!(restored.session().to_persisted(), game.session().to_persisted());
}

// ── Upload ─────────────────────────────────────────────────────────────

#[test]
fn upload_is_started_once() {
    let entry = load_study(&single_post_study(true).to_string());
    let (services, _, sink) = services();
    let mut game = Game::create_new_with_rng(&entry, services, StdRng::seed_from_u64(8)).unwrap();
    assert_eq!(game.upload_status(), UploadStatus::NotStarted);

    game.submit_interaction(like_current(&game)).unwrap();
    assert_eq!(game.upload_status(), UploadStatus::InFlight);

    let first = game.upload_handle().unwrap();
    let second = game.save_to_database();
    assert_eq!(block_on(first), Ok(()));
    assert_eq!(block_on(second), Ok(()));
    assert_eq!(block_on(game.save_to_database()), Ok(()));

    assert_eq!(game.upload_status(), UploadStatus::Succeeded);
    assert!(game.retry_upload().is_none());

    let submissions = sink.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].completion_code.as_deref(), game.completion_code());
    assert!(submissions[0].end_time.is_some());
}

#[test]
fn failed_upload_can_be_retried() {
    let entry = load_study(&single_post_study(false).to_string());
    let (services, _, sink) = services();
    sink.fail_next("network unreachable");
    let mut game = Game::create_new_with_rng(&entry, services, StdRng::seed_from_u64(9)).unwrap();
    game.submit_interaction(like_current(&game)).unwrap();

    let err = block_on(game.upload_handle().unwrap()).unwrap_err();
    assert_eq!(err.message, "network unreachable");
    assert_eq!(
        game.upload_status(),
        UploadStatus::Failed("network unreachable".into())
    );
    assert_eq!(sink.submission_count(), 0);

    let retry = game.retry_upload().unwrap();
    assert_eq!(block_on(retry), Ok(()));
    assert_eq!(game.upload_status(), UploadStatus::Succeeded);
    assert_eq!(sink.submission_count(), 1);
}
