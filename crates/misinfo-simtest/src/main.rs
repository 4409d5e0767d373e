//! Misinformation Game Headless Session Harness
//!
//! Loads a study, plays many seeded sessions end to end, and checks the
//! engine's invariants along the way. Runs entirely in-process: the local
//! store and results sink are in memory.
//!
//! Usage:
//!   cargo run -p misinfo-simtest
//!   cargo run -p misinfo-simtest -- --study path/to/study.json --runs 200 --verbose

use clap::Parser;
use futures::executor::block_on;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use misinfo_core::persistence::{decode_blob, SAVE_KEY};
use misinfo_core::prelude::*;
use misinfo_logic::config::load_study;
use misinfo_logic::interaction::PostInteraction;
use misinfo_logic::reactions::Reaction;
use misinfo_logic::study::{Study, StudyEntry};

// ── Bundled study (used when --study is not given) ──────────────────────
const EXAMPLE_STUDY: &str = include_str!("../../../data/example_study.json");

#[derive(Debug, Parser)]
#[command(name = "misinfo-simtest", about = "Plays seeded sessions and checks invariants")]
struct Args {
    /// Study JSON to load instead of the bundled example
    #[arg(long)]
    study: Option<std::path::PathBuf>,

    /// Number of sessions to play
    #[arg(long, default_value_t = 20)]
    runs: u64,

    /// Seed of the first session; later sessions use seed + i
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Print passing checks too
    #[arg(long)]
    verbose: bool,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let args = Args::parse();
    if args.verbose && std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();
    println!("=== Misinformation Game Session Harness ===\n");

    let json = match &args.study {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("could not read {}: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => EXAMPLE_STUDY.to_string(),
    };

    let mut results = Vec::new();

    // 1. Study loading
    let entry = load_study(&json);
    results.extend(validate_study(&entry));

    if let StudyEntry::Ready(study) = &entry {
        // 2. State generation across seeds
        results.extend(validate_generation(&entry, study, &args));

        // 3. Playing sessions to the end
        results.extend(validate_play(&entry, study, &args));

        // 4. Persistence and restore
        results.extend(validate_persistence(&entry, study, &args));

        // 5. Results upload
        results.extend(validate_upload(&entry, &args));
    }

    // 6. Broken study handling
    results.extend(validate_broken_study());

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || args.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn services() -> (GameServices, Arc<MemoryStore>, Arc<MemorySink>) {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(MemorySink::new());
    (
        GameServices::new(Some(store.clone()), sink.clone()),
        store,
        sink,
    )
}

fn seeds(args: &Args) -> impl Iterator<Item = u64> {
    let first = args.seed;
    (0..args.runs).map(move |i| first.wrapping_add(i))
}

/// Picks a random post reaction (skip included) and, when comment
/// reactions are required, one for each comment.
fn random_interaction(study: &Study, comments: usize, rng: &mut StdRng) -> PostInteraction {
    let settings = &study.settings;
    let mut post_choices: Vec<Reaction> = settings.post_reactions.iter().collect();
    post_choices.push(Reaction::Skip);
    let mut comment_choices: Vec<Reaction> = settings.comment_reactions.iter().collect();
    comment_choices.push(Reaction::Skip);

    let mut interaction = PostInteraction::empty(comments)
        .with_toggled_post_reaction(post_choices[rng.gen_range(0..post_choices.len())]);
    for index in 0..comments {
        if settings.reaction_requirements.comments || rng.gen_bool(0.3) {
            let reaction = comment_choices[rng.gen_range(0..comment_choices.len())];
            if let Ok(next) = interaction.with_toggled_comment_reaction(index, reaction) {
                interaction = next;
            }
        }
    }
    interaction
}

/// Plays a game to the end, returning the first error hit.
fn play(game: &mut Game, rng: &mut StdRng) -> Result<(), GameError> {
    if game.current_stage() == Stage::Identification {
        game.set_participant_id(format!("simtest-{}", rng.gen::<u32>()));
    }
    game.dismiss_prompt();
    while !game.is_finished() {
        let comments = game.current_state()?.post().comments().len();
        let interaction = random_interaction(game.study(), comments, rng);
        game.submit_interaction(interaction)?;
    }
    Ok(())
}

// ── 1. Study ────────────────────────────────────────────────────────────

fn validate_study(entry: &StudyEntry) -> Vec<TestResult> {
    println!("--- Study ---");
    let mut results = Vec::new();

    match entry {
        StudyEntry::Broken(broken) => {
            results.push(TestResult {
                name: "study_loads".into(),
                passed: false,
                detail: format!("study {} is broken: {}", broken.id, broken.error),
            });
        }
        StudyEntry::Ready(study) => {
            info!(
                "Loaded study {} ({}): {} sources, {} posts, length {}",
                study.id,
                study.name,
                study.sources().len(),
                study.posts().len(),
                study.length()
            );
            results.push(TestResult {
                name: "study_loads".into(),
                passed: true,
                detail: format!("{} ({})", study.id, study.name),
            });

            // Enough posts to fill a session without repeats
            results.push(TestResult {
                name: "study_enough_posts".into(),
                passed: study.posts().len() >= study.length(),
                detail: format!("{} posts for length {}", study.posts().len(), study.length()),
            });

            // Enough source uses, counting unlimited sources as infinite
            let unlimited = study.sources().iter().any(|s| s.max_posts == -1);
            let limited: i64 = study
                .sources()
                .iter()
                .filter(|s| s.max_posts > 0)
                .map(|s| i64::from(s.max_posts))
                .sum();
            results.push(TestResult {
                name: "study_enough_sources".into(),
                passed: unlimited || limited >= study.length() as i64,
                detail: if unlimited {
                    "has an unlimited source".into()
                } else {
                    format!("{} source uses for length {}", limited, study.length())
                },
            });
        }
    }

    results
}

// ── 2. Generation ───────────────────────────────────────────────────────

fn validate_generation(entry: &StudyEntry, study: &Study, args: &Args) -> Vec<TestResult> {
    println!("--- State Generation ---");
    let mut results = Vec::new();
    let mut created = 0;
    let mut wrong_length = Vec::new();
    let mut repeated_posts = Vec::new();
    let mut overused_sources = Vec::new();
    let mut true_posts = 0usize;
    let mut total_posts = 0usize;

    for seed in seeds(args) {
        let (services, _, _) = services();
        let game = match Game::create_new_with_rng(entry, services, StdRng::seed_from_u64(seed)) {
            Ok(game) => game,
            Err(e) => {
                results.push(TestResult {
                    name: format!("generation_seed_{}", seed),
                    passed: false,
                    detail: e.to_string(),
                });
                continue;
            }
        };
        created += 1;

        let states = game.session().states();
        if states.len() != study.length() {
            wrong_length.push(seed);
        }

        let mut post_ids: Vec<_> = states.iter().map(|s| s.post().id().clone()).collect();
        post_ids.sort();
        post_ids.dedup();
        if post_ids.len() != states.len() {
            repeated_posts.push(seed);
        }

        for template in study.sources().iter().filter(|s| s.max_posts > 0) {
            let uses = states
                .iter()
                .filter(|s| s.source().id() == &template.id)
                .count();
            if uses > template.max_posts as usize {
                overused_sources.push(format!("{}@{}", template.id, seed));
            }
        }

        total_posts += states.len();
        true_posts += states.iter().filter(|s| s.post().is_true()).count();
        debug!("seed {}: {} states", seed, states.len());
    }

    results.push(TestResult {
        name: "generation_creates_sessions".into(),
        passed: created == args.runs,
        detail: format!("{}/{} sessions created", created, args.runs),
    });
    results.push(TestResult {
        name: "generation_one_state_per_step".into(),
        passed: wrong_length.is_empty(),
        detail: if wrong_length.is_empty() {
            format!("every session has {} states", study.length())
        } else {
            format!("wrong state count for seeds {:?}", wrong_length)
        },
    });
    results.push(TestResult {
        name: "generation_no_repeated_posts".into(),
        passed: repeated_posts.is_empty(),
        detail: if repeated_posts.is_empty() {
            "no post shown twice".into()
        } else {
            format!("repeated posts for seeds {:?}", repeated_posts)
        },
    });
    results.push(TestResult {
        name: "generation_respects_max_posts".into(),
        passed: overused_sources.is_empty(),
        detail: if overused_sources.is_empty() {
            "no source exceeded maxPosts".into()
        } else {
            format!("overused: {}", overused_sources.join(", "))
        },
    });

    // Informational: observed true-post share
    let share = if total_posts == 0 {
        0.0
    } else {
        100.0 * true_posts as f64 / total_posts as f64
    };
    results.push(TestResult {
        name: "generation_true_post_share".into(),
        passed: true,
        detail: format!("{:.1}% of shown posts were true", share),
    });

    results
}

// ── 3. Play ─────────────────────────────────────────────────────────────

fn validate_play(entry: &StudyEntry, study: &Study, args: &Args) -> Vec<TestResult> {
    println!("--- Play ---");
    let mut results = Vec::new();
    let mut failures = Vec::new();
    let mut history_errors = Vec::new();
    let mut range_errors = Vec::new();
    let mut finish_errors = Vec::new();
    let mut final_credibility = Vec::new();

    for seed in seeds(args) {
        let (services, _, _) = services();
        let Ok(mut game) =
            Game::create_new_with_rng(entry, services, StdRng::seed_from_u64(seed))
        else {
            continue;
        };
        let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
        if let Err(e) = play(&mut game, &mut rng) {
            failures.push(format!("seed {}: {}", seed, e));
            continue;
        }

        let participant = game.participant();
        let n = participant.submitted_count();
        if participant.credibility_history().len() != n + 1
            || participant.follower_history().len() != n + 1
        {
            history_errors.push(seed);
        }
        let in_range = participant
            .credibility_history()
            .iter()
            .all(|c| (0.0..=100.0).contains(c))
            && participant.follower_history().iter().all(|f| *f >= 0.0);
        if !in_range {
            range_errors.push(seed);
        }

        let code_ok = game.completion_code().is_some() == study.settings.completion_code.is_some();
        if game.current_stage() != Stage::Debrief || game.end_time().is_none() || !code_ok {
            finish_errors.push(seed);
        }
        final_credibility.push(participant.credibility());
    }

    results.push(TestResult {
        name: "play_sessions_complete".into(),
        passed: failures.is_empty(),
        detail: if failures.is_empty() {
            format!("{} sessions played to the end", args.runs)
        } else {
            failures.join("; ")
        },
    });
    results.push(TestResult {
        name: "play_history_lengths".into(),
        passed: history_errors.is_empty(),
        detail: format!("{} sessions with bad history length", history_errors.len()),
    });
    results.push(TestResult {
        name: "play_scores_in_range".into(),
        passed: range_errors.is_empty(),
        detail: format!("{} sessions with out-of-range scores", range_errors.len()),
    });
    results.push(TestResult {
        name: "play_finish_bookkeeping".into(),
        passed: finish_errors.is_empty(),
        detail: if finish_errors.is_empty() {
            "end time, stage, and completion code set on finish".into()
        } else {
            format!("bad finish state for seeds {:?}", finish_errors)
        },
    });

    if !final_credibility.is_empty() {
        let mean = final_credibility.iter().sum::<f64>() / final_credibility.len() as f64;
        results.push(TestResult {
            name: "play_mean_final_credibility".into(),
            passed: true,
            detail: format!("{:.2}", mean),
        });
    }

    results
}

// ── 4. Persistence ──────────────────────────────────────────────────────

fn validate_persistence(entry: &StudyEntry, study: &Arc<Study>, args: &Args) -> Vec<TestResult> {
    println!("--- Persistence ---");
    let mut results = Vec::new();
    let mut round_trip_failures = Vec::new();
    let mut restore_failures = Vec::new();

    for seed in seeds(args) {
        let (services, store, _) = services();
        let Ok(mut game) =
            Game::create_new_with_rng(entry, services.clone(), StdRng::seed_from_u64(seed))
        else {
            continue;
        };

        let mut rng = StdRng::seed_from_u64(seed);
        game.dismiss_prompt();
        if let Ok(state) = game.current_state() {
            let interaction = random_interaction(study, state.post().comments().len(), &mut rng);
            let _ = game.submit_interaction(interaction);
        }

        match game.round_trip_changes() {
            Ok(changes) if changes.is_empty() => {}
            Ok(changes) => round_trip_failures.push(format!(
                "seed {}: {}",
                seed,
                changes
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            Err(e) => round_trip_failures.push(format!("seed {}: {}", seed, e)),
        }

        let saved = store
            .load(SAVE_KEY)
            .ok()
            .flatten()
            .and_then(|blob| decode_blob(&blob).ok());
        let restored = Game::restore(Arc::clone(study), services).ok().flatten();
        let matches = saved.as_ref() == Some(&game.session().to_persisted())
            && restored.map(|r| r.session().to_persisted()) == saved;
        if !matches {
            restore_failures.push(seed);
        }
    }

    results.push(TestResult {
        name: "persistence_round_trip".into(),
        passed: round_trip_failures.is_empty(),
        detail: if round_trip_failures.is_empty() {
            "encode/decode/encode produced no changes".into()
        } else {
            round_trip_failures.join("; ")
        },
    });
    results.push(TestResult {
        name: "persistence_local_restore".into(),
        passed: restore_failures.is_empty(),
        detail: if restore_failures.is_empty() {
            "restored sessions match the saved ones".into()
        } else {
            format!("restore mismatch for seeds {:?}", restore_failures)
        },
    });

    results
}

// ── 5. Upload ───────────────────────────────────────────────────────────

fn validate_upload(entry: &StudyEntry, args: &Args) -> Vec<TestResult> {
    println!("--- Upload ---");
    let mut results = Vec::new();
    let (services, _, sink) = services();
    sink.fail_next("simulated outage");

    let mut game =
        match Game::create_new_with_rng(entry, services, StdRng::seed_from_u64(args.seed)) {
            Ok(game) => game,
            Err(e) => {
                results.push(TestResult {
                    name: "upload_session".into(),
                    passed: false,
                    detail: e.to_string(),
                });
                return results;
            }
        };
    let mut rng = StdRng::seed_from_u64(args.seed);
    if let Err(e) = play(&mut game, &mut rng) {
        results.push(TestResult {
            name: "upload_session".into(),
            passed: false,
            detail: e.to_string(),
        });
        return results;
    }

    let first = game.upload_handle().map(block_on);
    results.push(TestResult {
        name: "upload_failure_reported".into(),
        passed: matches!(game.upload_status(), UploadStatus::Failed(_))
            && matches!(first, Some(Err(_))),
        detail: format!("{:?}", game.upload_status()),
    });

    let retried = game.retry_upload().map(block_on);
    let again = block_on(game.save_to_database());
    results.push(TestResult {
        name: "upload_retry_succeeds_once".into(),
        passed: matches!(retried, Some(Ok(())))
            && again.is_ok()
            && sink.submission_count() == 1
            && game.upload_status() == UploadStatus::Succeeded,
        detail: format!("{} submission(s) recorded", sink.submission_count()),
    });

    results
}

// ── 6. Broken study ─────────────────────────────────────────────────────

fn validate_broken_study() -> Vec<TestResult> {
    println!("--- Broken Study ---");
    let mut results = Vec::new();

    let entry = load_study(r#"{"id": "broken", "name": "Broken", "lastModifiedTime": 0}"#);
    let (services, _, _) = services();
    let started = Game::create_new(&entry, services);
    results.push(TestResult {
        name: "broken_study_refused".into(),
        passed: entry.is_broken() && matches!(started, Err(GameError::BrokenStudy(_))),
        detail: match &entry {
            StudyEntry::Broken(broken) => broken.error.to_string(),
            StudyEntry::Ready(_) => "study unexpectedly loaded".into(),
        },
    });

    results
}
