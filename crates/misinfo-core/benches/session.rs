use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use misinfo_core::persistence::{decode_blob, encode_blob};
use misinfo_core::prelude::*;
use misinfo_logic::config::load_study;
use misinfo_logic::interaction::PostInteraction;
use misinfo_logic::reactions::Reaction;

const EXAMPLE_STUDY: &str = include_str!("../../../data/example_study.json");

fn services() -> GameServices {
    GameServices::new(None, Arc::new(MemorySink::new()))
}

fn bench_create(c: &mut Criterion) {
    let entry = load_study(EXAMPLE_STUDY);
    c.bench_function("create_session", |b| {
        let mut seed = 0;
        b.iter(|| {
            seed += 1;
            let game =
                Game::create_new_with_rng(&entry, services(), StdRng::seed_from_u64(seed));
            black_box(game.is_ok())
        })
    });
}

fn bench_persistence(c: &mut Criterion) {
    let entry = load_study(EXAMPLE_STUDY);
    let Ok(mut game) = Game::create_new_with_rng(&entry, services(), StdRng::seed_from_u64(1))
    else {
        return;
    };
    while let Ok(state) = game.current_state() {
        let comments = state.post().comments().len();
        let like = PostInteraction::empty(comments).with_toggled_post_reaction(Reaction::Like);
        if game.submit_interaction(like).is_err() {
            break;
        }
    }
    let persisted = game.session().to_persisted();

    c.bench_function("encode_blob", |b| {
        b.iter(|| black_box(encode_blob(&persisted).map(|blob| blob.len())))
    });

    let Ok(blob) = encode_blob(&persisted) else {
        return;
    };
    c.bench_function("decode_blob", |b| {
        b.iter(|| black_box(decode_blob(&blob).is_ok()))
    });

    c.bench_function("round_trip_changes", |b| {
        b.iter(|| black_box(game.round_trip_changes().map(|changes| changes.len())))
    });
}

criterion_group!(benches, bench_create, bench_persistence);
criterion_main!(benches);
