use approx::assert_abs_diff_eq;
use score_processor::{
    config::RatingConfig,
    model::structures::{
        best_record::BestRecord,
        clear_type::ClearType,
        formula::{AggregateKind, FormulaTerm}
    },
    processor::{collaborators::StaticChartCatalog, RecalculationSummary},
    utils::test_utils::{
        generate_catalog, generate_chart, generate_rated_play, generate_submission, test_chart, test_record,
        test_time, TestPlayer
    }
};

use super::{harness, harness_with, Harness};
use crate::common::init_test_env;

fn seed_bests(h: &Harness, player_id: i32, n: usize, rating: f64) {
    for i in 0..n {
        let play = generate_rated_play(
            test_chart(&format!("song{}", i)),
            9_800_000,
            rating,
            ClearType::NormalClear,
            i as i64
        );
        h.store.seed_best_record(BestRecord::from_play(player_id, &play));
    }
}

#[tokio::test]
async fn test_recalculate_from_best_records_only() {
    init_test_env();
    let h = harness();
    seed_bests(&h, 1, 35, 10.0);

    let state = h.processor.recalculate_player(1).await.unwrap();

    // Top 30 of 35 equal ratings, nothing in the window
    assert_abs_diff_eq!(state.potential, 7.5, epsilon = 1e-9);
    assert_abs_diff_eq!(h.store.stored_rating(1).unwrap().potential, 7.5, epsilon = 1e-9);
}

#[tokio::test]
async fn test_recalculate_matches_submission_path() {
    init_test_env();
    let h = harness();
    let player = TestPlayer::new(1);

    let mut last = 0.0;
    for (i, record) in [test_record(990, 5, 5, 800), test_record(950, 30, 20, 400), test_record(900, 80, 20, 100)]
        .into_iter()
        .enumerate()
    {
        let submission = generate_submission(&test_chart(&format!("song{}", i * 7)), record);
        last = h
            .processor
            .submit_at(&submission, &player, test_time(i as i64))
            .await
            .unwrap()
            .player_potential;
    }

    let state = h.processor.recalculate_player(1).await.unwrap();
    assert_abs_diff_eq!(state.potential, last, epsilon = 1e-9);
}

#[tokio::test]
async fn test_recalculate_all_applies_new_formula() {
    init_test_env();
    let config = RatingConfig {
        potential_formula: vec![FormulaTerm::new(AggregateKind::Best, 30, 1.0 / 30.0)],
        ..Default::default()
    };
    let h = harness_with(config, generate_catalog(50));
    seed_bests(&h, 1, 30, 10.0);
    seed_bests(&h, 2, 15, 12.0);
    seed_bests(&h, 3, 0, 0.0);

    let summary = h.processor.recalculate_all(2).await.unwrap();

    assert_eq!(summary, RecalculationSummary { updated: 2, failed: 0 });
    assert_abs_diff_eq!(h.store.stored_rating(1).unwrap().potential, 10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(h.store.stored_rating(2).unwrap().potential, 6.0, epsilon = 1e-9);
    assert!(h.store.stored_rating(3).is_none());
}

#[tokio::test]
async fn test_recalculate_all_counts_failures() {
    init_test_env();
    let h = harness();
    seed_bests(&h, 1, 5, 10.0);
    seed_bests(&h, 2, 5, 10.0);
    h.store.fail_next_commits(1);

    let summary = h.processor.recalculate_all(1).await.unwrap();

    assert_eq!(summary, RecalculationSummary { updated: 1, failed: 1 });
}

#[tokio::test]
async fn test_challenge_higher_uses_updated_potential() {
    init_test_env();
    let h = harness_with(RatingConfig::default(), StaticChartCatalog::new([generate_chart("low", 7.0)]));
    seed_bests(&h, 1, 30, 10.0);
    h.processor.recalculate_player(1).await.unwrap();

    // 9,650,500 on a 7.0 chart rates just above 7.5, and the play itself
    // lifts the recent term past that
    let submission = generate_submission(&test_chart("low"), test_record(950, 30, 20, 500));
    let outcome = h
        .processor
        .submit_at(&submission, &TestPlayer::new(1), test_time(0))
        .await
        .unwrap();

    assert_abs_diff_eq!(outcome.previous_potential, 7.5, epsilon = 1e-9);
    assert!(outcome.rating > outcome.previous_potential);
    assert!(outcome.rating < outcome.player_potential);
    assert!(!outcome.challenge_higher);
}
