use approx::assert_abs_diff_eq;
use score_processor::{
    config::RatingConfig,
    database::memory::MemoryStore,
    error::SubmissionError,
    model::{rating::Grade, structures::clear_type::ClearType},
    processor::{collaborators::PlayerCapability, tasks::BackgroundTask, SubmissionProcessor},
    utils::test_utils::{
        generate_catalog, generate_submission, test_chart, test_record, test_time, RecordingDispatcher, TestPlayer
    }
};
use std::{collections::HashSet, sync::Arc};

use super::{harness, harness_with};
use crate::common::init_test_env;

// song0 has constant 8.0; 990/5/5 with 800 shiny scores 9,925,800
const FIRST_RATING: f64 = 8.0 + 1.0 + 125_800.0 / 200_000.0;

#[tokio::test]
async fn test_first_play_creates_aggregates() {
    init_test_env();
    let h = harness();
    let player = TestPlayer::new(1);
    let submission = generate_submission(&test_chart("song0"), test_record(990, 5, 5, 800));

    let outcome = h.processor.submit_at(&submission, &player, test_time(0)).await.unwrap();

    assert!(outcome.is_new_best);
    assert!(!outcome.unranked);
    assert_eq!(outcome.grade, Grade::ExPlus);
    assert_abs_diff_eq!(outcome.rating, FIRST_RATING, epsilon = 1e-9);
    assert_eq!(outcome.previous_potential, 0.0);
    assert_abs_diff_eq!(outcome.player_potential, FIRST_RATING * 2.0 / 40.0, epsilon = 1e-9);
    assert_eq!(outcome.rating_ptt, (FIRST_RATING * 2.0 / 40.0 * 100.0).floor() as i32);
    assert!(outcome.challenge_higher);
    assert!(outcome.progression.is_none());

    let best = h.store.best_records(1);
    assert_eq!(best.len(), 1);
    assert_eq!(best[0].score, 9_925_800);
    assert_eq!(best[0].best_clear_type, ClearType::NormalClear);
    assert_eq!(h.store.recent_slots(1).len(), 1);
    assert_eq!(h.store.stored_rating(1).unwrap().potential, outcome.player_potential);
    assert_eq!(player.rating_state().unwrap().potential, outcome.player_potential);

    let tasks = h.dispatcher.tasks();
    assert_eq!(tasks.len(), 2);
    assert!(matches!(&tasks[0], BackgroundTask::RecordPlay(entry) if entry.score == 9_925_800));
    assert!(matches!(
        &tasks[1],
        BackgroundTask::RecordRatingSnapshot(snapshot) if snapshot.potential == outcome.player_potential
    ));
}

#[tokio::test]
async fn test_lower_score_keeps_best_but_enters_window() {
    init_test_env();
    let h = harness();
    let player = TestPlayer::new(1);
    let chart = test_chart("song0");

    h.processor
        .submit_at(&generate_submission(&chart, test_record(990, 5, 5, 800)), &player, test_time(0))
        .await
        .unwrap();
    let outcome = h
        .processor
        .submit_at(&generate_submission(&chart, test_record(900, 50, 50, 100)), &player, test_time(60))
        .await
        .unwrap();

    assert!(!outcome.is_new_best);
    assert_eq!(h.store.best_records(1)[0].score, 9_925_800);
    assert_eq!(h.store.recent_slots(1).len(), 2);
}

#[tokio::test]
async fn test_invalid_submission_changes_nothing() {
    init_test_env();
    let h = harness();
    let player = TestPlayer::new(1);
    let mut record = test_record(990, 5, 5, 800);
    record.score += 100;

    let err = h
        .processor
        .submit_at(&generate_submission(&test_chart("song0"), record), &player, test_time(0))
        .await
        .unwrap_err();

    assert_eq!(err.reason_code(), "score_mismatch");
    assert!(!err.is_transient());
    assert!(h.store.best_records(1).is_empty());
    assert!(h.dispatcher.tasks().is_empty());
}

#[tokio::test]
async fn test_unknown_chart_is_unranked() {
    init_test_env();
    let h = harness();
    let player = TestPlayer::new(1);

    let outcome = h
        .processor
        .submit_at(
            &generate_submission(&test_chart("unlisted"), test_record(990, 5, 5, 800)),
            &player,
            test_time(0)
        )
        .await
        .unwrap();

    assert!(outcome.unranked);
    assert_eq!(outcome.rating, 0.0);
    assert_eq!(outcome.player_potential, 0.0);
    assert!(!outcome.challenge_higher);
    assert_eq!(h.store.best_records(1).len(), 1);
    assert!(h.store.recent_slots(1).is_empty());
}

#[tokio::test]
async fn test_unknown_chart_rejected_when_disallowed() {
    init_test_env();
    let config = RatingConfig {
        allow_unknown_charts: false,
        ..Default::default()
    };
    let h = harness_with(config, generate_catalog(5));
    let player = TestPlayer::new(1);

    let err = h
        .processor
        .submit_at(
            &generate_submission(&test_chart("unlisted"), test_record(990, 5, 5, 800)),
            &player,
            test_time(0)
        )
        .await
        .unwrap_err();

    assert_eq!(err.reason_code(), "unknown_chart");
    assert!(h.store.best_records(1).is_empty());
}

#[tokio::test]
async fn test_failed_commit_leaves_state_consistent() {
    init_test_env();
    let h = harness();
    let player = TestPlayer::new(1);
    let record = test_record(990, 5, 5, 800);

    h.processor
        .submit_at(&generate_submission(&test_chart("song0"), record.clone()), &player, test_time(0))
        .await
        .unwrap();

    h.store.fail_next_commits(1);
    let err = h
        .processor
        .submit_at(&generate_submission(&test_chart("song1"), record.clone()), &player, test_time(10))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Resource(_)));
    assert!(err.is_transient());
    assert_eq!(h.store.best_records(1).len(), 1);
    assert_eq!(h.store.recent_slots(1).len(), 1);

    // The cached window must not remember the failed push
    h.processor
        .submit_at(&generate_submission(&test_chart("song2"), record), &player, test_time(20))
        .await
        .unwrap();

    let charts: HashSet<String> = h.store.recent_slots(1).into_iter().map(|s| s.chart.song_id).collect();
    assert_eq!(charts, HashSet::from(["song0".to_string(), "song2".to_string()]));
    let slot_ids: Vec<u8> = h.store.recent_slots(1).iter().map(|s| s.slot_id).collect();
    assert_eq!(slot_ids, vec![0, 1]);
}

#[tokio::test]
async fn test_window_stays_bounded_over_many_plays() {
    init_test_env();
    let h = harness();
    let player = TestPlayer::new(1);

    for i in 0..45 {
        let chart = test_chart(&format!("song{}", i % 40));
        h.processor
            .submit_at(&generate_submission(&chart, test_record(950, 30, 20, 500)), &player, test_time(i))
            .await
            .unwrap();
    }

    let slots = h.store.recent_slots(1);
    assert_eq!(slots.len(), 30);
    let ids: HashSet<u8> = slots.iter().map(|s| s.slot_id).collect();
    assert_eq!(ids.len(), 30);
    assert_eq!(h.store.best_records(1).len(), 40);
}

#[tokio::test]
async fn test_concurrent_submissions_for_one_player() {
    init_test_env();
    let h = Arc::new(harness());
    let player = Arc::new(TestPlayer::new(1));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let h = Arc::clone(&h);
            let player = Arc::clone(&player);
            tokio::spawn(async move {
                let submission = generate_submission(&test_chart(&format!("song{}", i)), test_record(990, 5, 5, 800));
                h.processor.submit_at(&submission, player.as_ref(), test_time(i)).await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let slots = h.store.recent_slots(1);
    assert_eq!(slots.len(), 20);
    let ids: HashSet<u8> = slots.iter().map(|s| s.slot_id).collect();
    assert_eq!(ids, (0..20).collect::<HashSet<u8>>());
    assert_eq!(h.store.best_records(1).len(), 20);
}

#[tokio::test]
async fn test_players_are_independent() {
    init_test_env();
    let h = harness();
    let alice = TestPlayer::new(1);
    let bob = TestPlayer::new(2);
    let submission = generate_submission(&test_chart("song3"), test_record(990, 5, 5, 800));

    h.processor.submit_at(&submission, &alice, test_time(0)).await.unwrap();
    let outcome = h.processor.submit_at(&submission, &bob, test_time(1)).await.unwrap();

    assert!(outcome.is_new_best);
    assert_eq!(h.store.best_records(1).len(), 1);
    assert_eq!(h.store.best_records(2).len(), 1);
}

#[tokio::test]
async fn test_processors_sharing_a_store_keep_each_others_slots() {
    init_test_env();
    let store = Arc::new(MemoryStore::new());
    let processor = || {
        SubmissionProcessor::new(
            Arc::clone(&store),
            RatingConfig::default(),
            Arc::new(generate_catalog(10)),
            Arc::new(RecordingDispatcher::new())
        )
    };
    let first = processor();
    let second = processor();
    let player = TestPlayer::new(1);
    let record = test_record(990, 5, 5, 800);

    // The first processor's mirror is stale once the second one commits
    first
        .submit_at(&generate_submission(&test_chart("song0"), record.clone()), &player, test_time(0))
        .await
        .unwrap();
    second
        .submit_at(&generate_submission(&test_chart("song1"), record.clone()), &player, test_time(1))
        .await
        .unwrap();
    let outcome = first
        .submit_at(&generate_submission(&test_chart("song2"), record), &player, test_time(2))
        .await
        .unwrap();

    let mut slots: Vec<(u8, String)> = store
        .recent_slots(1)
        .into_iter()
        .map(|s| (s.slot_id, s.chart.song_id))
        .collect();
    slots.sort();
    assert_eq!(
        slots,
        vec![(0, "song0".to_string()), (1, "song1".to_string()), (2, "song2".to_string())]
    );

    let stored = store.stored_rating(1).unwrap();
    assert_eq!(stored.revision, 3);
    assert_abs_diff_eq!(stored.potential, outcome.player_potential, epsilon = 1e-9);
    let recalculated = second.recalculate_player(1).await.unwrap();
    assert_abs_diff_eq!(recalculated.potential, outcome.player_potential, epsilon = 1e-9);
}
