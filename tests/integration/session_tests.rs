use futures::future::BoxFuture;
use score_processor::{
    config::RatingConfig,
    database::memory::MemoryStore,
    error::{ProgressionError, SubmissionError},
    model::structures::{
        clear_type::ClearType,
        session::{CourseSession, SessionBinding, SessionKind, WorldSession}
    },
    processor::{
        collaborators::{
            PlayerCapability, ProgressionHandler, ProgressionHandoff, ProgressionOutcome, StaticChartCatalog,
            StaticSessionService
        },
        SubmissionProcessor
    },
    utils::test_utils::{
        generate_chart, generate_submission, sign_submission, test_chart, test_record, test_time,
        RecordingDispatcher, TestPlayer
    }
};
use serde_json::json;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc
};

use crate::common::init_test_env;

const SONG_HASH: &str = "0cc175b9c0f1b6a831c399e269772661";

/// Spends stamina proportional to the session multiplier and echoes the play.
#[derive(Default)]
struct WorldMap {
    calls: AtomicUsize
}

impl ProgressionHandler for WorldMap {
    fn update<'a>(&'a self, handoff: ProgressionHandoff<'a>) -> BoxFuture<'a, Result<ProgressionOutcome, ProgressionError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let SessionKind::World(world) = handoff.session else {
                return Err(ProgressionError::Failed("not a world session".to_string()));
            };
            let stamina = handoff.player.spend_stamina(2 * world.stamina_multiply)?;

            Ok(ProgressionOutcome {
                session: "world",
                data: json!({
                    "stamina": stamina,
                    "potential": handoff.potential,
                    "play_value": handoff.play_value
                })
            })
        })
    }
}

struct FailingCourse;

impl ProgressionHandler for FailingCourse {
    fn update<'a>(&'a self, _: ProgressionHandoff<'a>) -> BoxFuture<'a, Result<ProgressionOutcome, ProgressionError>> {
        Box::pin(async { Err(ProgressionError::Failed("course table locked".to_string())) })
    }
}

struct SessionHarness {
    store: Arc<MemoryStore>,
    sessions: Arc<StaticSessionService>,
    world: Arc<WorldMap>,
    processor: SubmissionProcessor<MemoryStore>
}

fn session_harness(config: RatingConfig) -> SessionHarness {
    let store = Arc::new(MemoryStore::new());
    let sessions = Arc::new(StaticSessionService::new());
    let world = Arc::new(WorldMap::default());

    let mut hashed = generate_chart("hashed", 10.0);
    hashed.content_hash = Some(SONG_HASH.to_string());
    let catalog = StaticChartCatalog::new([generate_chart("song0", 9.0), generate_chart("song1", 9.5), hashed]);

    let processor = SubmissionProcessor::new(
        Arc::clone(&store),
        config,
        Arc::new(catalog),
        Arc::new(RecordingDispatcher::new())
    )
    .with_sessions(sessions.clone())
    .with_world_progression(world.clone())
    .with_course_progression(Arc::new(FailingCourse));

    SessionHarness {
        store,
        sessions,
        world,
        processor
    }
}

fn world_session() -> SessionKind {
    SessionKind::World(WorldSession {
        stamina_multiply: 2,
        fragment_multiply: 100,
        prog_boost_multiply: 0,
        beyond_boost_gauge_usage: 0,
        skill_flags: Vec::new(),
        invasion: None
    })
}

#[tokio::test]
async fn test_world_session_reaches_progression() {
    init_test_env();
    let h = session_harness(RatingConfig::default());
    h.sessions.insert(
        "world-token",
        SessionBinding {
            chart: test_chart("song0"),
            kind: world_session()
        }
    );
    let player = TestPlayer::with_stamina(5, 12);
    let submission = sign_submission(
        generate_submission(&test_chart("song0"), test_record(990, 5, 5, 800)),
        5,
        "world-token",
        SONG_HASH
    );

    let outcome = h.processor.submit_at(&submission, &player, test_time(0)).await.unwrap();

    let progression = outcome.progression.unwrap();
    assert_eq!(progression.session, "world");
    assert_eq!(progression.data["stamina"], json!(8));
    assert_eq!(progression.data["potential"], json!(outcome.player_potential));
    assert_eq!(player.stamina(), 8);
    assert_eq!(h.world.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_token_is_plain_play() {
    init_test_env();
    let h = session_harness(RatingConfig::default());
    let player = TestPlayer::new(5);
    let submission = sign_submission(
        generate_submission(&test_chart("song0"), test_record(990, 5, 5, 800)),
        5,
        "expired",
        SONG_HASH
    );

    let outcome = h.processor.submit_at(&submission, &player, test_time(0)).await.unwrap();

    assert!(outcome.progression.is_none());
    assert_eq!(h.world.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.best_records(5).len(), 1);
}

#[tokio::test]
async fn test_tampered_record_is_rejected() {
    init_test_env();
    let h = session_harness(RatingConfig::default());
    let player = TestPlayer::new(5);
    let mut submission = sign_submission(
        generate_submission(&test_chart("song0"), test_record(990, 5, 5, 800)),
        5,
        "tok",
        SONG_HASH
    );
    // Still a consistent record, but not the one that was signed
    submission.record = test_record(995, 5, 0, 800);

    let err = h.processor.submit_at(&submission, &player, test_time(0)).await.unwrap_err();

    assert_eq!(err.reason_code(), "checksum_mismatch");
    assert!(!err.is_transient());
    assert!(h.store.best_records(5).is_empty());
}

#[tokio::test]
async fn test_checksum_is_bound_to_player() {
    init_test_env();
    let h = session_harness(RatingConfig::default());
    let submission = sign_submission(
        generate_submission(&test_chart("song0"), test_record(990, 5, 5, 800)),
        5,
        "tok",
        SONG_HASH
    );

    let err = h
        .processor
        .submit_at(&submission, &TestPlayer::new(6), test_time(0))
        .await
        .unwrap_err();

    assert_eq!(err.reason_code(), "checksum_mismatch");
}

#[tokio::test]
async fn test_session_for_other_chart_is_rejected() {
    init_test_env();
    let h = session_harness(RatingConfig::default());
    h.sessions.insert(
        "world-token",
        SessionBinding {
            chart: test_chart("song1"),
            kind: world_session()
        }
    );
    let submission = sign_submission(
        generate_submission(&test_chart("song0"), test_record(990, 5, 5, 800)),
        5,
        "world-token",
        SONG_HASH
    );

    let err = h
        .processor
        .submit_at(&submission, &TestPlayer::new(5), test_time(0))
        .await
        .unwrap_err();

    assert_eq!(err.reason_code(), "session_chart_mismatch");
    assert_eq!(h.world.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_content_hash_mismatch() {
    init_test_env();
    let h = session_harness(RatingConfig::default());
    let player = TestPlayer::new(5);
    let record = test_record(990, 5, 5, 800);

    let wrong = sign_submission(generate_submission(&test_chart("hashed"), record.clone()), 5, "tok", "deadbeef");
    let err = h.processor.submit_at(&wrong, &player, test_time(0)).await.unwrap_err();
    assert_eq!(err.reason_code(), "content_hash_mismatch");

    // Hashes compare exactly, so a case change is a mismatch
    let upper = sign_submission(
        generate_submission(&test_chart("hashed"), record),
        5,
        "tok",
        &SONG_HASH.to_uppercase()
    );
    let err = h.processor.submit_at(&upper, &player, test_time(1)).await.unwrap_err();
    assert_eq!(err.reason_code(), "content_hash_mismatch");
    assert!(h.store.best_records(5).is_empty());
}

#[tokio::test]
async fn test_bypass_token_skips_checks() {
    init_test_env();
    let config = RatingConfig {
        session_bypass_token: Some("bypass-token".to_string()),
        ..Default::default()
    };
    let h = session_harness(config);
    let mut submission = generate_submission(&test_chart("hashed"), test_record(990, 5, 5, 800));
    submission = sign_submission(submission, 5, "bypass-token", "wrong-hash");
    submission.session.as_mut().unwrap().submission_hash = "garbage".to_string();

    let outcome = h
        .processor
        .submit_at(&submission, &TestPlayer::new(5), test_time(0))
        .await
        .unwrap();

    assert!(outcome.is_new_best);
    assert!(outcome.progression.is_none());
}

#[tokio::test]
async fn test_progression_failure_rolls_back() {
    init_test_env();
    let h = session_harness(RatingConfig::default());
    h.sessions.insert(
        "course-token",
        SessionBinding {
            chart: test_chart("song1"),
            kind: SessionKind::Course(CourseSession {
                course_id: "c1".to_string(),
                state: 0,
                score: 0,
                clear_type: ClearType::NormalClear
            })
        }
    );
    let player = TestPlayer::new(5);
    let submission = sign_submission(
        generate_submission(&test_chart("song1"), test_record(990, 5, 5, 800)),
        5,
        "course-token",
        SONG_HASH
    );

    let err = h.processor.submit_at(&submission, &player, test_time(0)).await.unwrap_err();

    assert!(matches!(err, SubmissionError::Progression(_)));
    assert_eq!(err.reason_code(), "progression_failed");
    // Nothing from the failed submission is committed
    assert!(h.store.best_records(5).is_empty());
    assert!(h.store.recent_slots(5).is_empty());
    assert!(h.store.stored_rating(5).is_none());
    assert!(player.rating_state().is_none());

    // A retry without the session lands once
    let plain = generate_submission(&test_chart("song1"), test_record(990, 5, 5, 800));
    let outcome = h.processor.submit_at(&plain, &player, test_time(1)).await.unwrap();
    assert!(outcome.is_new_best);
    assert_eq!(h.store.best_records(5).len(), 1);
    assert_eq!(h.store.recent_slots(5).len(), 1);
    assert_eq!(h.store.stored_rating(5).unwrap().revision, 1);
}

#[tokio::test]
async fn test_stamina_shortage_is_reported() {
    init_test_env();
    let h = session_harness(RatingConfig::default());
    h.sessions.insert(
        "world-token",
        SessionBinding {
            chart: test_chart("song0"),
            kind: world_session()
        }
    );
    let player = TestPlayer::with_stamina(5, 1);
    let submission = sign_submission(
        generate_submission(&test_chart("song0"), test_record(990, 5, 5, 800)),
        5,
        "world-token",
        SONG_HASH
    );

    let err = h.processor.submit_at(&submission, &player, test_time(0)).await.unwrap_err();

    assert_eq!(err.reason_code(), "stamina_not_enough");
    assert_eq!(player.stamina(), 1);
}
