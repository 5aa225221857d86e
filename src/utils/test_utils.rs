use crate::{
    error::ProgressionError,
    model::{
        integrity::checksum,
        structures::{
            chart::{Chart, ChartKey},
            clear_type::ClearType,
            difficulty::Difficulty,
            performance::{PerformanceRecord, RatedPlay, Submission},
            player_rating::PlayerRatingState,
            recent_slot::RecentEntry,
            session::{PlayBonuses, SessionProof}
        },
        validator::reconstructed_score
    },
    processor::{
        collaborators::{PlayerCapability, StaticChartCatalog},
        tasks::{BackgroundTask, TaskDispatcher}
    }
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Mutex;

/// Fixed origin for generated timestamps
pub fn test_time(offset_secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(offset_secs)
}

/// `song_id` on the Future difficulty
pub fn test_chart(song_id: &str) -> ChartKey {
    ChartKey::new(song_id, Difficulty::Future)
}

pub fn generate_chart(song_id: &str, chart_const: f64) -> Chart {
    Chart {
        key: test_chart(song_id),
        chart_const: Some(chart_const),
        content_hash: None
    }
}

/// A catalog of `n` ranked charts `song0..song{n-1}` with constants between 8.0 and 12.0.
pub fn generate_catalog(n: usize) -> StaticChartCatalog {
    StaticChartCatalog::new((0..n).map(|i| generate_chart(&format!("song{}", i), 8.0 + (i % 41) as f64 * 0.1)))
}

/// A record whose score matches its judgements exactly.
pub fn test_record(perfect: i32, near: i32, miss: i32, shiny: i32) -> PerformanceRecord {
    let mut record = PerformanceRecord {
        score: 0,
        shiny_perfect_count: shiny,
        perfect_count: perfect,
        near_count: near,
        miss_count: miss,
        health: 100,
        modifier: 0,
        time_played: 1_709_294_400,
        clear_type: ClearType::NormalClear as i32
    };
    record.score = reconstructed_score(&record).unwrap().round() as i32;

    record
}

pub fn generate_submission(chart: &ChartKey, record: PerformanceRecord) -> Submission {
    Submission {
        song_id: chart.song_id.clone(),
        difficulty: chart.difficulty as i32,
        record,
        session: None
    }
}

/// Attaches a correctly signed session proof for `player_id`.
pub fn sign_submission(mut submission: Submission, player_id: i32, song_token: &str, song_hash: &str) -> Submission {
    let chart = ChartKey::new(
        submission.song_id.clone(),
        Difficulty::try_from(submission.difficulty).unwrap()
    );
    let mut proof = SessionProof {
        song_token: song_token.to_string(),
        song_hash: song_hash.to_string(),
        submission_hash: String::new(),
        bonuses: PlayBonuses::default()
    };
    proof.submission_hash = checksum(player_id, &chart, &submission.record, &proof);
    submission.session = Some(proof);

    submission
}

/// A rated play with fixed judgements. Only `score`, `rating` and the clear
/// type are meaningful.
pub fn generate_rated_play(
    chart: ChartKey,
    score: i32,
    rating: f64,
    clear_type: ClearType,
    offset_secs: i64
) -> RatedPlay {
    RatedPlay {
        chart,
        record: PerformanceRecord {
            score,
            shiny_perfect_count: 500,
            perfect_count: 950,
            near_count: 30,
            miss_count: 20,
            health: 100,
            modifier: 0,
            time_played: test_time(offset_secs).timestamp(),
            clear_type: clear_type as i32
        },
        clear_type,
        rating,
        score_v2: 0.0,
        unranked: false,
        played_at: test_time(offset_secs)
    }
}

pub fn generate_recent_entry(chart: ChartKey, rating: f64, offset_secs: i64) -> RecentEntry {
    RecentEntry {
        chart,
        rating,
        score: 9_500_000,
        clear_type: ClearType::NormalClear,
        played_at: test_time(offset_secs)
    }
}

/// Plausible records drawn from a seeded generator, so runs are reproducible.
pub fn generate_records(n: usize, seed: u64) -> Vec<PerformanceRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    (0..n)
        .map(|_| {
            let total = rng.random_range(300..=1500);
            let miss = rng.random_range(0..=total / 20);
            let near = rng.random_range(0..=(total - miss) / 10);
            let perfect = total - miss - near;
            let shiny = rng.random_range(0..=perfect);
            test_record(perfect, near, miss, shiny)
        })
        .collect()
}

/// In-memory player account.
pub struct TestPlayer {
    pub player_id: i32,
    stamina: Mutex<i32>,
    rating: Mutex<Option<PlayerRatingState>>
}

impl TestPlayer {
    pub fn new(player_id: i32) -> TestPlayer {
        TestPlayer::with_stamina(player_id, 12)
    }

    pub fn with_stamina(player_id: i32, stamina: i32) -> TestPlayer {
        TestPlayer {
            player_id,
            stamina: Mutex::new(stamina),
            rating: Mutex::new(None)
        }
    }
}

impl PlayerCapability for TestPlayer {
    fn player_id(&self) -> i32 {
        self.player_id
    }

    fn stamina(&self) -> i32 {
        *self.stamina.lock().unwrap()
    }

    fn spend_stamina(&self, amount: i32) -> Result<i32, ProgressionError> {
        let mut stamina = self.stamina.lock().unwrap();
        if *stamina < amount {
            return Err(ProgressionError::StaminaNotEnough);
        }
        *stamina -= amount;
        Ok(*stamina)
    }

    fn rating_state(&self) -> Option<PlayerRatingState> {
        self.rating.lock().unwrap().clone()
    }

    fn update_rating_state(&self, state: PlayerRatingState) {
        *self.rating.lock().unwrap() = Some(state);
    }
}

/// Keeps dispatched tasks instead of running them.
#[derive(Default)]
pub struct RecordingDispatcher {
    tasks: Mutex<Vec<BackgroundTask>>
}

impl RecordingDispatcher {
    pub fn new() -> RecordingDispatcher {
        RecordingDispatcher::default()
    }

    pub fn tasks(&self) -> Vec<BackgroundTask> {
        self.tasks.lock().unwrap().clone()
    }
}

impl TaskDispatcher for RecordingDispatcher {
    fn dispatch(&self, task: BackgroundTask) {
        self.tasks.lock().unwrap().push(task);
    }
}
