use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{chart::ChartKey, clear_type::ClearType, session::SessionProof};

/// One play attempt exactly as submitted. Values are signed so that
/// negative counts can be rejected instead of wrapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub score: i32,
    pub shiny_perfect_count: i32,
    pub perfect_count: i32,
    pub near_count: i32,
    pub miss_count: i32,
    /// `-1` marks a protected play
    pub health: i32,
    pub modifier: i32,
    /// Client wall clock, unix seconds
    pub time_played: i64,
    pub clear_type: i32
}

impl PerformanceRecord {
    /// Judged notes; shiny perfects are a subset of perfects.
    pub fn total_notes(&self) -> i64 {
        self.perfect_count as i64 + self.near_count as i64 + self.miss_count as i64
    }
}

/// The payload a client posts after finishing a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub song_id: String,
    pub difficulty: i32,
    #[serde(flatten)]
    pub record: PerformanceRecord,
    /// Present for plays started through a song token
    #[serde(default)]
    pub session: Option<SessionProof>
}

/// A record that passed validation, with its chart and clear type resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlay {
    pub chart: ChartKey,
    pub record: PerformanceRecord,
    pub clear_type: ClearType
}

/// A validated play with its derived values and server timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatedPlay {
    pub chart: ChartKey,
    pub record: PerformanceRecord,
    pub clear_type: ClearType,
    /// Zero for unranked charts
    pub rating: f64,
    pub score_v2: f64,
    pub unranked: bool,
    pub played_at: DateTime<Utc>
}

impl RatedPlay {
    pub fn score(&self) -> i32 {
        self.record.score
    }
}
