use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{chart::ChartKey, clear_type::ClearType, performance::RatedPlay};

/// Raw play history row. `id` identifies the submission so retried writes
/// land once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayLogEntry {
    pub id: Uuid,
    pub player_id: i32,
    pub chart: ChartKey,
    pub score: i32,
    pub shiny_perfect_count: i32,
    pub perfect_count: i32,
    pub near_count: i32,
    pub miss_count: i32,
    pub health: i32,
    pub modifier: i32,
    pub clear_type: ClearType,
    pub rating: f64,
    pub played_at: DateTime<Utc>
}

impl PlayLogEntry {
    pub fn new(id: Uuid, player_id: i32, play: &RatedPlay) -> PlayLogEntry {
        PlayLogEntry {
            id,
            player_id,
            chart: play.chart.clone(),
            score: play.record.score,
            shiny_perfect_count: play.record.shiny_perfect_count,
            perfect_count: play.record.perfect_count,
            near_count: play.record.near_count,
            miss_count: play.record.miss_count,
            health: play.record.health,
            modifier: play.record.modifier,
            clear_type: play.clear_type,
            rating: play.rating,
            played_at: play.played_at
        }
    }
}

/// A player's potential as of one UTC day. Upserted on (player_id, day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub player_id: i32,
    pub day: NaiveDate,
    pub potential: f64
}

impl RatingSnapshot {
    pub fn for_time(player_id: i32, at: DateTime<Utc>, potential: f64) -> RatingSnapshot {
        RatingSnapshot {
            player_id,
            day: at.date_naive(),
            potential
        }
    }
}
