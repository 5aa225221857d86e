use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{chart::ChartKey, clear_type::ClearType, performance::RatedPlay};

/// The best play a player has recorded on one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestRecord {
    pub player_id: i32,
    pub chart: ChartKey,
    pub score: i32,
    pub shiny_perfect_count: i32,
    pub perfect_count: i32,
    pub near_count: i32,
    pub miss_count: i32,
    pub health: i32,
    pub modifier: i32,
    pub time_played: DateTime<Utc>,
    /// Clear type of the play holding `score`
    pub clear_type: ClearType,
    /// Best clear ever achieved, may come from a lower-scoring play
    pub best_clear_type: ClearType,
    pub rating: f64,
    pub score_v2: f64
}

impl BestRecord {
    pub fn from_play(player_id: i32, play: &RatedPlay) -> BestRecord {
        BestRecord {
            player_id,
            chart: play.chart.clone(),
            score: play.record.score,
            shiny_perfect_count: play.record.shiny_perfect_count,
            perfect_count: play.record.perfect_count,
            near_count: play.record.near_count,
            miss_count: play.record.miss_count,
            health: play.record.health,
            modifier: play.record.modifier,
            time_played: play.played_at,
            clear_type: play.clear_type,
            best_clear_type: play.clear_type,
            rating: play.rating,
            score_v2: play.score_v2
        }
    }
}
