use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{chart::ChartKey, clear_type::ClearType, performance::RatedPlay};

/// One entry of a player's recent window. `slot_id` is the storage key and
/// says nothing about recency; `played_at` does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentSlot {
    pub slot_id: u8,
    pub chart: ChartKey,
    pub rating: f64,
    pub score: i32,
    pub clear_type: ClearType,
    pub played_at: DateTime<Utc>
}

/// A play about to enter the recent window, before a slot is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentEntry {
    pub chart: ChartKey,
    pub rating: f64,
    pub score: i32,
    pub clear_type: ClearType,
    pub played_at: DateTime<Utc>
}

impl RecentEntry {
    pub fn into_slot(self, slot_id: u8) -> RecentSlot {
        RecentSlot {
            slot_id,
            chart: self.chart,
            rating: self.rating,
            score: self.score,
            clear_type: self.clear_type,
            played_at: self.played_at
        }
    }
}

impl From<&RatedPlay> for RecentEntry {
    fn from(play: &RatedPlay) -> Self {
        RecentEntry {
            chart: play.chart.clone(),
            rating: play.rating,
            score: play.record.score,
            clear_type: play.clear_type,
            played_at: play.played_at
        }
    }
}
