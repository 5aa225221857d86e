use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRatingState {
    pub player_id: i32,
    pub potential: f64,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every save. A window mirror synced at an older revision is stale.
    #[serde(default)]
    pub revision: i64
}

impl PlayerRatingState {
    /// Potential as clients display it: hundredths, truncated.
    pub fn rating_ptt(&self) -> i32 {
        rating_ptt(self.potential)
    }
}

pub fn rating_ptt(potential: f64) -> i32 {
    (potential * 100.0).floor() as i32
}
