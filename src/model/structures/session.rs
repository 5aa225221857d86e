use serde::{Deserialize, Serialize};

use super::{chart::ChartKey, clear_type::ClearType};

/// Bonus counters some characters add to a play. Each is optional and only
/// checked when sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayBonuses {
    #[serde(default)]
    pub combo_interval: Option<i32>,
    #[serde(default)]
    pub hp_interval: Option<i32>,
    #[serde(default)]
    pub fever: Option<i32>
}

/// What a client proves about a play started through a song token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProof {
    pub song_token: String,
    /// Client-side MD5 of the chart file
    pub song_hash: String,
    /// Checksum over the whole submission
    pub submission_hash: String,
    #[serde(flatten)]
    pub bonuses: PlayBonuses
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSession {
    pub stamina_multiply: i32,
    pub fragment_multiply: i32,
    pub prog_boost_multiply: i32,
    pub beyond_boost_gauge_usage: i32,
    #[serde(default)]
    pub skill_flags: Vec<String>,
    /// 1: invasion start, 2: invasion hard
    #[serde(default)]
    pub invasion: Option<u8>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSession {
    pub course_id: String,
    pub state: i32,
    pub score: i64,
    pub clear_type: ClearType
}

/// The kind of session a token was issued for, resolved once per submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionKind {
    Plain,
    World(WorldSession),
    Course(CourseSession)
}

impl SessionKind {
    pub fn name(&self) -> &'static str {
        match self {
            SessionKind::Plain => "plain",
            SessionKind::World(_) => "world",
            SessionKind::Course(_) => "course"
        }
    }
}

/// A live song token as known by the session service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBinding {
    pub chart: ChartKey,
    pub kind: SessionKind
}
