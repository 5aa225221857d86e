use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use super::difficulty::Difficulty;

/// A song + difficulty pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChartKey {
    pub song_id: String,
    pub difficulty: Difficulty
}

impl ChartKey {
    pub fn new(song_id: impl Into<String>, difficulty: Difficulty) -> ChartKey {
        ChartKey {
            song_id: song_id.into(),
            difficulty
        }
    }
}

impl Display for ChartKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.song_id, self.difficulty as u8)
    }
}

/// Reference data for a chart, loaded outside the rating engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    #[serde(flatten)]
    pub key: ChartKey,
    /// Difficulty constant. Absent or non-positive means the chart is unranked.
    #[serde(default)]
    pub chart_const: Option<f64>,
    /// MD5 of the chart file, when the server has it
    #[serde(default)]
    pub content_hash: Option<String>
}

impl Chart {
    pub fn is_ranked(&self) -> bool {
        matches!(self.chart_const, Some(c) if c > 0.0)
    }
}
