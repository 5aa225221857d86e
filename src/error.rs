use strum_macros::IntoStaticStr;
use thiserror::Error;

use crate::model::structures::chart::ChartKey;

/// Why a record was rejected as implausible. Terminal, never retried.
#[derive(Error, Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ValidationFailure {
    #[error("Judgement counts and score must not be negative")]
    NegativeCount,

    #[error("time_played must be positive, got {0}")]
    NonPositiveTimePlayed(i64),

    #[error("Unknown difficulty {0}")]
    InvalidDifficulty(i32),

    #[error("Unknown clear type {0}")]
    InvalidClearType(i32),

    #[error("Record contains no judged notes")]
    NoNotes,

    #[error("Score {submitted} does not match its judgements (expected {expected:.1})")]
    ScoreMismatch { submitted: i32, expected: f64 },

    #[error("Combo interval bonus {bonus} outside [0, {max:.2}]")]
    ComboIntervalBonusOutOfRange { bonus: i32, max: f64 },

    #[error("Hp interval bonus {0} is negative")]
    HpIntervalBonusNegative(i32),

    #[error("Fever bonus {bonus} outside [0, {max}]")]
    FeverBonusOutOfRange { bonus: i32, max: i64 },

    #[error("Chart {0} is not in the catalog")]
    UnknownChart(ChartKey)
}

impl ValidationFailure {
    pub fn reason_code(&self) -> &'static str {
        self.into()
    }
}

/// The submission does not match what the session and chart say it should.
/// Treated as tampering.
#[derive(Error, Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum IntegrityFailure {
    #[error("Submission checksum mismatch")]
    ChecksumMismatch,

    #[error("Chart file hash mismatch for {0}")]
    ContentHashMismatch(ChartKey),

    #[error("Session was issued for {bound} but the play is for {submitted}")]
    SessionChartMismatch { bound: ChartKey, submitted: ChartKey }
}

impl IntegrityFailure {
    pub fn reason_code(&self) -> &'static str {
        self.into()
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String)
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Session service error: {0}")]
pub struct SessionError(pub String);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgressionError {
    #[error("Stamina is not enough")]
    StaminaNotEnough,

    #[error("Progression update failed: {0}")]
    Failed(String)
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Invalid score: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("Integrity check failed: {0}")]
    Integrity(#[from] IntegrityFailure),

    #[error("Storage failure: {0}")]
    Resource(#[from] StoreError),

    #[error("{0}")]
    Session(#[from] SessionError),

    /// Raised after the rating aggregates were committed.
    #[error("{0}")]
    Progression(#[from] ProgressionError)
}

impl SubmissionError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            SubmissionError::Validation(failure) => failure.reason_code(),
            SubmissionError::Integrity(failure) => failure.reason_code(),
            SubmissionError::Resource(_) => "storage_unavailable",
            SubmissionError::Session(_) => "session_unavailable",
            SubmissionError::Progression(ProgressionError::StaminaNotEnough) => "stamina_not_enough",
            SubmissionError::Progression(_) => "progression_failed"
        }
    }

    /// Whether a client may resubmit the same play.
    pub fn is_transient(&self) -> bool {
        matches!(self, SubmissionError::Resource(_) | SubmissionError::Session(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String)
}

/// A configuration that is accepted but will not behave the way it reads.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationAnomaly {
    #[error("recent term sums {amount} ratings but the window only holds {capacity} charts")]
    RecentAmountExceedsWindow { amount: usize, capacity: usize },

    #[error("potential formula is empty, every player will have potential 0")]
    EmptyFormula
}
