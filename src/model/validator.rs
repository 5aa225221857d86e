use crate::{
    error::ValidationFailure,
    model::{
        constants::{MAX_BASE_SCORE, SCORE_TOLERANCE},
        structures::{
            chart::ChartKey,
            clear_type::ClearType,
            difficulty::Difficulty,
            performance::{PerformanceRecord, Submission, ValidatedPlay}
        }
    }
};

/// Score a record should have given its judgements:
/// `10M / total × (perfect + near / 2) + shiny`.
pub fn reconstructed_score(record: &PerformanceRecord) -> Option<f64> {
    let total = record.total_notes();
    if total == 0 {
        return None;
    }

    let weighted = record.perfect_count as f64 + record.near_count as f64 / 2.0;
    Some(MAX_BASE_SCORE / total as f64 * weighted + record.shiny_perfect_count as f64)
}

/// Structural and statistical checks on a raw record.
pub fn validate_record(difficulty: i32, record: &PerformanceRecord) -> Result<(Difficulty, ClearType), ValidationFailure> {
    let counts = [
        record.shiny_perfect_count,
        record.perfect_count,
        record.near_count,
        record.miss_count,
        record.score
    ];
    if counts.iter().any(|c| *c < 0) {
        return Err(ValidationFailure::NegativeCount);
    }

    if record.time_played <= 0 {
        return Err(ValidationFailure::NonPositiveTimePlayed(record.time_played));
    }

    let difficulty = Difficulty::try_from(difficulty).map_err(|_| ValidationFailure::InvalidDifficulty(difficulty))?;
    let clear_type =
        ClearType::try_from(record.clear_type).map_err(|_| ValidationFailure::InvalidClearType(record.clear_type))?;

    let expected = reconstructed_score(record).ok_or(ValidationFailure::NoNotes)?;
    if (expected - record.score as f64).abs() >= SCORE_TOLERANCE {
        return Err(ValidationFailure::ScoreMismatch {
            submitted: record.score,
            expected
        });
    }

    Ok((difficulty, clear_type))
}

pub fn validate(submission: &Submission) -> Result<ValidatedPlay, ValidationFailure> {
    let (difficulty, clear_type) = validate_record(submission.difficulty, &submission.record)?;

    Ok(ValidatedPlay {
        chart: ChartKey::new(submission.song_id.clone(), difficulty),
        record: submission.record.clone(),
        clear_type
    })
}
