use crate::{
    error::{IntegrityFailure, SubmissionError, ValidationFailure},
    model::{
        constants::{MAX_FEVER_LEVEL, NOTES_PER_COMBO_INTERVAL},
        structures::{
            chart::{Chart, ChartKey},
            performance::{PerformanceRecord, ValidatedPlay},
            session::{PlayBonuses, SessionProof}
        }
    }
};

pub fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input))
}

/// Submitted fields concatenated in wire order, followed by the combo
/// interval bonus when the client sent one.
pub fn canonical_string(chart: &ChartKey, record: &PerformanceRecord, proof: &SessionProof) -> String {
    let mut canonical = format!(
        "{}{}{}{}{}{}{}{}{}{}{}{}",
        proof.song_token,
        proof.song_hash,
        chart.song_id,
        chart.difficulty as i32,
        record.score,
        record.shiny_perfect_count,
        record.perfect_count,
        record.near_count,
        record.miss_count,
        record.health,
        record.modifier,
        record.clear_type
    );

    if let Some(bonus) = proof.bonuses.combo_interval {
        canonical.push_str(&bonus.to_string());
    }

    canonical
}

/// `md5(canonical ∥ md5(player_id ∥ song_hash))`, lowercase hex.
pub fn checksum(player_id: i32, chart: &ChartKey, record: &PerformanceRecord, proof: &SessionProof) -> String {
    let player_key = md5_hex(&format!("{}{}", player_id, proof.song_hash));
    md5_hex(&(canonical_string(chart, record, proof) + &player_key))
}

/// Plausibility bounds on character bonus counters.
pub fn check_bonuses(record: &PerformanceRecord, bonuses: &PlayBonuses) -> Result<(), ValidationFailure> {
    if let Some(bonus) = bonuses.combo_interval {
        let max = record.total_notes() as f64 / NOTES_PER_COMBO_INTERVAL;
        if bonus < 0 || bonus as f64 > max {
            return Err(ValidationFailure::ComboIntervalBonusOutOfRange { bonus, max });
        }
    }

    if let Some(bonus) = bonuses.hp_interval {
        if bonus < 0 {
            return Err(ValidationFailure::HpIntervalBonusNegative(bonus));
        }
    }

    if let Some(bonus) = bonuses.fever {
        let max = record.perfect_count as i64 * MAX_FEVER_LEVEL;
        if bonus < 0 || bonus as i64 > max {
            return Err(ValidationFailure::FeverBonusOutOfRange { bonus, max });
        }
    }

    Ok(())
}

/// Verifies a session-bound play. `chart` is the catalog entry, if any;
/// a chart without a known content hash skips the file hash comparison.
pub fn verify(
    player_id: i32,
    play: &ValidatedPlay,
    proof: &SessionProof,
    chart: Option<&Chart>
) -> Result<(), SubmissionError> {
    if let Some(expected) = chart.and_then(|c| c.content_hash.as_deref()) {
        if expected != proof.song_hash {
            return Err(IntegrityFailure::ContentHashMismatch(play.chart.clone()).into());
        }
    }

    check_bonuses(&play.record, &proof.bonuses)?;

    let expected = checksum(player_id, &play.chart, &play.record, proof);
    if expected != proof.submission_hash {
        return Err(IntegrityFailure::ChecksumMismatch.into());
    }

    Ok(())
}
