use tracing::debug;

use crate::{
    database::store::StoreTransaction,
    error::StoreError,
    model::{
        constants::{EX_SCORE, PROTECTED_HEALTH},
        structures::{best_record::BestRecord, performance::RatedPlay}
    }
};

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The stored aggregate after the merge
    pub record: BestRecord,
    /// No record existed for this chart before
    pub first_play: bool,
    /// The play's score replaced (or tied) the stored best. Always true on a
    /// first play. Grants protection in the recent window.
    pub is_new_best: bool,
    pub clear_improved: bool,
    /// The stored row differs from what was there before
    pub changed: bool
}

/// Folds a play into a player's best record for its chart.
///
/// Score, judgements and rating move together and only when the new score is
/// at least the stored one. `best_clear_type` is tracked on its own and can
/// advance from a lower-scoring play.
pub fn merge(player_id: i32, existing: Option<&BestRecord>, play: &RatedPlay) -> MergeOutcome {
    let existing = match existing {
        None => {
            return MergeOutcome {
                record: BestRecord::from_play(player_id, play),
                first_play: true,
                is_new_best: true,
                clear_improved: true,
                changed: true
            }
        }
        Some(existing) => existing
    };

    let best_clear_type = existing.best_clear_type.best_of(play.clear_type);
    let clear_improved = best_clear_type != existing.best_clear_type;
    let is_new_best = play.score() >= existing.score;

    let record = if is_new_best {
        BestRecord {
            best_clear_type,
            ..BestRecord::from_play(player_id, play)
        }
    } else {
        debug!(
            "Play on {} scored {} under best {}, keeping stored record",
            play.chart,
            play.score(),
            existing.score
        );

        BestRecord {
            best_clear_type,
            ..existing.clone()
        }
    };

    MergeOutcome {
        changed: record != *existing,
        record,
        first_play: false,
        is_new_best,
        clear_improved
    }
}

/// A protected play may only push lower or equal ratings out of the recent window.
pub fn is_protected(play: &RatedPlay, is_new_best: bool) -> bool {
    play.record.health == PROTECTED_HEALTH || play.score() >= EX_SCORE || is_new_best
}

/// Reads and writes best records through a store transaction.
pub struct BestScoreStore;

impl BestScoreStore {
    pub async fn merge<T: StoreTransaction>(
        tx: &mut T,
        player_id: i32,
        play: &RatedPlay
    ) -> Result<MergeOutcome, StoreError> {
        let existing = tx.best_record(&play.chart).await?;
        let outcome = merge(player_id, existing.as_ref(), play);

        if outcome.changed {
            tx.save_best_record(&outcome.record).await?;
        }

        Ok(outcome)
    }
}
