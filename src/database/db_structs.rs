use tokio_postgres::Row;

use crate::{
    error::StoreError,
    model::structures::{
        best_record::BestRecord, chart::ChartKey, clear_type::ClearType, difficulty::Difficulty,
        player_rating::PlayerRatingState, recent_slot::RecentSlot
    }
};

fn chart_from_row(row: &Row) -> Result<ChartKey, StoreError> {
    let raw = row.try_get::<_, i32>("difficulty")?;
    let difficulty =
        Difficulty::try_from(raw).map_err(|_| StoreError::Corrupt(format!("unknown difficulty {}", raw)))?;

    Ok(ChartKey::new(row.try_get::<_, String>("song_id")?, difficulty))
}

fn clear_type_from_row(row: &Row, column: &str) -> Result<ClearType, StoreError> {
    let raw = row.try_get::<_, i32>(column)?;
    ClearType::try_from(raw).map_err(|_| StoreError::Corrupt(format!("unknown {} {}", column, raw)))
}

pub fn best_record_from_row(row: &Row) -> Result<BestRecord, StoreError> {
    Ok(BestRecord {
        player_id: row.try_get("player_id")?,
        chart: chart_from_row(row)?,
        score: row.try_get("score")?,
        shiny_perfect_count: row.try_get("shiny_perfect_count")?,
        perfect_count: row.try_get("perfect_count")?,
        near_count: row.try_get("near_count")?,
        miss_count: row.try_get("miss_count")?,
        health: row.try_get("health")?,
        modifier: row.try_get("modifier")?,
        time_played: row.try_get("time_played")?,
        clear_type: clear_type_from_row(row, "clear_type")?,
        best_clear_type: clear_type_from_row(row, "best_clear_type")?,
        rating: row.try_get("rating")?,
        score_v2: row.try_get("score_v2")?
    })
}

pub fn recent_slot_from_row(row: &Row) -> Result<RecentSlot, StoreError> {
    let slot_id = row.try_get::<_, i32>("slot_id")?;

    Ok(RecentSlot {
        slot_id: u8::try_from(slot_id).map_err(|_| StoreError::Corrupt(format!("slot id {} out of range", slot_id)))?,
        chart: chart_from_row(row)?,
        rating: row.try_get("rating")?,
        score: row.try_get("score")?,
        clear_type: clear_type_from_row(row, "clear_type")?,
        played_at: row.try_get("played_at")?
    })
}

pub fn player_rating_from_row(row: &Row) -> Result<PlayerRatingState, StoreError> {
    Ok(PlayerRatingState {
        player_id: row.try_get("player_id")?,
        potential: row.try_get("potential")?,
        updated_at: row.try_get("updated_at")?,
        revision: row.try_get("revision")?
    })
}
