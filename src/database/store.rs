use std::future::Future;

use crate::{
    error::StoreError,
    model::structures::{
        best_record::BestRecord,
        chart::ChartKey,
        play_log::{PlayLogEntry, RatingSnapshot},
        player_rating::PlayerRatingState,
        recent_slot::RecentSlot
    }
};

/// Persistence for the rating aggregates.
///
/// Everything that must change atomically for one submission goes through a
/// [`StoreTransaction`]. The play log and rating snapshots are written outside
/// of it and must be idempotent.
pub trait Store: Send + Sync + 'static {
    type Transaction: StoreTransaction;

    /// Opens a transaction scoped to one player. Concurrent transactions for the
    /// same player wait for each other.
    fn begin(&self, player_id: i32) -> impl Future<Output = Result<Self::Transaction, StoreError>> + Send;

    /// Appends to the play log. A repeated `id` is ignored.
    fn append_play_log(&self, entry: &PlayLogEntry) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Inserts or overwrites the snapshot for `(player_id, day)`.
    fn upsert_rating_snapshot(&self, snapshot: &RatingSnapshot)
        -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Players holding at least one best record, ascending.
    fn player_ids(&self) -> impl Future<Output = Result<Vec<i32>, StoreError>> + Send;

    fn player_rating(&self, player_id: i32)
        -> impl Future<Output = Result<Option<PlayerRatingState>, StoreError>> + Send;
}

/// An open per-player transaction. Dropping it without [`commit`](Self::commit)
/// discards every write.
pub trait StoreTransaction: Send + 'static {
    fn player_id(&self) -> i32;

    fn best_record(&mut self, chart: &ChartKey)
        -> impl Future<Output = Result<Option<BestRecord>, StoreError>> + Send;

    fn save_best_record(&mut self, record: &BestRecord) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Best ratings of this player, highest first, at most `limit` of them.
    fn top_best_ratings(&mut self, limit: usize) -> impl Future<Output = Result<Vec<f64>, StoreError>> + Send;

    /// Stored recent slots in storage order.
    fn recent_slots(&mut self) -> impl Future<Output = Result<Vec<RecentSlot>, StoreError>> + Send;

    /// Writes a slot keyed by `(player_id, slot_id)`, replacing what was there.
    fn save_recent_slot(&mut self, slot: &RecentSlot) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_recent_slot(&mut self, slot_id: u8) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn player_rating(&mut self) -> impl Future<Output = Result<Option<PlayerRatingState>, StoreError>> + Send;

    fn save_player_rating(&mut self, state: &PlayerRatingState)
        -> impl Future<Output = Result<(), StoreError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
