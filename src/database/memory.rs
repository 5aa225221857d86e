use chrono::NaiveDate;
use indexmap::IndexMap;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError
    }
};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;
use uuid::Uuid;

use super::store::{Store, StoreTransaction};
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

#[derive(Debug, Clone, Default)]
struct PlayerData {
    best: BTreeMap<ChartKey, BestRecord>,
    recent: BTreeMap<u8, RecentSlot>,
    rating: Option<PlayerRatingState>
}

#[derive(Default)]
struct Inner {
    players: Mutex<HashMap<i32, PlayerData>>,
    player_locks: Mutex<HashMap<i32, Arc<tokio::sync::Mutex<()>>>>,
    play_log: Mutex<IndexMap<Uuid, PlayLogEntry>>,
    snapshots: Mutex<BTreeMap<(i32, NaiveDate), RatingSnapshot>>,
    failing_commits: AtomicUsize,
    failing_background_writes: AtomicUsize
}

/// A [`Store`] held entirely in memory. Transactions stage a copy of the
/// player's data and publish it on commit.
///
/// Used by tests and dry runs. Failures can be injected with
/// [`fail_next_commits`](Self::fail_next_commits) and
/// [`fail_next_background_writes`](Self::fail_next_background_writes).
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// The next `n` commits fail with [`StoreError::Unavailable`] and publish nothing.
    pub fn fail_next_commits(&self, n: usize) {
        self.inner.failing_commits.store(n, Ordering::SeqCst);
    }

    /// The next `n` play log or snapshot writes fail.
    pub fn fail_next_background_writes(&self, n: usize) {
        self.inner.failing_background_writes.store(n, Ordering::SeqCst);
    }

    /// Writes a best record directly, outside any transaction.
    pub fn seed_best_record(&self, record: BestRecord) {
        let mut players = lock(&self.inner.players);
        players
            .entry(record.player_id)
            .or_default()
            .best
            .insert(record.chart.clone(), record);
    }

    pub fn best_records(&self, player_id: i32) -> Vec<BestRecord> {
        lock(&self.inner.players)
            .get(&player_id)
            .map(|data| data.best.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Committed recent slots ordered by slot id.
    pub fn recent_slots(&self, player_id: i32) -> Vec<RecentSlot> {
        lock(&self.inner.players)
            .get(&player_id)
            .map(|data| data.recent.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stored_rating(&self, player_id: i32) -> Option<PlayerRatingState> {
        lock(&self.inner.players)
            .get(&player_id)
            .and_then(|data| data.rating.clone())
    }

    /// Play log in insertion order.
    pub fn play_log(&self) -> Vec<PlayLogEntry> {
        lock(&self.inner.play_log).values().cloned().collect()
    }

    pub fn snapshots(&self) -> Vec<RatingSnapshot> {
        lock(&self.inner.snapshots).values().cloned().collect()
    }

    fn player_lock(&self, player_id: i32) -> Arc<tokio::sync::Mutex<()>> {
        lock(&self.inner.player_locks)
            .entry(player_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn background_write(&self) -> Result<(), StoreError> {
        if take_failure(&self.inner.failing_background_writes) {
            return Err(StoreError::Unavailable("injected background write failure".to_string()));
        }
        Ok(())
    }
}

pub struct MemoryTransaction {
    inner: Arc<Inner>,
    player_id: i32,
    staged: PlayerData,
    _guard: OwnedMutexGuard<()>
}

impl Store for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self, player_id: i32) -> Result<MemoryTransaction, StoreError> {
        let guard = self.player_lock(player_id).lock_owned().await;
        let staged = lock(&self.inner.players).get(&player_id).cloned().unwrap_or_default();

        Ok(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            player_id,
            staged,
            _guard: guard
        })
    }

    async fn append_play_log(&self, entry: &PlayLogEntry) -> Result<(), StoreError> {
        self.background_write()?;
        lock(&self.inner.play_log).entry(entry.id).or_insert_with(|| entry.clone());
        Ok(())
    }

    async fn upsert_rating_snapshot(&self, snapshot: &RatingSnapshot) -> Result<(), StoreError> {
        self.background_write()?;
        lock(&self.inner.snapshots).insert((snapshot.player_id, snapshot.day), snapshot.clone());
        Ok(())
    }

    async fn player_ids(&self) -> Result<Vec<i32>, StoreError> {
        let players = lock(&self.inner.players);
        let mut ids: Vec<i32> = players
            .iter()
            .filter(|(_, data)| !data.best.is_empty())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn player_rating(&self, player_id: i32) -> Result<Option<PlayerRatingState>, StoreError> {
        Ok(self.stored_rating(player_id))
    }
}

impl StoreTransaction for MemoryTransaction {
    fn player_id(&self) -> i32 {
        self.player_id
    }

    async fn best_record(&mut self, chart: &ChartKey) -> Result<Option<BestRecord>, StoreError> {
        Ok(self.staged.best.get(chart).cloned())
    }

    async fn save_best_record(&mut self, record: &BestRecord) -> Result<(), StoreError> {
        self.staged.best.insert(record.chart.clone(), record.clone());
        Ok(())
    }

    async fn top_best_ratings(&mut self, limit: usize) -> Result<Vec<f64>, StoreError> {
        let mut ratings: Vec<f64> = self.staged.best.values().map(|r| r.rating).collect();
        ratings.sort_by(|a, b| b.total_cmp(a));
        ratings.truncate(limit);
        Ok(ratings)
    }

    async fn recent_slots(&mut self) -> Result<Vec<RecentSlot>, StoreError> {
        Ok(self.staged.recent.values().cloned().collect())
    }

    async fn save_recent_slot(&mut self, slot: &RecentSlot) -> Result<(), StoreError> {
        self.staged.recent.insert(slot.slot_id, slot.clone());
        Ok(())
    }

    async fn delete_recent_slot(&mut self, slot_id: u8) -> Result<(), StoreError> {
        self.staged.recent.remove(&slot_id);
        Ok(())
    }

    async fn player_rating(&mut self) -> Result<Option<PlayerRatingState>, StoreError> {
        Ok(self.staged.rating.clone())
    }

    async fn save_player_rating(&mut self, state: &PlayerRatingState) -> Result<(), StoreError> {
        self.staged.rating = Some(state.clone());
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        if take_failure(&self.inner.failing_commits) {
            debug!("Injected commit failure for player {}", self.player_id);
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        lock(&self.inner.players).insert(self.player_id, self.staged);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
