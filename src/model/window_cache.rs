use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, PoisonError}
};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use super::{
    constants::WINDOW_CACHE_PLAYERS,
    recent_window::{PushOutcome, RecentWindow}
};
use crate::{
    config::RecentWindowConfig,
    database::store::StoreTransaction,
    error::StoreError,
    model::structures::recent_slot::RecentEntry
};

/// In-memory mirror of one player's recent window.
///
/// The mirror is loaded from storage on first use and kept across
/// submissions. Other writers (another process on the same database) are
/// detected through the player's rating revision: call
/// [`sync`](Self::sync) with the stored revision once the transaction holds
/// the player lock, and [`mark_committed`](Self::mark_committed) after commit.
/// Pushes are applied to the mirror and written back with
/// [`flush`](Self::flush) inside the same transaction. If that transaction
/// does not commit the caller must [`invalidate`](Self::invalidate).
#[derive(Debug)]
pub struct WindowCache {
    player_id: i32,
    window: Option<RecentWindow>,
    /// Rating revision the mirror matches
    revision: Option<i64>,
    dirty: BTreeSet<u8>,
    /// Stored slots that no longer fit the configured capacity
    removed: BTreeSet<u8>
}

impl WindowCache {
    pub fn new(player_id: i32) -> WindowCache {
        WindowCache {
            player_id,
            window: None,
            revision: None,
            dirty: BTreeSet::new(),
            removed: BTreeSet::new()
        }
    }

    pub fn player_id(&self) -> i32 {
        self.player_id
    }

    pub fn is_loaded(&self) -> bool {
        self.window.is_some()
    }

    pub fn window(&self) -> Option<&RecentWindow> {
        self.window.as_ref()
    }

    /// Drops the mirror if storage moved past the revision it was synced at.
    pub fn sync(&mut self, stored_revision: i64) {
        if self.revision != Some(stored_revision) {
            if self.window.is_some() {
                debug!(
                    "Recent window for player {} is stale ({:?} != {}), reloading",
                    self.player_id, self.revision, stored_revision
                );
            }
            self.invalidate();
        }
        self.revision = Some(stored_revision);
    }

    /// Records the revision just committed together with the mirrored window.
    pub fn mark_committed(&mut self, revision: i64) {
        self.revision = Some(revision);
    }

    /// Returns the mirrored window, reading it through `tx` if it is not loaded.
    pub async fn load<T: StoreTransaction>(
        &mut self,
        tx: &mut T,
        config: &RecentWindowConfig
    ) -> Result<&RecentWindow, StoreError> {
        let window = match self.window.take() {
            Some(window) => window,
            None => {
                let slots = tx.recent_slots().await?;
                debug!("Loaded {} recent slots for player {}", slots.len(), self.player_id);

                let stored: Vec<u8> = slots.iter().map(|s| s.slot_id).collect();
                let window = RecentWindow::from_slots(config, slots);
                self.removed = stored
                    .into_iter()
                    .filter(|id| window.slot(*id).is_none())
                    .collect();
                window
            }
        };

        Ok(self.window.insert(window))
    }

    pub async fn push<T: StoreTransaction>(
        &mut self,
        tx: &mut T,
        config: &RecentWindowConfig,
        entry: RecentEntry,
        protected: bool
    ) -> Result<PushOutcome, StoreError> {
        self.load(tx, config).await?;

        let outcome = match self.window.as_mut() {
            Some(window) => window.push(entry, protected),
            None => return Err(StoreError::Unavailable("recent window not loaded".to_string()))
        };

        if let Some(slot_id) = outcome.slot_id() {
            self.dirty.insert(slot_id);
        }

        Ok(outcome)
    }

    /// Writes every slot changed since the last flush through `tx` and deletes
    /// stored slots the window dropped on load. Returns the number of rows touched.
    pub async fn flush<T: StoreTransaction>(&mut self, tx: &mut T) -> Result<usize, StoreError> {
        let Some(window) = self.window.as_ref() else {
            return Ok(0);
        };

        let mut written = 0;
        for slot_id in &self.removed {
            tx.delete_recent_slot(*slot_id).await?;
            written += 1;
        }
        self.removed.clear();

        for slot_id in &self.dirty {
            if let Some(slot) = window.slot(*slot_id) {
                tx.save_recent_slot(slot).await?;
                written += 1;
            }
        }

        self.dirty.clear();
        Ok(written)
    }

    /// Forgets the mirror; the next use reloads from storage.
    pub fn invalidate(&mut self) {
        if self.window.is_some() {
            debug!("Invalidating recent window cache for player {}", self.player_id);
        }

        self.window = None;
        self.revision = None;
        self.dirty.clear();
        self.removed.clear();
    }
}

/// One [`WindowCache`] per player. Holding the guard returned by
/// [`acquire`](Self::acquire) is the per-player exclusive section: no other
/// submission for that player proceeds until it is dropped.
///
/// Once more than `capacity` players are registered, entries nobody holds or
/// waits for are dropped on the next acquire.
pub struct WindowCaches {
    caches: Mutex<HashMap<i32, Arc<tokio::sync::Mutex<WindowCache>>>>,
    capacity: usize
}

impl Default for WindowCaches {
    fn default() -> Self {
        WindowCaches::with_capacity(WINDOW_CACHE_PLAYERS)
    }
}

impl WindowCaches {
    pub fn new() -> WindowCaches {
        WindowCaches::default()
    }

    pub fn with_capacity(capacity: usize) -> WindowCaches {
        WindowCaches {
            caches: Mutex::new(HashMap::new()),
            capacity
        }
    }

    pub async fn acquire(&self, player_id: i32) -> OwnedMutexGuard<WindowCache> {
        let cache = {
            let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
            if caches.len() >= self.capacity && !caches.contains_key(&player_id) {
                let before = caches.len();
                // The map holds the only reference to an idle entry
                caches.retain(|_, cache| Arc::strong_count(cache) > 1);
                debug!("Dropped {} idle recent window caches", before - caches.len());
            }

            caches
                .entry(player_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(WindowCache::new(player_id))))
                .clone()
        };

        cache.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
