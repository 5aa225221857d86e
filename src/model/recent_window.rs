use indexmap::IndexMap;
use itertools::Itertools;
use tracing::warn;

use crate::{
    config::RecentWindowConfig,
    model::structures::{
        chart::ChartKey,
        recent_slot::{RecentEntry, RecentSlot}
    }
};

#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// The window had room; a fresh slot id was allocated
    Inserted { slot_id: u8 },
    /// An existing slot was overwritten in place
    Replaced { slot_id: u8, evicted: RecentSlot },
    /// A protected entry found nothing it may displace; the window is unchanged
    Dropped
}

impl PushOutcome {
    pub fn slot_id(&self) -> Option<u8> {
        match self {
            PushOutcome::Inserted { slot_id } | PushOutcome::Replaced { slot_id, .. } => Some(*slot_id),
            PushOutcome::Dropped => None
        }
    }
}

/// A player's bounded window of recent plays.
///
/// Slots are kept most-recent-first. Once the window is full every push
/// replaces a slot chosen so that:
/// - a protected entry never displaces a higher rating, and
/// - while fewer than `diversity_floor` charts are represented, the only slot
///   of a chart is never evicted (unless it is the entry's own chart).
#[derive(Debug, Clone, PartialEq)]
pub struct RecentWindow {
    slots: Vec<RecentSlot>,
    capacity: usize,
    diversity_floor: usize
}

impl RecentWindow {
    pub fn new(config: &RecentWindowConfig) -> RecentWindow {
        RecentWindow {
            slots: Vec::with_capacity(config.capacity),
            capacity: config.capacity,
            diversity_floor: config.diversity_floor
        }
    }

    /// Rebuilds a window from stored slots in any order. Recency is taken
    /// from `played_at`; equal timestamps keep their given order.
    pub fn from_slots(config: &RecentWindowConfig, mut slots: Vec<RecentSlot>) -> RecentWindow {
        slots.sort_by(|a, b| b.played_at.cmp(&a.played_at));

        if slots.len() > config.capacity {
            warn!(
                "Stored recent window has {} slots but capacity is {}, ignoring the oldest",
                slots.len(),
                config.capacity
            );
            slots.truncate(config.capacity);
        }

        RecentWindow {
            slots,
            capacity: config.capacity,
            diversity_floor: config.diversity_floor
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots, most recent first.
    pub fn slots(&self) -> &[RecentSlot] {
        &self.slots
    }

    pub fn slot(&self, slot_id: u8) -> Option<&RecentSlot> {
        self.slots.iter().find(|s| s.slot_id == slot_id)
    }

    pub fn unique_charts(&self) -> usize {
        self.slots.iter().map(|s| &s.chart).unique().count()
    }

    pub fn push(&mut self, entry: RecentEntry, protected: bool) -> PushOutcome {
        if self.slots.len() < self.capacity {
            let slot_id = self.free_slot_id();
            self.slots.insert(0, entry.into_slot(slot_id));
            return PushOutcome::Inserted { slot_id };
        }

        match self.eviction_index(&entry, protected) {
            Some(index) => {
                let evicted = self.slots.remove(index);
                let slot_id = evicted.slot_id;
                self.slots.insert(0, entry.into_slot(slot_id));

                PushOutcome::Replaced { slot_id, evicted }
            }
            None => PushOutcome::Dropped
        }
    }

    /// Highest rating per distinct chart, in descending order.
    pub fn best_per_chart(&self) -> Vec<f64> {
        let mut best: IndexMap<&ChartKey, f64> = IndexMap::new();
        for slot in &self.slots {
            best.entry(&slot.chart)
                .and_modify(|r| *r = r.max(slot.rating))
                .or_insert(slot.rating);
        }

        best.into_values().sorted_by(|a, b| b.total_cmp(a)).collect()
    }

    fn free_slot_id(&self) -> u8 {
        (0..self.capacity)
            .map(|id| id as u8)
            .find(|id| self.slots.iter().all(|s| s.slot_id != *id))
            .unwrap_or(self.slots.len() as u8)
    }

    /// Index of the slot a full window gives up for `entry`, if any.
    fn eviction_index(&self, entry: &RecentEntry, protected: bool) -> Option<usize> {
        // Chart -> slot indices, most recent first within each group
        let mut groups: IndexMap<&ChartKey, Vec<usize>> = IndexMap::new();
        for (i, slot) in self.slots.iter().enumerate() {
            groups.entry(&slot.chart).or_default().push(i);
        }

        let unique = groups.len();
        let is_new_chart = !groups.contains_key(&entry.chart);
        let diverse_enough =
            unique > self.diversity_floor || (unique == self.diversity_floor && is_new_chart);

        let candidates: Vec<usize> = if diverse_enough {
            (0..self.slots.len()).collect()
        } else {
            // Duplicated charts, plus the entry's own chart: replacing its only
            // slot keeps the chart represented.
            groups
                .iter()
                .filter(|(chart, indices)| indices.len() > 1 || **chart == &entry.chart)
                .flat_map(|(_, indices)| indices.iter().copied())
                .sorted()
                .collect()
        };

        if protected {
            // Lowest rating not above the entry's; on ties the oldest (largest index)
            candidates
                .into_iter()
                .filter(|i| self.slots[*i].rating <= entry.rating)
                .min_by(|a, b| {
                    self.slots[*a]
                        .rating
                        .total_cmp(&self.slots[*b].rating)
                        .then(b.cmp(a))
                })
        } else {
            let oldest = candidates.into_iter().max();
            if oldest.is_none() {
                warn!(
                    "No evictable slot for {} with {} charts in a full window, dropping entry",
                    entry.chart, unique
                );
            }
            oldest
        }
    }
}
