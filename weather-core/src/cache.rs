//! Bounded most-recently-used list of looked-up locations.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::model::{CurrentSnapshot, RecentLocationEntry, location_key};

pub const DEFAULT_RECENT_CAPACITY: usize = 2;

#[derive(Debug, Clone)]
pub struct RecentLocationCache {
    capacity: usize,
    // Front is most recently used.
    entries: VecDeque<RecentLocationEntry>,
}

impl Default for RecentLocationCache {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_CAPACITY)
    }
}

impl RecentLocationCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    /// Move `label` to the most-recently-used slot, inserting it if absent.
    ///
    /// Returns the label evicted to stay within capacity, if any. A promoted
    /// entry keeps its last snapshot; the stored label takes the new spelling.
    pub fn touch(&mut self, label: &str) -> Option<String> {
        match self.position(label) {
            Some(0) => {
                self.entries[0].location_label = label.to_string();
                None
            }
            Some(idx) => {
                if let Some(mut entry) = self.entries.remove(idx) {
                    entry.location_label = label.to_string();
                    self.entries.push_front(entry);
                }
                None
            }
            None => {
                self.entries.push_front(RecentLocationEntry::new(label));
                if self.entries.len() > self.capacity {
                    self.entries.pop_back().map(|e| e.location_label)
                } else {
                    None
                }
            }
        }
    }

    /// Replace the stored snapshot for `label`.
    ///
    /// Returns `false` without changing anything when the location is no
    /// longer cached, so a late fetch cannot resurrect an evicted entry.
    pub fn update_snapshot(&mut self, label: &str, snapshot: CurrentSnapshot) -> bool {
        self.update_snapshot_at(label, snapshot, Utc::now())
    }

    pub fn update_snapshot_at(
        &mut self,
        label: &str,
        snapshot: CurrentSnapshot,
        refreshed_at: DateTime<Utc>,
    ) -> bool {
        let Some(idx) = self.position(label) else {
            return false;
        };

        let entry = &mut self.entries[idx];
        entry.last_snapshot = Some(snapshot);
        entry.last_refreshed = Some(refreshed_at);
        true
    }

    /// Entries in most-recently-used order.
    pub fn snapshot_all(&self) -> Vec<RecentLocationEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.location_label.clone()).collect()
    }

    fn position(&self, label: &str) -> Option<usize> {
        let key = location_key(label);
        self.entries
            .iter()
            .position(|e| location_key(&e.location_label) == key)
    }
}
