//! # Telemetry Store
//!
//! Fixed-capacity circular buffer of [`TelemetryRecord`]s.
//!
//! This module handles:
//! - Preallocated slot array with head/tail cursors (no allocation after construction)
//! - FIFO eviction of the oldest record when full
//! - Quantizing elapsed time into 10-second interval ticks
//! - Synthetic gap records when the elapsed time exceeds the interval ceiling
//! - Non-mutating backlog views and committed drains for the uplink

pub mod record;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

pub use record::{TelemetryRecord, RECORD_SIZE};

use crate::config::TICK_SECONDS;
use record::INTERVAL_FIELD_MAX;

/// Ring buffer of telemetry records with capacity `N`
#[derive(Debug, Clone)]
pub struct TelemetryStore<const N: usize> {
    slots: [TelemetryRecord; N],
    /// Slot of the oldest record
    tail: usize,
    count: usize,
    max_interval: u8,
    next_sequence: u16,
    /// Timestamp and content of the last real fix pushed
    last: Option<(DateTime<Utc>, TelemetryRecord)>,
    evicted: u64,
}

impl<const N: usize> TelemetryStore<N> {
    const NONZERO_CAPACITY: () = assert!(N > 0, "telemetry store capacity must be non-zero");

    /// Create an empty store
    ///
    /// # Arguments
    ///
    /// * `max_interval` - Interval ceiling in ticks, clamped to `1..=31`
    pub fn new(max_interval: u8) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NONZERO_CAPACITY;

        Self {
            slots: [TelemetryRecord::default(); N],
            tail: 0,
            count: 0,
            max_interval: max_interval.clamp(1, INTERVAL_FIELD_MAX),
            next_sequence: 0,
            last: None,
            evicted: 0,
        }
    }

    /// Push a fix observed at `at`
    ///
    /// The store owns the `interval`, `gap` and `sequence` fields of the record
    /// and overwrites whatever the caller put there. If more than
    /// `max_interval` ticks elapsed since the previous push, gap records
    /// carrying the previous position are inserted first so that the intervals
    /// add up to the full elapsed time; the new record then has interval 0.
    ///
    /// Never fails: a full store evicts its oldest record.
    pub fn push(&mut self, mut record: TelemetryRecord, at: DateTime<Utc>) {
        let ticks = match &self.last {
            // Clock going backwards counts as no elapsed time
            Some((prev, _)) => (at - *prev).num_seconds().max(0) / TICK_SECONDS,
            None => 0,
        };

        record.interval = if ticks > self.max_interval as i64 {
            self.fill_gap(ticks);
            0
        } else {
            ticks as u8
        };
        record.gap = false;

        self.last = Some((at, record));
        self.insert(record);
    }

    /// Insert gap records covering exactly `ticks` intervals
    fn fill_gap(&mut self, ticks: i64) {
        let Some((_, template)) = self.last else {
            return;
        };

        let max = self.max_interval as i64;
        let gaps = (ticks + max - 1) / max;
        // Gap records beyond what the store can hold alongside the new fix
        // would be evicted straight away
        let skipped = (gaps - (N as i64 - 1)).max(0);

        if skipped > 0 {
            self.next_sequence = self.next_sequence.wrapping_add((skipped % 0x1_0000) as u16);
            self.evicted += skipped as u64;
        }

        debug!("Elapsed {} ticks exceeds ceiling {}, inserting {} gap records ({} skipped)",
            ticks, max, gaps - skipped, skipped);

        for i in skipped..gaps {
            let interval = if i == gaps - 1 { ticks - (gaps - 1) * max } else { max };
            self.insert(TelemetryRecord {
                interval: interval as u8,
                gap: true,
                ..template
            });
        }
    }

    /// Append at head, evicting the tail if full, and assign a sequence number
    fn insert(&mut self, mut record: TelemetryRecord) {
        record.sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        if self.count == N {
            trace!("Store full, evicting record seq {}", self.slots[self.tail].sequence);
            self.tail = (self.tail + 1) % N;
            self.count -= 1;
            self.evicted += 1;
        }

        let head = (self.tail + self.count) % N;
        self.slots[head] = record;
        self.count += 1;
    }

    /// Oldest-first view of up to `max_entries` records, without mutating the store
    pub fn peek_backlog(&self, max_entries: usize) -> Backlog<'_> {
        let len = max_entries.min(self.count);
        let first_len = len.min(N - self.tail);

        Backlog {
            front: &self.slots[self.tail..self.tail + first_len],
            back: &self.slots[..len - first_len],
        }
    }

    /// Remove the `n` oldest records, clamped to the current depth
    ///
    /// # Returns
    ///
    /// * `usize` - Number of records actually removed
    pub fn commit_drain(&mut self, n: usize) -> usize {
        let removed = n.min(self.count);
        self.tail = (self.tail + removed) % N;
        self.count -= removed;
        removed
    }

    /// Number of buffered records
    pub fn depth(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Record at `index` counted from the oldest
    pub fn get(&self, index: usize) -> Option<&TelemetryRecord> {
        (index < self.count).then(|| &self.slots[(self.tail + index) % N])
    }

    /// Iterate over all buffered records, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.peek_backlog(self.count).into_iter()
    }

    /// Total records dropped by overflow since creation
    pub fn evicted_count(&self) -> u64 {
        self.evicted
    }

    /// Interval ceiling in ticks
    pub fn max_interval(&self) -> u8 {
        self.max_interval
    }

    /// Timestamp of the last real fix pushed
    pub fn last_fix_time(&self) -> Option<DateTime<Utc>> {
        self.last.map(|(at, _)| at)
    }

    /// Drop all buffered records
    ///
    /// The timeline reference and sequence counter are kept so the next push
    /// still reports the time elapsed since the last fix.
    pub fn clear(&mut self) {
        self.tail = 0;
        self.count = 0;
    }
}

/// Borrowed, ordered slice pair over the oldest records of a store
#[derive(Debug, Clone, Copy)]
pub struct Backlog<'a> {
    front: &'a [TelemetryRecord],
    back: &'a [TelemetryRecord],
}

impl<'a> Backlog<'a> {
    pub fn len(&self) -> usize {
        self.front.len() + self.back.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a TelemetryRecord> + 'a {
        let (front, back) = (self.front, self.back);
        front.iter().chain(back.iter())
    }

    pub fn to_vec(&self) -> Vec<TelemetryRecord> {
        self.iter().copied().collect()
    }
}

impl<'a> IntoIterator for Backlog<'a> {
    type Item = &'a TelemetryRecord;
    type IntoIter = std::iter::Chain<std::slice::Iter<'a, TelemetryRecord>, std::slice::Iter<'a, TelemetryRecord>>;

    fn into_iter(self) -> Self::IntoIter {
        self.front.iter().chain(self.back.iter())
    }
}
