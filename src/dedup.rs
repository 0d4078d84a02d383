//! Duplicate detection: identifies repeat games across one or many input
//! streams by final-position hash plus a cumulative hash of every position
//! visited, without needing to keep whole games in memory.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// What a [`DuplicateDetector`] remembers about one previously-seen game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
    final_hash: u64,
    cumulative_hash: u64,
    tag_fingerprint: u64,
}

/// Common interface over the base and bounded detectors, so pipeline/output
/// stages can take either without knowing which.
pub trait DuplicateCheck {
    fn check_and_add(&mut self, final_hash: u64, cumulative_hash: u64, tag_fingerprint: u64) -> bool;
    fn unique_count(&self) -> u64;
    fn duplicate_count(&self) -> u64;
}

/// Maps the Zobrist hash of a game's final position to every distinct game
/// seen ending there, keyed further by a cumulative hash of the whole game.
#[derive(Debug, Default)]
pub struct DuplicateDetector {
    buckets: HashMap<u64, Vec<Entry>>,
    unique_count: u64,
    duplicate_count: u64,
}

impl DuplicateDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether a game ending at `final_hash`, having visited the
    /// positions XOR-reduced into `cumulative_hash`, has been seen before.
    /// Inserts it if not. `tag_fingerprint` disambiguates cumulative-hash
    /// collisions further (e.g. a hash of player names); games are
    /// duplicates only if both `final_hash` and `cumulative_hash` match.
    pub fn check_and_add(&mut self, final_hash: u64, cumulative_hash: u64, tag_fingerprint: u64) -> bool {
        let bucket = self.buckets.entry(final_hash).or_default();
        if let Some(existing) = bucket
            .iter()
            .find(|entry| entry.cumulative_hash == cumulative_hash)
        {
            let _ = existing;
            self.duplicate_count += 1;
            return true;
        }
        bucket.push(Entry {
            final_hash,
            cumulative_hash,
            tag_fingerprint,
        });
        self.unique_count += 1;
        false
    }

    #[must_use]
    pub fn unique_count(&self) -> u64 {
        self.unique_count
    }

    #[must_use]
    pub fn duplicate_count(&self) -> u64 {
        self.duplicate_count
    }

    pub fn reset(&mut self) {
        self.buckets.clear();
        self.unique_count = 0;
        self.duplicate_count = 0;
    }

    fn remove_oldest(&mut self, victim: (u64, u64)) {
        let (final_hash, cumulative_hash) = victim;
        if let Some(bucket) = self.buckets.get_mut(&final_hash) {
            bucket.retain(|entry| entry.cumulative_hash != cumulative_hash);
            if bucket.is_empty() {
                self.buckets.remove(&final_hash);
            }
        }
    }
}

impl DuplicateCheck for DuplicateDetector {
    fn check_and_add(&mut self, final_hash: u64, cumulative_hash: u64, tag_fingerprint: u64) -> bool {
        Self::check_and_add(self, final_hash, cumulative_hash, tag_fingerprint)
    }

    fn unique_count(&self) -> u64 {
        Self::unique_count(self)
    }

    fn duplicate_count(&self) -> u64 {
        Self::duplicate_count(self)
    }
}

/// A [`DuplicateDetector`] with an upper bound on remembered games: once
/// `max_capacity` unique entries are stored, the oldest (by insertion
/// order) is evicted to make room for the newest. `max_capacity == 0` means
/// unbounded, matching the base detector.
#[derive(Debug)]
pub struct BoundedDuplicateDetector {
    inner: DuplicateDetector,
    max_capacity: usize,
    insertion_order: VecDeque<(u64, u64)>,
}

impl BoundedDuplicateDetector {
    #[must_use]
    pub fn new(max_capacity: usize) -> Self {
        Self {
            inner: DuplicateDetector::new(),
            max_capacity,
            insertion_order: VecDeque::new(),
        }
    }

    pub fn check_and_add(&mut self, final_hash: u64, cumulative_hash: u64, tag_fingerprint: u64) -> bool {
        let is_duplicate = self
            .inner
            .check_and_add(final_hash, cumulative_hash, tag_fingerprint);
        if is_duplicate {
            return true;
        }
        self.insertion_order.push_back((final_hash, cumulative_hash));
        if self.max_capacity > 0 && self.insertion_order.len() > self.max_capacity {
            if let Some(victim) = self.insertion_order.pop_front() {
                self.inner.remove_oldest(victim);
                self.inner.unique_count = self.inner.unique_count.saturating_sub(1);
            }
        }
        false
    }

    #[must_use]
    pub fn unique_count(&self) -> u64 {
        self.inner.unique_count()
    }

    #[must_use]
    pub fn duplicate_count(&self) -> u64 {
        self.inner.duplicate_count()
    }

    pub fn reset(&mut self) {
        self.inner.reset();
        self.insertion_order.clear();
    }
}

impl DuplicateCheck for BoundedDuplicateDetector {
    fn check_and_add(&mut self, final_hash: u64, cumulative_hash: u64, tag_fingerprint: u64) -> bool {
        Self::check_and_add(self, final_hash, cumulative_hash, tag_fingerprint)
    }

    fn unique_count(&self) -> u64 {
        Self::unique_count(self)
    }

    fn duplicate_count(&self) -> u64 {
        Self::duplicate_count(self)
    }
}

/// A [`DuplicateDetector`] guarded by a read-mostly lock: `check_and_add`
/// briefly takes the write lock; everything else can take the read lock.
/// `unique_count`/`duplicate_count` are snapshots taken under a read lock at
/// call time, not a live streaming view — under concurrent writers, two
/// calls may observe different totals even without an intervening `reset`.
#[derive(Debug, Default)]
pub struct ThreadSafeDuplicateDetector {
    inner: RwLock<DuplicateDetector>,
}

impl ThreadSafeDuplicateDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds this detector from a single-threaded warmup pass over `other`,
    /// e.g. loading a `-c` check file before workers start.
    pub fn load_from_detector(&self, other: &DuplicateDetector) {
        let mut guard = self.inner.write().expect("duplicate detector lock poisoned");
        for (&final_hash, bucket) in &other.buckets {
            for entry in bucket {
                let _ = guard.check_and_add(final_hash, entry.cumulative_hash, entry.tag_fingerprint);
            }
        }
    }

    pub fn check_and_add(&self, final_hash: u64, cumulative_hash: u64, tag_fingerprint: u64) -> bool {
        self.inner
            .write()
            .expect("duplicate detector lock poisoned")
            .check_and_add(final_hash, cumulative_hash, tag_fingerprint)
    }

    #[must_use]
    pub fn unique_count(&self) -> u64 {
        self.inner
            .read()
            .expect("duplicate detector lock poisoned")
            .unique_count()
    }

    #[must_use]
    pub fn duplicate_count(&self) -> u64 {
        self.inner
            .read()
            .expect("duplicate detector lock poisoned")
            .duplicate_count()
    }

    pub fn reset(&self) {
        self.inner
            .write()
            .expect("duplicate detector lock poisoned")
            .reset();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn repeated_game_is_flagged_duplicate() {
        let mut detector = DuplicateDetector::new();
        assert!(!detector.check_and_add(1, 2, 0));
        assert!(detector.check_and_add(1, 2, 0));
        assert_eq!(detector.unique_count(), 1);
        assert_eq!(detector.duplicate_count(), 1);
    }

    #[test]
    fn same_final_hash_different_cumulative_is_unique() {
        let mut detector = DuplicateDetector::new();
        assert!(!detector.check_and_add(1, 2, 0));
        assert!(!detector.check_and_add(1, 3, 0));
        assert_eq!(detector.unique_count(), 2);
    }

    #[test]
    fn repeated_game_is_detected_as_duplicate() {
        let mut detector = DuplicateDetector::new();
        for game in 0..34u64 {
            assert!(!detector.check_and_add(game, game, 0));
        }
        for game in 0..34u64 {
            assert!(detector.check_and_add(game, game, 0));
        }
        assert_eq!(detector.unique_count(), 34);
        assert_eq!(detector.duplicate_count(), 34);
    }

    #[test]
    fn bounded_detector_evicts_oldest() {
        let mut detector = BoundedDuplicateDetector::new(2);
        assert!(!detector.check_and_add(1, 1, 0));
        assert!(!detector.check_and_add(2, 2, 0));
        assert!(!detector.check_and_add(3, 3, 0));
        assert_eq!(detector.unique_count(), 2);
        // Entry (1, 1) was evicted, so it looks unique again.
        assert!(!detector.check_and_add(1, 1, 0));
    }

    #[test]
    fn thread_safe_detector_matches_base_behaviour() {
        let detector = ThreadSafeDuplicateDetector::new();
        assert!(!detector.check_and_add(5, 5, 0));
        assert!(detector.check_and_add(5, 5, 0));
        assert_eq!(detector.unique_count(), 1);
        assert_eq!(detector.duplicate_count(), 1);
    }

    #[test]
    fn load_from_detector_seeds_warmup_state() {
        let mut warmup = DuplicateDetector::new();
        assert!(!warmup.check_and_add(9, 9, 0));

        let concurrent = ThreadSafeDuplicateDetector::new();
        concurrent.load_from_detector(&warmup);
        assert!(concurrent.check_and_add(9, 9, 0));
    }
}
