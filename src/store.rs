//! Stores of previously admitted fingerprints.
//!
//! Admission is a single step under the store's lock: find the nearest stored
//! fingerprint within the threshold, and insert the new one only if there is
//! none. Two workers holding near-identical articles therefore cannot both
//! admit theirs as unique.
//!
//! [`LinearStore`] scans every entry and is the reference behavior.
//! [`BandedStore`] answers the same queries through a band index and only
//! verifies the candidates it turns up.

use crate::fingerprint::Fingerprint;
use itertools::Itertools;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

/// Identifier of the work item a fingerprint belongs to.
pub type ItemId = u64;

/// A stored fingerprint close enough to a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Match {
    pub id: ItemId,
    pub fingerprint: Fingerprint,
    pub distance: u32,
}

/// Outcome of [`FingerprintStore::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Stored; nothing within the threshold.
    Unique,
    /// Not stored; `Match` is the closest earlier fingerprint.
    Duplicate(Match),
    /// Zero fingerprint; neither compared nor stored.
    Uninformative,
}

pub trait FingerprintStore {
    /// Closest stored fingerprint within `threshold` bits, skipping `exclude`.
    /// Ties on distance go to the lowest id.
    fn find_near(&self, fp: Fingerprint, threshold: u32, exclude: Option<ItemId>) -> Option<Match>;

    /// Atomic check-then-insert.
    fn admit(&self, id: ItemId, fp: Fingerprint, threshold: u32) -> Admission;

    fn remove(&self, id: ItemId) -> Option<Fingerprint>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn closest<I>(candidates: I, fp: Fingerprint, threshold: u32, exclude: Option<ItemId>) -> Option<Match>
where
    I: IntoIterator<Item = (ItemId, Fingerprint)>,
{
    candidates
        .into_iter()
        .filter(|(id, stored)| Some(*id) != exclude && stored.is_informative())
        .map(|(id, stored)| Match {
            id,
            fingerprint: stored,
            distance: fp.distance(stored),
        })
        .filter(|m| m.distance <= threshold)
        .min_by_key(|m| (m.distance, m.id))
}

/// Exact XOR + popcount over every stored fingerprint.
#[derive(Debug, Default)]
pub struct LinearStore {
    entries: Mutex<BTreeMap<ItemId, Fingerprint>>,
}

impl LinearStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FingerprintStore for LinearStore {
    fn find_near(&self, fp: Fingerprint, threshold: u32, exclude: Option<ItemId>) -> Option<Match> {
        if !fp.is_informative() {
            return None;
        }
        let entries = lock(&self.entries);
        closest(entries.iter().map(|(id, f)| (*id, *f)), fp, threshold, exclude)
    }

    #[instrument(level = "debug", skip(self, fp), fields(fp = %fp))]
    fn admit(&self, id: ItemId, fp: Fingerprint, threshold: u32) -> Admission {
        if !fp.is_informative() {
            return Admission::Uninformative;
        }
        let mut entries = lock(&self.entries);
        match closest(entries.iter().map(|(i, f)| (*i, *f)), fp, threshold, Some(id)) {
            Some(m) => {
                debug!(id, duplicate_of = m.id, distance = m.distance, "Rejected near-duplicate");
                Admission::Duplicate(m)
            }
            None => {
                entries.insert(id, fp);
                Admission::Unique
            }
        }
    }

    fn remove(&self, id: ItemId) -> Option<Fingerprint> {
        lock(&self.entries).remove(&id)
    }

    fn len(&self) -> usize {
        lock(&self.entries).len()
    }
}

#[derive(Debug, Default)]
struct BandIndex {
    entries: BTreeMap<ItemId, Fingerprint>,
    buckets: Vec<HashMap<u64, Vec<ItemId>>>,
}

/// Band-partitioned index for large corpora.
///
/// The 64 bits are cut into `max_threshold + 1` contiguous bands. Two
/// fingerprints within `max_threshold` bits must agree exactly on at least
/// one band, so looking up each band's bucket finds every true match.
/// Queries above `max_threshold` fall back to a full scan.
#[derive(Debug)]
pub struct BandedStore {
    max_threshold: u32,
    bands: Vec<(u32, u32)>,
    index: Mutex<BandIndex>,
}

impl BandedStore {
    /// `max_threshold` is clamped to 63 (one bit per band).
    pub fn new(max_threshold: u32) -> Self {
        let max_threshold = max_threshold.min(63);
        let count = max_threshold + 1;
        let bands = (0..count)
            .map(|k| {
                let start = k * 64 / count;
                let end = (k + 1) * 64 / count;
                (start, end - start)
            })
            .collect::<Vec<_>>();
        let index = BandIndex {
            entries: BTreeMap::new(),
            buckets: vec![HashMap::new(); bands.len()],
        };
        Self {
            max_threshold,
            bands,
            index: Mutex::new(index),
        }
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn band_key(fp: Fingerprint, (start, len): (u32, u32)) -> u64 {
        let mask = if len >= 64 { u64::MAX } else { (1u64 << len) - 1 };
        (fp.0 >> start) & mask
    }

    fn search(&self, index: &BandIndex, fp: Fingerprint, threshold: u32, exclude: Option<ItemId>) -> Option<Match> {
        if threshold > self.max_threshold {
            return closest(index.entries.iter().map(|(id, f)| (*id, *f)), fp, threshold, exclude);
        }
        let candidates = self
            .bands
            .iter()
            .zip(&index.buckets)
            .filter_map(|(band, bucket)| bucket.get(&Self::band_key(fp, *band)))
            .flatten()
            .copied()
            .unique()
            .filter_map(|id| index.entries.get(&id).map(|f| (id, *f)));
        closest(candidates, fp, threshold, exclude)
    }

    fn unlink(&self, index: &mut BandIndex, id: ItemId, fp: Fingerprint) {
        for (band, bucket) in self.bands.iter().zip(index.buckets.iter_mut()) {
            let key = Self::band_key(fp, *band);
            if let Some(ids) = bucket.get_mut(&key) {
                ids.retain(|i| *i != id);
                if ids.is_empty() {
                    bucket.remove(&key);
                }
            }
        }
    }
}

impl FingerprintStore for BandedStore {
    fn find_near(&self, fp: Fingerprint, threshold: u32, exclude: Option<ItemId>) -> Option<Match> {
        if !fp.is_informative() {
            return None;
        }
        let index = lock(&self.index);
        self.search(&index, fp, threshold, exclude)
    }

    #[instrument(level = "debug", skip(self, fp), fields(fp = %fp))]
    fn admit(&self, id: ItemId, fp: Fingerprint, threshold: u32) -> Admission {
        if !fp.is_informative() {
            return Admission::Uninformative;
        }
        let mut index = lock(&self.index);
        if let Some(m) = self.search(&index, fp, threshold, Some(id)) {
            debug!(id, duplicate_of = m.id, distance = m.distance, "Rejected near-duplicate");
            return Admission::Duplicate(m);
        }
        if let Some(previous) = index.entries.insert(id, fp) {
            self.unlink(&mut index, id, previous);
        }
        for (band, bucket) in self.bands.iter().zip(index.buckets.iter_mut()) {
            bucket.entry(Self::band_key(fp, *band)).or_default().push(id);
        }
        Admission::Unique
    }

    fn remove(&self, id: ItemId) -> Option<Fingerprint> {
        let mut index = lock(&self.index);
        let fp = index.entries.remove(&id)?;
        self.unlink(&mut index, id, fp);
        Some(fp)
    }

    fn len(&self) -> usize {
        lock(&self.index).entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn flip(fp: u64, bits: &[u32]) -> Fingerprint {
        Fingerprint(bits.iter().fold(fp, |acc, b| acc ^ (1u64 << b)))
    }

    #[test]
    fn test_admit_unique_then_duplicate() {
        let store = LinearStore::new();
        let base = 0xdead_beef_cafe_f00d;
        assert_eq!(store.admit(1, Fingerprint(base), 10), Admission::Unique);
        match store.admit(2, flip(base, &[0, 5, 9]), 10) {
            Admission::Duplicate(m) => {
                assert_eq!(m.id, 1);
                assert_eq!(m.distance, 3);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let store = LinearStore::new();
        let base = 0x0123_4567_89ab_cdef;
        store.admit(1, Fingerprint(base), 10);
        let ten: Vec<u32> = (0..10).collect();
        let eleven: Vec<u32> = (0..11).collect();
        assert!(matches!(store.admit(2, flip(base, &ten), 10), Admission::Duplicate(_)));
        assert_eq!(store.admit(3, flip(base, &eleven), 10), Admission::Unique);
    }

    #[test]
    fn test_zero_fingerprint_never_stored() {
        let store = LinearStore::new();
        assert_eq!(store.admit(1, Fingerprint::EMPTY, 10), Admission::Uninformative);
        assert_eq!(store.admit(2, Fingerprint::EMPTY, 10), Admission::Uninformative);
        assert!(store.is_empty());
        store.admit(3, Fingerprint(0b111), 10);
        assert_eq!(store.find_near(Fingerprint::EMPTY, 64, None), None);
    }

    #[test]
    fn test_readmitting_same_id_is_not_a_duplicate() {
        let store = LinearStore::new();
        store.admit(7, Fingerprint(0xff00), 10);
        assert_eq!(store.admit(7, Fingerprint(0xff01), 10), Admission::Unique);
        assert_eq!(store.len(), 1);
        assert_eq!(store.remove(7), Some(Fingerprint(0xff01)));
    }

    #[test]
    fn test_closest_match_wins_ties_to_lowest_id() {
        let store = LinearStore::new();
        let base = 0xaaaa_aaaa_aaaa_aaaa;
        store.admit(5, flip(base, &[1, 2]), 0);
        store.admit(3, flip(base, &[3, 4]), 0);
        store.admit(9, flip(base, &[7]), 0);
        let m = store.find_near(Fingerprint(base), 10, None).unwrap();
        assert_eq!((m.id, m.distance), (9, 1));
        store.remove(9);
        let m = store.find_near(Fingerprint(base), 10, None).unwrap();
        assert_eq!((m.id, m.distance), (3, 2));
    }

    #[test]
    fn test_band_layout_covers_all_bits() {
        let store = BandedStore::new(10);
        assert_eq!(store.band_count(), 11);
        let total: u32 = store.bands.iter().map(|(_, len)| len).sum();
        assert_eq!(total, 64);
        assert_eq!(BandedStore::new(200).band_count(), 64);
    }

    #[test]
    fn test_banded_agrees_with_linear_scan() {
        let mut rng = StdRng::seed_from_u64(42);
        let linear = LinearStore::new();
        let banded = BandedStore::new(10);
        let mut seeds = Vec::new();

        for id in 0..400u64 {
            let fp = if !seeds.is_empty() && rng.random_bool(0.5) {
                let base: u64 = seeds[rng.random_range(0..seeds.len())];
                let flips: Vec<u32> = (0..rng.random_range(0..16u32))
                    .map(|_| rng.random_range(0..64u32))
                    .collect();
                flip(base, &flips)
            } else {
                let fp: u64 = rng.random();
                seeds.push(fp);
                Fingerprint(fp)
            };
            assert_eq!(linear.admit(id, fp, 10), banded.admit(id, fp, 10), "id {id}");
        }
        assert_eq!(linear.len(), banded.len());

        for _ in 0..200 {
            let probe = Fingerprint(rng.random());
            for t in [0, 4, 10, 20] {
                assert_eq!(linear.find_near(probe, t, None), banded.find_near(probe, t, None));
            }
        }
    }

    #[test]
    fn test_banded_remove_unlinks_buckets() {
        let store = BandedStore::new(4);
        store.admit(1, Fingerprint(0xffff), 4);
        assert_eq!(store.remove(1), Some(Fingerprint(0xffff)));
        assert!(store.is_empty());
        assert_eq!(store.find_near(Fingerprint(0xffff), 4, None), None);
        assert_eq!(store.admit(2, Fingerprint(0xffff), 4), Admission::Unique);
        let index = lock(&store.index);
        let linked: usize = index.buckets.iter().map(|b| b.values().map(Vec::len).sum::<usize>()).sum();
        assert_eq!(linked, store.band_count());
    }

    #[tokio::test]
    async fn test_concurrent_admission_keeps_one() {
        use std::sync::Arc;
        let store = Arc::new(LinearStore::new());
        let fp = Fingerprint(0x1234_5678_9abc_def0);
        let handles = (0..16u64)
            .map(|id| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.admit(id, flip(fp.0, &[(id % 4) as u32]), 10) })
            })
            .collect::<Vec<_>>();
        let mut unique = 0;
        for h in handles {
            if h.await.unwrap() == Admission::Unique {
                unique += 1;
            }
        }
        assert_eq!(unique, 1);
        assert_eq!(store.len(), 1);
    }
}
