use core::num::NonZeroUsize;
use std::sync::Arc;

use dilithium::PublicKeyBytes;
use enum_map::EnumMap;
use im::HashMap;
use lru::LruCache;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::{
    altair::primitives::NonZeroGwei,
    nonstandard::RelativeEpoch,
    phase0::primitives::{CommitteeIndex, Slot, ValidatorIndex, H256},
};

// The fields in `Cache` are ordered from short-lived to long-lived.
#[derive(Clone, Default, Debug)]
pub struct Cache {
    pub proposer_index: OnceCell<ValidatorIndex>,
    pub active_validator_indices_ordered: EnumMap<RelativeEpoch, OnceCell<Arc<[ValidatorIndex]>>>,
    pub active_validator_indices_shuffled: EnumMap<RelativeEpoch, OnceCell<Arc<ShuffledList>>>,
    pub total_active_balance: EnumMap<RelativeEpoch, OnceCell<NonZeroGwei>>,
    pub validator_indices: OnceCell<HashMap<PublicKeyBytes, ValidatorIndex>>,
    committee_cache: Option<Arc<CommitteeCache>>,
}

impl Cache {
    #[must_use]
    pub fn with_committee_cache(committee_cache: Arc<CommitteeCache>) -> Self {
        Self {
            committee_cache: Some(committee_cache),
            ..Self::default()
        }
    }

    pub fn set_committee_cache(&mut self, committee_cache: Arc<CommitteeCache>) {
        self.committee_cache = Some(committee_cache);
    }

    #[must_use]
    pub const fn committee_cache(&self) -> Option<&Arc<CommitteeCache>> {
        self.committee_cache.as_ref()
    }

    pub fn advance_slot(&mut self) {
        self.proposer_index.take();
    }

    pub fn advance_epoch(&mut self) {
        let ordered = &mut self.active_validator_indices_ordered;
        let shuffled = &mut self.active_validator_indices_shuffled;
        let balance = &mut self.total_active_balance;

        ordered[RelativeEpoch::Previous] = core::mem::take(&mut ordered[RelativeEpoch::Current]);
        shuffled[RelativeEpoch::Previous] = core::mem::take(&mut shuffled[RelativeEpoch::Current]);
        balance[RelativeEpoch::Previous] = core::mem::take(&mut balance[RelativeEpoch::Current]);

        ordered[RelativeEpoch::Current] = core::mem::take(&mut ordered[RelativeEpoch::Next]);
        shuffled[RelativeEpoch::Current] = core::mem::take(&mut shuffled[RelativeEpoch::Next]);
        balance[RelativeEpoch::Current] = core::mem::take(&mut balance[RelativeEpoch::Next]);
    }
}

/// Active validators of an epoch in both registry and shuffled order.
///
/// Committees are contiguous slices of `shuffled`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ShuffledList {
    active_indices: Arc<[ValidatorIndex]>,
    shuffled: Arc<[ValidatorIndex]>,
    committees_per_slot: u64,
    slots_per_epoch: u64,
}

impl ShuffledList {
    /// # Panics
    ///
    /// Panics if the lists have different lengths or `slots_per_epoch` is 0.
    #[must_use]
    pub fn new(
        active_indices: Arc<[ValidatorIndex]>,
        shuffled: Arc<[ValidatorIndex]>,
        committees_per_slot: u64,
        slots_per_epoch: u64,
    ) -> Self {
        assert_eq!(active_indices.len(), shuffled.len());
        assert_ne!(slots_per_epoch, 0);

        Self {
            active_indices,
            shuffled,
            committees_per_slot,
            slots_per_epoch,
        }
    }

    #[must_use]
    pub fn active_indices(&self) -> &Arc<[ValidatorIndex]> {
        &self.active_indices
    }

    #[must_use]
    pub fn shuffled(&self) -> &[ValidatorIndex] {
        &self.shuffled
    }

    #[must_use]
    pub const fn committees_per_slot(&self) -> u64 {
        self.committees_per_slot
    }

    /// Returns the committee with `committee_index` in `slot`.
    ///
    /// Returns `None` if `committee_index` is not less than the number of committees per slot.
    #[must_use]
    pub fn committee(
        &self,
        slot: Slot,
        committee_index: CommitteeIndex,
    ) -> Option<&[ValidatorIndex]> {
        if committee_index >= self.committees_per_slot {
            return None;
        }

        let slot_in_epoch = slot % self.slots_per_epoch;
        let index = slot_in_epoch * self.committees_per_slot + committee_index;
        let count = self.committees_per_slot * self.slots_per_epoch;
        let length = self.shuffled.len() as u128;

        let start = length * u128::from(index) / u128::from(count);
        let end = length * u128::from(index + 1) / u128::from(count);

        self.shuffled
            .get(usize::try_from(start).ok()?..usize::try_from(end).ok()?)
    }
}

/// Shuffled lists shared between states, keyed by seed.
///
/// Seeds are derived from RANDAO mixes, so two states that compute the same seed for an epoch have
/// the same active validators in it. Entries are immutable once inserted.
pub struct CommitteeCache {
    shuffled_lists: Mutex<LruCache<H256, Arc<ShuffledList>>>,
}

impl core::fmt::Debug for CommitteeCache {
    fn fmt(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
        formatter
            .debug_struct("CommitteeCache")
            .field("len", &self.len())
            .finish()
    }
}

impl CommitteeCache {
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            shuffled_lists: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn clear(&self) {
        self.shuffled_lists.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shuffled_lists.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn has_entry(&self, seed: H256) -> bool {
        self.shuffled_lists.lock().contains(&seed)
    }

    #[must_use]
    pub fn shuffled_list(&self, seed: H256) -> Option<Arc<ShuffledList>> {
        self.shuffled_lists.lock().get(&seed).cloned()
    }

    #[must_use]
    pub fn active_indices(&self, seed: H256) -> Option<Arc<[ValidatorIndex]>> {
        self.shuffled_list(seed)
            .map(|shuffled_list| Arc::clone(&shuffled_list.active_indices))
    }

    #[must_use]
    pub fn committee(
        &self,
        seed: H256,
        slot: Slot,
        committee_index: CommitteeIndex,
    ) -> Option<Vec<ValidatorIndex>> {
        let shuffled_list = self.shuffled_list(seed)?;
        let committee = shuffled_list.committee(slot, committee_index)?;
        Some(committee.to_vec())
    }

    /// Inserts `shuffled_list` unless an entry for `seed` already exists.
    ///
    /// Returns the entry that ends up in the cache.
    pub fn add_committee_shuffled_list(
        &self,
        seed: H256,
        shuffled_list: ShuffledList,
    ) -> Arc<ShuffledList> {
        self.shuffled_lists
            .lock()
            .get_or_insert(seed, || Arc::new(shuffled_list))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use nonzero_ext::nonzero;

    use super::*;

    fn shuffled_list(length: u64) -> ShuffledList {
        let active_indices = (0..length).collect::<Arc<[_]>>();
        let shuffled = (0..length).rev().collect::<Arc<[_]>>();
        ShuffledList::new(active_indices, shuffled, 2, 4)
    }

    #[test]
    fn committees_partition_the_shuffled_list() {
        let list = shuffled_list(17);

        let committees = (0..4)
            .flat_map(|slot| (0..2).map(move |index| (slot, index)))
            .map(|(slot, index)| list.committee(slot, index).map(<[_]>::to_vec))
            .collect::<Option<Vec<_>>>()
            .expect("every committee index is in range");

        assert_eq!(committees.concat(), list.shuffled());
        assert_eq!(list.committee(0, 2), None);
    }

    #[test]
    fn committee_cache_round_trip() {
        let cache = CommitteeCache::new(nonzero!(2_usize));
        let seed = H256::repeat_byte(1);

        assert!(!cache.has_entry(seed));

        cache.add_committee_shuffled_list(seed, shuffled_list(8));

        assert!(cache.has_entry(seed));
        assert_eq!(cache.committee(seed, 1, 1), Some(vec![4]));
        assert_eq!(cache.active_indices(seed).as_deref(), Some(&[0, 1, 2, 3, 4, 5, 6, 7][..]));

        cache.clear();

        assert!(cache.is_empty());
    }

    #[test]
    fn committee_cache_evicts_least_recently_used() {
        let cache = CommitteeCache::new(nonzero!(2_usize));

        for byte in 1..=3 {
            cache.add_committee_shuffled_list(H256::repeat_byte(byte), shuffled_list(4));
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.has_entry(H256::repeat_byte(1)));
    }

    #[test]
    fn advance_epoch_rotates_slots() {
        let mut cache = Cache::default();

        cache.active_validator_indices_ordered[RelativeEpoch::Next]
            .set(Arc::from([1, 2, 3]))
            .expect("cell is empty");

        cache.advance_epoch();

        assert!(cache.active_validator_indices_ordered[RelativeEpoch::Next].get().is_none());
        assert_eq!(
            cache.active_validator_indices_ordered[RelativeEpoch::Current]
                .get()
                .map(|indices| indices.len()),
            Some(3),
        );
    }
}
