use core::{num::NonZeroU64, ops::Mul as _};
use std::sync::Arc;

use anyhow::{ensure, Result};
use bit_field::BitField as _;
use dilithium::PublicKeyBytes;
use im::HashMap;
use itertools::{EitherOrBoth, Itertools as _};
use num_integer::Roots as _;
use ssz_types::{BitList, FixedVector, VariableList};
use tap::{Pipe as _, TryConv as _};
use typenum::Unsigned as _;
use types::{
    altair::{
        consts::{
            DOMAIN_SYNC_COMMITTEE, TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX,
            TIMELY_TARGET_FLAG_INDEX,
        },
        containers::SyncCommittee,
        primitives::ParticipationFlags,
    },
    cache::ShuffledList,
    config::Config,
    nonstandard::{AttestationEpoch, Participation, RelativeEpoch},
    phase0::{
        consts::{DOMAIN_BEACON_ATTESTER, DOMAIN_BEACON_PROPOSER, GENESIS_EPOCH},
        containers::{Attestation, AttestationData, IndexedAttestation},
        primitives::{CommitteeIndex, DomainType, Epoch, Gwei, Slot, ValidatorIndex, H256},
    },
    preset::Preset,
    traits::{BeaconState, PostAltairBeaconState},
};

use crate::{error::Error, misc, predicates};

#[must_use]
pub fn get_previous_epoch<P: Preset>(state: &(impl BeaconState<P> + ?Sized)) -> Epoch {
    get_current_epoch(state)
        .saturating_sub(1)
        .max(GENESIS_EPOCH)
}

#[must_use]
pub fn get_current_epoch<P: Preset>(state: &(impl BeaconState<P> + ?Sized)) -> Epoch {
    misc::compute_epoch_at_slot::<P>(state.slot())
}

#[must_use]
pub fn get_next_epoch<P: Preset>(state: &(impl BeaconState<P> + ?Sized)) -> Epoch {
    get_current_epoch(state) + 1
}

#[must_use]
pub fn absolute_epoch<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    relative_epoch: RelativeEpoch,
) -> Epoch {
    match relative_epoch {
        RelativeEpoch::Previous => get_previous_epoch(state),
        RelativeEpoch::Current => get_current_epoch(state),
        RelativeEpoch::Next => get_next_epoch(state),
    }
}

pub fn attestation_epoch<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    epoch: Epoch,
) -> Result<AttestationEpoch> {
    match get_current_epoch(state).checked_sub(epoch) {
        None => Err(Error::EpochInTheFuture { epoch }.into()),
        Some(0) => Ok(AttestationEpoch::Current),
        Some(1) => Ok(AttestationEpoch::Previous),
        Some(_) => Err(Error::EpochBeforePrevious { epoch }.into()),
    }
}

pub fn relative_epoch<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    epoch: Epoch,
) -> Result<RelativeEpoch> {
    match get_next_epoch(state).checked_sub(epoch) {
        None => Err(Error::EpochAfterNext { epoch }.into()),
        Some(0) => Ok(RelativeEpoch::Next),
        Some(1) => Ok(RelativeEpoch::Current),
        Some(2) => Ok(RelativeEpoch::Previous),
        Some(_) => Err(Error::EpochBeforePrevious { epoch }.into()),
    }
}

#[must_use]
pub fn get_finality_delay<P: Preset>(state: &(impl BeaconState<P> + ?Sized)) -> u64 {
    get_previous_epoch(state).saturating_sub(state.finalized_checkpoint().epoch)
}

pub fn get_block_root<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    attestation_epoch: AttestationEpoch,
) -> Result<H256> {
    let epoch = absolute_epoch(state, attestation_epoch.into());
    let slot = misc::compute_start_slot_at_epoch::<P>(epoch);
    get_block_root_at_slot(state, slot)
}

pub fn get_block_root_at_slot<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    slot: Slot,
) -> Result<H256> {
    let state_slot = state.slot();

    ensure!(
        slot < state_slot && state_slot <= slot + P::SlotsPerHistoricalRoot::U64,
        Error::SlotOutOfRange { slot, state_slot },
    );

    Ok(*state.block_roots().mod_index(slot))
}

/// Returns the root of the latest block, filling in the state root if the block has been applied
/// to `state` in the current slot.
#[must_use]
pub fn latest_block_root<P: Preset>(state: &(impl BeaconState<P> + ?Sized)) -> H256 {
    let mut header = state.latest_block_header();

    if header.state_root.is_zero() {
        header.state_root = state.hash_tree_root();
    }

    tree_hash::TreeHash::tree_hash_root(&header)
}

#[must_use]
pub fn get_randao_mix<P: Preset>(state: &(impl BeaconState<P> + ?Sized), epoch: Epoch) -> H256 {
    *state.randao_mixes().mod_index(epoch)
}

pub fn public_key<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    validator_index: ValidatorIndex,
) -> Result<&PublicKeyBytes> {
    Ok(&state.validators().get(validator_index)?.pubkey)
}

#[must_use]
pub fn index_of_public_key<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    public_key: &PublicKeyBytes,
) -> Option<ValidatorIndex> {
    get_or_init_validator_indices(state).get(public_key).copied()
}

/// Returns the map from public keys to validator indices, building it on first use.
///
/// Code that appends validators must also insert them into an initialized map.
pub fn get_or_init_validator_indices<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
) -> &HashMap<PublicKeyBytes, ValidatorIndex> {
    state.cache().validator_indices.get_or_init(|| {
        state
            .validators()
            .iter()
            .map(|validator| validator.pubkey)
            .zip(0..)
            .collect()
    })
}

pub fn get_active_validator_indices<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    relative_epoch: RelativeEpoch,
) -> impl Iterator<Item = ValidatorIndex> + '_ {
    let epoch = absolute_epoch(state, relative_epoch);
    get_active_validator_indices_by_epoch(state, epoch)
}

fn get_active_validator_indices_by_epoch<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    epoch: Epoch,
) -> impl Iterator<Item = ValidatorIndex> + '_ {
    (0..)
        .zip(state.validators())
        .filter(move |(_, validator)| predicates::is_active_validator(validator, epoch))
        .map(|(index, _)| index)
}

/// Active validator indices in registry order.
///
/// Proposer selection needs them in order. Committees use [`active_validator_indices_shuffled`].
pub fn active_validator_indices_ordered<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    relative_epoch: RelativeEpoch,
) -> &Arc<[ValidatorIndex]> {
    state.cache().active_validator_indices_ordered[relative_epoch].get_or_init(|| {
        let epoch = absolute_epoch(state, relative_epoch);

        if let Some(committee_cache) = state.cache().committee_cache() {
            let seed = get_seed(state, epoch, DOMAIN_BEACON_ATTESTER);

            if let Some(active_indices) = committee_cache.active_indices(seed) {
                return active_indices;
            }
        }

        get_active_validator_indices_by_epoch(state, epoch).collect()
    })
}

/// Active validator indices shuffled with the attester seed of the epoch.
///
/// The shuffled list is looked up in and stored into the shared committee cache when the state
/// has one, so states with the same seed shuffle only once.
pub fn active_validator_indices_shuffled<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    relative_epoch: RelativeEpoch,
) -> &Arc<ShuffledList> {
    state.cache().active_validator_indices_shuffled[relative_epoch].get_or_init(|| {
        let epoch = absolute_epoch(state, relative_epoch);
        let seed = get_seed(state, epoch, DOMAIN_BEACON_ATTESTER);
        let committee_cache = state.cache().committee_cache();

        if let Some(shuffled_list) = committee_cache.and_then(|cache| cache.shuffled_list(seed)) {
            return shuffled_list;
        }

        let active_indices = Arc::clone(active_validator_indices_ordered(state, relative_epoch));
        let mut shuffled = active_indices.to_vec();

        shuffling::shuffle_slice::<P, _>(&mut shuffled, seed)
            .expect("shuffle_slice only fails for single indices out of range");

        let committees_per_slot =
            misc::committee_count_from_active_validator_count::<P>(active_indices.len() as u64);

        let shuffled_list = ShuffledList::new(
            active_indices,
            shuffled.into(),
            committees_per_slot,
            P::SlotsPerEpoch::U64,
        );

        match committee_cache {
            Some(cache) => cache.add_committee_shuffled_list(seed, shuffled_list),
            None => Arc::new(shuffled_list),
        }
    })
}

#[must_use]
pub fn active_validator_count<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    relative_epoch: RelativeEpoch,
) -> u64 {
    active_validator_indices_ordered(state, relative_epoch).len() as u64
}

#[must_use]
pub fn get_validator_churn_limit<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
) -> u64 {
    (active_validator_count(state, RelativeEpoch::Current) / config.churn_limit_quotient)
        .max(config.min_per_epoch_churn_limit)
}

#[must_use]
pub fn get_validator_activation_churn_limit<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
) -> u64 {
    get_validator_churn_limit(config, state).min(config.max_per_epoch_activation_churn_limit)
}

#[must_use]
pub fn get_seed<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    epoch: Epoch,
    domain_type: DomainType,
) -> H256 {
    let mix = get_randao_mix(
        state,
        epoch + P::EpochsPerHistoricalVector::U64 - P::MIN_SEED_LOOKAHEAD - 1,
    );

    hashing::hash_32_64_256(domain_type, epoch, mix)
}

#[must_use]
pub fn get_committee_count_per_slot<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    relative_epoch: RelativeEpoch,
) -> u64 {
    misc::committee_count_from_active_validator_count::<P>(active_validator_count(
        state,
        relative_epoch,
    ))
}

pub fn get_beacon_committee<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    slot: Slot,
    committee_index: CommitteeIndex,
) -> Result<&[ValidatorIndex]> {
    let epoch = misc::compute_epoch_at_slot::<P>(slot);
    let relative_epoch = relative_epoch(state, epoch)?;
    let shuffled_list = active_validator_indices_shuffled(state, relative_epoch);

    shuffled_list
        .committee(slot, committee_index)
        .ok_or_else(|| {
            Error::CommitteeIndexOutOfBounds {
                index: committee_index,
                committee_count: shuffled_list.committees_per_slot(),
            }
            .into()
        })
}

pub fn get_beacon_proposer_index<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
) -> Result<ValidatorIndex> {
    state
        .cache()
        .proposer_index
        .get_or_try_init(|| get_beacon_proposer_index_at_slot(state, state.slot()))
        .copied()
}

pub fn get_beacon_proposer_index_at_slot<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    slot: Slot,
) -> Result<ValidatorIndex> {
    let epoch = misc::compute_epoch_at_slot::<P>(slot);
    let relative_epoch = relative_epoch(state, epoch)?;
    let seed = hashing::hash_256_64(get_seed(state, epoch, DOMAIN_BEACON_PROPOSER), slot);
    let indices = active_validator_indices_ordered(state, relative_epoch);

    misc::compute_proposer_index(state, indices, seed)
}

#[must_use]
pub fn get_domain<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
    domain_type: DomainType,
    epoch: Option<Epoch>,
) -> H256 {
    let epoch = epoch.unwrap_or_else(|| get_current_epoch(state));
    let fork = state.fork();

    let fork_version = if epoch < fork.epoch {
        fork.previous_version
    } else {
        fork.current_version
    };

    misc::compute_domain(
        config,
        domain_type,
        Some(fork_version),
        Some(state.genesis_validators_root()),
    )
}

pub fn get_attesting_indices<'all, P: Preset>(
    state: &'all (impl BeaconState<P> + ?Sized),
    attestation_data: AttestationData,
    aggregation_bits: &'all BitList<P::MaxValidatorsPerCommittee>,
) -> Result<impl Iterator<Item = ValidatorIndex> + 'all> {
    let committee = get_beacon_committee(state, attestation_data.slot, attestation_data.index)?;

    misc::verify_attestation_bitfield_lengths(aggregation_bits, committee.len())?;

    aggregation_bits
        .iter()
        .zip(committee.iter().copied())
        .filter_map(|(present, validator_index)| present.then_some(validator_index))
        .pipe(Ok)
}

/// Converts `attestation` into its indexed form.
///
/// Signatures in an [`Attestation`] follow committee order. They are reordered together with the
/// attesting indices so that both lists are sorted by validator index.
pub fn get_indexed_attestation<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    attestation: &Attestation<P>,
) -> Result<IndexedAttestation<P>> {
    let attesting_indices =
        get_attesting_indices(state, attestation.data, &attestation.aggregation_bits)?
            .collect_vec();

    ensure!(
        attesting_indices.len() == attestation.signatures.len(),
        Error::SignatureCountMismatch {
            signature_count: attestation.signatures.len(),
            attesting_index_count: attesting_indices.len(),
        },
    );

    let (attesting_indices, signatures): (Vec<_>, Vec<_>) = attesting_indices
        .into_iter()
        .zip(attestation.signatures.iter().copied())
        .sorted_unstable_by_key(|(validator_index, _)| *validator_index)
        .unzip();

    Ok(IndexedAttestation {
        attesting_indices: VariableList::new(attesting_indices).expect(
            "Attestation.aggregation_bits and IndexedAttestation.attesting_indices \
             have the same maximum length",
        ),
        data: attestation.data,
        signatures: VariableList::new(signatures)
            .expect("signatures were taken from a list with the same maximum length"),
    })
}

/// Returns the total effective balance of active validators in the current epoch.
///
/// The result is at least `P::EFFECTIVE_BALANCE_INCREMENT` to avoid division by zero.
pub fn total_active_balance<P: Preset>(state: &(impl BeaconState<P> + ?Sized)) -> Gwei {
    state.cache().total_active_balance[RelativeEpoch::Current]
        .get_or_init(|| {
            let current_epoch = get_current_epoch(state);

            state
                .validators()
                .iter()
                .filter(|validator| predicates::is_active_validator(validator, current_epoch))
                .map(|validator| validator.effective_balance)
                .sum::<Gwei>()
                .max(P::EFFECTIVE_BALANCE_INCREMENT.get())
                .pipe(NonZeroU64::new)
                .expect("the value is at least P::EFFECTIVE_BALANCE_INCREMENT, which is nonzero")
        })
        .get()
}

pub fn get_total_balance<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    indices: impl IntoIterator<Item = ValidatorIndex>,
) -> Result<Gwei> {
    let mut total = 0;

    for validator_index in indices {
        total += state.validators().get(validator_index)?.effective_balance;
    }

    Ok(total.max(P::EFFECTIVE_BALANCE_INCREMENT.get()))
}

pub fn get_next_sync_committee_indices<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
) -> Result<Vec<ValidatorIndex>> {
    let next_epoch = get_next_epoch(state);
    let indices = get_active_validator_indices_by_epoch(state, next_epoch).collect_vec();

    let total = indices
        .len()
        .try_conv::<u64>()?
        .pipe(NonZeroU64::new)
        .ok_or(Error::NoActiveValidators)?
        .get();

    let seed = get_seed(state, next_epoch, DOMAIN_SYNC_COMMITTEE);
    let max_random_byte = u64::from(u8::MAX);
    let bytes_per_hash = core::mem::size_of::<H256>() as u64;
    let mut sync_committee_indices = Vec::with_capacity(P::SyncCommitteeSize::USIZE);

    'outer: for quotient in 0..u64::MAX / bytes_per_hash {
        let random_bytes = hashing::hash_256_64(seed, quotient);

        for (remainder, random_byte) in (0..).zip(random_bytes.iter().copied().map(u64::from)) {
            let attempt = quotient * bytes_per_hash + remainder;
            let shuffled_index = misc::compute_shuffled_index::<P>(attempt % total, total, seed)?
                .try_conv::<usize>()?;

            let candidate_index = indices[shuffled_index];
            let effective_balance = state.validators().get(candidate_index)?.effective_balance;

            if effective_balance * max_random_byte >= P::MAX_EFFECTIVE_BALANCE * random_byte {
                sync_committee_indices.push(candidate_index);

                if sync_committee_indices.len() == P::SyncCommitteeSize::USIZE {
                    break 'outer;
                }
            }
        }
    }

    Ok(sync_committee_indices)
}

pub fn get_next_sync_committee<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
) -> Result<Arc<SyncCommittee<P>>> {
    let pubkeys = get_next_sync_committee_indices(state)?
        .into_iter()
        .map(|validator_index| public_key(state, validator_index).copied())
        .collect::<Result<Vec<_>>>()?;

    let pubkeys = FixedVector::new(pubkeys)
        .expect("get_next_sync_committee_indices returns P::SyncCommitteeSize indices");

    Ok(Arc::new(SyncCommittee { pubkeys }))
}

pub fn get_base_reward<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    validator_index: ValidatorIndex,
    base_reward_per_increment: Gwei,
) -> Result<Gwei> {
    let effective_balance = state.validators().get(validator_index)?.effective_balance;
    let increments = effective_balance / P::EFFECTIVE_BALANCE_INCREMENT;
    Ok(increments * base_reward_per_increment)
}

#[must_use]
pub fn get_base_reward_per_increment<P: Preset>(state: &(impl BeaconState<P> + ?Sized)) -> Gwei {
    P::EFFECTIVE_BALANCE_INCREMENT
        .get()
        .mul(P::BASE_REWARD_FACTOR)
        / total_active_balance(state).sqrt()
}

pub fn get_attestation_participation_flags<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    data: AttestationData,
    inclusion_delay: u64,
) -> Result<ParticipationFlags> {
    let attestation_epoch = attestation_epoch(state, data.target.epoch)?;

    let justified_checkpoint = match attestation_epoch {
        AttestationEpoch::Previous => state.previous_justified_checkpoint(),
        AttestationEpoch::Current => state.current_justified_checkpoint(),
    };

    ensure!(
        data.source == justified_checkpoint,
        Error::AttestationSourceMismatch {
            in_state: justified_checkpoint,
            in_block: data.source,
        },
    );

    let is_matching_target = data.target.root == get_block_root(state, attestation_epoch)?;
    let is_matching_head =
        is_matching_target && data.beacon_block_root == get_block_root_at_slot(state, data.slot)?;

    let mut participation_flags = 0;

    if inclusion_delay <= P::SlotsPerEpoch::U64.sqrt() {
        participation_flags.set_bit(TIMELY_SOURCE_FLAG_INDEX, true);
    }

    // Deneb drops the inclusion bound on the target flag.
    if is_matching_target && (state.is_post_deneb() || inclusion_delay <= P::SlotsPerEpoch::U64) {
        participation_flags.set_bit(TIMELY_TARGET_FLAG_INDEX, true);
    }

    if is_matching_head && inclusion_delay == P::MIN_ATTESTATION_INCLUSION_DELAY.get() {
        participation_flags.set_bit(TIMELY_HEAD_FLAG_INDEX, true);
    }

    Ok(participation_flags)
}

/// Returns validators attesting to both attestations that can still be slashed, in ascending
/// order.
///
/// Both index lists must be sorted, which `validate_constructed_indexed_attestation` enforces.
pub fn slashable_indices<'all, P: Preset>(
    state: &'all (impl BeaconState<P> + ?Sized),
    attestation_1: &'all IndexedAttestation<P>,
    attestation_2: &'all IndexedAttestation<P>,
) -> impl Iterator<Item = ValidatorIndex> + 'all {
    let current_epoch = get_current_epoch(state);

    attestation_1
        .attesting_indices
        .iter()
        .copied()
        .merge_join_by(attestation_2.attesting_indices.iter().copied(), Ord::cmp)
        .filter_map(|either_or_both| match either_or_both {
            EitherOrBoth::Both(validator_index, _) => Some(validator_index),
            _ => None,
        })
        .filter(move |validator_index| {
            state
                .validators()
                .get(*validator_index)
                .is_ok_and(|validator| predicates::is_slashable_validator(validator, current_epoch))
        })
}

#[must_use]
pub fn combined_participation<P: Preset>(
    state: &(impl PostAltairBeaconState<P> + ?Sized),
) -> Vec<(Participation, Participation)> {
    itertools::zip_eq(
        state.previous_epoch_participation().iter().copied(),
        state.current_epoch_participation().iter().copied(),
    )
    .map(|(previous, current)| (Participation::from(previous), Participation::from(current)))
    .collect()
}

/// Computes the shuffled lists needed by `attestations` before they are validated in parallel.
///
/// Shuffled lists are stored in `OnceCell`s. Threads that need one that is being computed block
/// until it is ready instead of doing other work, so initializing them up front avoids that.
pub fn initialize_shuffled_indices<'attestations, P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    attestations: impl IntoIterator<Item = &'attestations Attestation<P>>,
) -> Result<()> {
    let mut need_previous = false;
    let mut need_current = false;

    for attestation in attestations {
        match attestation_epoch(state, attestation.data.target.epoch)? {
            AttestationEpoch::Previous => need_previous = true,
            AttestationEpoch::Current => need_current = true,
        }
    }

    let initialize_previous = || active_validator_indices_shuffled(state, RelativeEpoch::Previous);
    let initialize_current = || active_validator_indices_shuffled(state, RelativeEpoch::Current);

    match (need_previous, need_current) {
        (true, true) => {
            rayon::join(initialize_previous, initialize_current);
        }
        (true, false) => {
            initialize_previous();
        }
        (false, true) => {
            initialize_current();
        }
        (false, false) => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use nonzero_ext::nonzero;
    use types::{
        cache::{Cache, CommitteeCache},
        collections::Validators,
        phase0::{
            beacon_state::BeaconState as Phase0BeaconState,
            consts::FAR_FUTURE_EPOCH,
            containers::{Checkpoint, Validator},
        },
        preset::Minimal,
    };

    use super::*;

    fn active_validator() -> Validator {
        Validator {
            effective_balance: Minimal::MAX_EFFECTIVE_BALANCE,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            ..Validator::default()
        }
    }

    fn state_with_validators(count: usize, slot: Slot) -> Result<Phase0BeaconState<Minimal>> {
        Ok(Phase0BeaconState {
            slot,
            validators: Validators::<Minimal>::try_from_iter(core::iter::repeat_n(active_validator(), count))?,
            ..Phase0BeaconState::default()
        })
    }

    #[test]
    fn relative_epochs_around_state() -> Result<()> {
        let state = state_with_validators(0, 3 * 8)?;

        assert_eq!(relative_epoch(&state, 2)?, RelativeEpoch::Previous);
        assert_eq!(relative_epoch(&state, 3)?, RelativeEpoch::Current);
        assert_eq!(relative_epoch(&state, 4)?, RelativeEpoch::Next);
        assert!(relative_epoch(&state, 1).is_err());
        assert!(relative_epoch(&state, 5).is_err());

        Ok(())
    }

    #[test]
    fn relative_epoch_at_genesis_is_current() -> Result<()> {
        let state = state_with_validators(0, 0)?;

        assert_eq!(relative_epoch(&state, 0)?, RelativeEpoch::Current);
        assert_eq!(attestation_epoch(&state, 0)?, AttestationEpoch::Current);

        Ok(())
    }

    #[test]
    fn block_root_at_slot_rejects_current_slot() -> Result<()> {
        let state = state_with_validators(0, 10)?;

        assert!(get_block_root_at_slot(&state, 9).is_ok());

        let error = get_block_root_at_slot(&state, 10)
            .expect_err("the block root of the state slot is not known yet");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::SlotOutOfRange {
                slot: 10,
                state_slot: 10,
            }),
        ));

        Ok(())
    }

    #[test]
    fn committees_of_an_epoch_cover_all_active_validators() -> Result<()> {
        let state = state_with_validators(64, 0)?;
        let committees_per_slot = get_committee_count_per_slot(&state, RelativeEpoch::Current);

        let mut members = (0..8)
            .cartesian_product(0..committees_per_slot)
            .map(|(slot, index)| get_beacon_committee(&state, slot, index).map(<[_]>::to_vec))
            .collect::<Result<Vec<_>>>()?
            .concat();

        members.sort_unstable();

        assert_eq!(members, (0..64).collect_vec());

        let error = get_beacon_committee(&state, 0, committees_per_slot)
            .expect_err("the committee index is out of bounds");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::CommitteeIndexOutOfBounds { .. }),
        ));

        Ok(())
    }

    #[test]
    fn shuffled_lists_are_shared_through_the_committee_cache() -> Result<()> {
        let committee_cache = Arc::new(CommitteeCache::new(nonzero!(4_usize)));

        let state_1 = Phase0BeaconState {
            cache: Cache::with_committee_cache(Arc::clone(&committee_cache)),
            ..state_with_validators(32, 0)?
        };

        let state_2 = Phase0BeaconState {
            cache: Cache::with_committee_cache(Arc::clone(&committee_cache)),
            ..state_with_validators(32, 0)?
        };

        let seed = get_seed(&state_1, 0, DOMAIN_BEACON_ATTESTER);

        assert!(!committee_cache.has_entry(seed));

        let shuffled_1 = active_validator_indices_shuffled(&state_1, RelativeEpoch::Current);

        assert!(committee_cache.has_entry(seed));

        let shuffled_2 = active_validator_indices_shuffled(&state_2, RelativeEpoch::Current);

        assert!(Arc::ptr_eq(shuffled_1, shuffled_2));
        assert_eq!(
            committee_cache.committee(seed, 0, 0).as_deref(),
            Some(get_beacon_committee(&state_2, 0, 0)?),
        );

        Ok(())
    }

    #[test]
    fn proposer_index_is_cached_and_active() -> Result<()> {
        let state = state_with_validators(16, 5)?;
        let proposer_index = get_beacon_proposer_index(&state)?;

        assert!(proposer_index < 16);
        assert_eq!(state.cache.proposer_index.get(), Some(&proposer_index));

        Ok(())
    }

    #[test]
    fn proposer_selection_fails_without_active_validators() -> Result<()> {
        let state = state_with_validators(0, 0)?;
        let error = get_beacon_proposer_index(&state).expect_err("there are no validators");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::NoActiveValidators),
        ));

        Ok(())
    }

    #[test]
    fn total_active_balance_is_at_least_one_increment() -> Result<()> {
        let empty = state_with_validators(0, 0)?;
        let full = state_with_validators(3, 0)?;

        assert_eq!(
            total_active_balance(&empty),
            Minimal::EFFECTIVE_BALANCE_INCREMENT.get(),
        );
        assert_eq!(
            total_active_balance(&full),
            3 * Minimal::MAX_EFFECTIVE_BALANCE,
        );

        Ok(())
    }

    #[test]
    fn next_sync_committee_has_preset_size() -> Result<()> {
        let state = state_with_validators(10, 0)?;
        let indices = get_next_sync_committee_indices(&state)?;

        assert_eq!(
            indices.len(),
            <Minimal as Preset>::SyncCommitteeSize::USIZE,
        );
        assert!(indices.iter().all(|index| *index < 10));

        Ok(())
    }

    #[test]
    fn validator_indices_are_looked_up_by_public_key() -> Result<()> {
        let mut validator = active_validator();
        validator.pubkey = PublicKeyBytes::from_array([7; dilithium::PUBLIC_KEY_SIZE]);

        let mut state = state_with_validators(2, 0)?;
        state.validators.push(validator)?;

        assert_eq!(index_of_public_key(&state, &validator.pubkey), Some(2));

        Ok(())
    }

    #[test]
    fn source_mismatch_is_reported_with_both_checkpoints() -> Result<()> {
        let state = state_with_validators(8, 9)?;

        let data = AttestationData {
            slot: 8,
            source: Checkpoint {
                epoch: 1,
                root: H256::repeat_byte(1),
            },
            target: Checkpoint {
                epoch: 1,
                root: H256::ZERO,
            },
            ..AttestationData::default()
        };

        let error = get_attestation_participation_flags(&state, data, 1)
            .expect_err("the source does not match the justified checkpoint");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::AttestationSourceMismatch { in_block, .. }) if *in_block == data.source,
        ));

        Ok(())
    }

    #[test]
    fn timely_attestation_sets_all_flags() -> Result<()> {
        let state = state_with_validators(8, 9)?;

        let data = AttestationData {
            slot: 8,
            ..AttestationData::default()
        };

        let flags = get_attestation_participation_flags(&state, data, 1)?;
        let participation = Participation::from(flags);

        assert!(participation.matching_source());
        assert!(participation.matching_target());
        assert!(participation.matching_head());

        Ok(())
    }

    #[test]
    fn slashable_indices_are_the_slashable_intersection() -> Result<()> {
        let mut state = state_with_validators(6, 0)?;
        state.validators.get_mut(3)?.slashed = true;

        let attestation_1 = IndexedAttestation::<Minimal> {
            attesting_indices: VariableList::new(vec![0, 1, 3, 5])
                .map_err(|error| anyhow::anyhow!("{error:?}"))?,
            ..IndexedAttestation::default()
        };

        let attestation_2 = IndexedAttestation::<Minimal> {
            attesting_indices: VariableList::new(vec![1, 2, 3, 4, 5])
                .map_err(|error| anyhow::anyhow!("{error:?}"))?,
            ..IndexedAttestation::default()
        };

        assert_eq!(
            slashable_indices(&state, &attestation_1, &attestation_2).collect_vec(),
            [1, 5],
        );

        Ok(())
    }
}
