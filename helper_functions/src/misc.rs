use core::{num::NonZeroU64, ops::Div as _};

use anyhow::{ensure, Result};
use arithmetic::U64Ext as _;
use dilithium::PublicKeyBytes;
use num_integer::Roots as _;
use ssz_types::BitList;
use tap::{Pipe as _, TryConv as _};
use tree_hash::TreeHash;
use typenum::Unsigned as _;
use types::{
    altair::{
        consts::{PROPOSER_WEIGHT, SYNC_REWARD_WEIGHT, WEIGHT_DENOMINATOR},
        primitives::SyncCommitteePeriod,
    },
    config::Config,
    deneb::{
        consts::VERSIONED_HASH_VERSION_KZG,
        primitives::{KzgCommitment, VersionedHash},
    },
    nonstandard::Phase,
    phase0::{
        consts::{DILITHIUM_WITHDRAWAL_PREFIX, ETH1_ADDRESS_WITHDRAWAL_PREFIX, GENESIS_SLOT},
        containers::{ForkData, SigningData},
        primitives::{
            DomainType, Epoch, ExecutionAddress, Gwei, Slot, UnixSeconds,
            ValidatorIndex, Version, H256,
        },
    },
    preset::Preset,
    traits::BeaconState,
};

use crate::error::Error;

#[must_use]
pub fn compute_epoch_at_slot<P: Preset>(slot: Slot) -> Epoch {
    slot.div_typenum::<P::SlotsPerEpoch>()
}

#[must_use]
pub const fn compute_start_slot_at_epoch<P: Preset>(epoch: Epoch) -> Slot {
    epoch.saturating_mul(P::SlotsPerEpoch::U64)
}

#[must_use]
pub fn is_epoch_start<P: Preset>(slot: Slot) -> bool {
    slots_since_epoch_start::<P>(slot) == 0
}

#[must_use]
pub fn slots_since_epoch_start<P: Preset>(slot: Slot) -> u64 {
    slot.mod_typenum::<P::SlotsPerEpoch>()
}

/// Returns the slot before `slot`, or [`GENESIS_SLOT`] if `slot` is the genesis slot.
#[must_use]
pub const fn previous_slot(slot: Slot) -> Slot {
    slot.saturating_sub(1)
}

#[must_use]
pub fn sync_committee_period<P: Preset>(epoch: Epoch) -> SyncCommitteePeriod {
    epoch / P::EPOCHS_PER_SYNC_COMMITTEE_PERIOD
}

#[must_use]
pub const fn compute_activation_exit_epoch<P: Preset>(epoch: Epoch) -> Epoch {
    epoch + 1 + P::MAX_SEED_LOOKAHEAD
}

fn compute_fork_data_root(current_version: Version, genesis_validators_root: H256) -> H256 {
    ForkData {
        current_version,
        genesis_validators_root,
    }
    .tree_hash_root()
}

/// Computes a signature domain.
///
/// The genesis fork version and a zero validators root are used in place of missing arguments.
/// Deposits are signed that way, which makes them valid on every fork.
#[must_use]
pub fn compute_domain(
    config: &Config,
    domain_type: DomainType,
    fork_version: Option<Version>,
    genesis_validators_root: Option<H256>,
) -> H256 {
    let fork_version = fork_version.unwrap_or(config.genesis_fork_version);
    let genesis_validators_root = genesis_validators_root.unwrap_or(H256::ZERO);
    let fork_data_root = compute_fork_data_root(fork_version, genesis_validators_root);

    let mut domain = H256::ZERO;
    let (type_bytes, root_bytes) = domain.0.split_at_mut(domain_type.len());
    type_bytes.copy_from_slice(&domain_type);
    root_bytes.copy_from_slice(&fork_data_root[..root_bytes.len()]);
    domain
}

#[must_use]
pub fn compute_signing_root(object: &impl TreeHash, domain: H256) -> H256 {
    SigningData {
        object_root: object.tree_hash_root(),
        domain,
    }
    .tree_hash_root()
}

pub fn compute_shuffled_index<P: Preset>(
    index: ValidatorIndex,
    index_count: u64,
    seed: H256,
) -> Result<ValidatorIndex> {
    shuffling::shuffle_single::<P>(index, index_count, seed).map_err(Into::into)
}

pub fn compute_proposer_index<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    indices: &[ValidatorIndex],
    seed: H256,
) -> Result<ValidatorIndex> {
    let total = indices
        .len()
        .try_conv::<u64>()?
        .pipe(NonZeroU64::new)
        .ok_or(Error::NoActiveValidators)?
        .get();

    let max_random_byte = u64::from(u8::MAX);
    let bytes_per_hash = core::mem::size_of::<H256>() as u64;

    for quotient in 0..u64::MAX / bytes_per_hash {
        let random_bytes = hashing::hash_256_64(seed, quotient);

        for (remainder, random_byte) in (0..).zip(random_bytes.iter().copied().map(u64::from)) {
            let attempt = quotient * bytes_per_hash + remainder;
            let shuffled_index = compute_shuffled_index::<P>(attempt % total, total, seed)?
                .try_conv::<usize>()?;

            let candidate_index = *indices
                .get(shuffled_index)
                .expect("compute_shuffled_index returns a value less than indices.len()");

            let effective_balance = state.validators().get(candidate_index)?.effective_balance;

            if effective_balance * max_random_byte >= P::MAX_EFFECTIVE_BALANCE * random_byte {
                return Ok(candidate_index);
            }
        }
    }

    Err(Error::FailedToSelectProposer.into())
}

/// Returns committee `index` out of `count` committees made from `indices` shuffled with `seed`.
///
/// This shuffles the whole list. State accessors slice a cached shuffled list instead.
pub fn compute_committee<P: Preset>(
    indices: &[ValidatorIndex],
    seed: H256,
    index: u64,
    count: u64,
) -> Result<Vec<ValidatorIndex>> {
    ensure!(
        index < count,
        Error::CommitteeIndexOutOfBounds {
            index,
            committee_count: count,
        },
    );

    let length = indices.len().try_conv::<u64>()?;
    let start = length
        .mul_div(index, count)
        .expect("count is nonzero and index < count, so the quotient is at most length");
    let end = length
        .mul_div(index + 1, count)
        .expect("count is nonzero and index < count, so the quotient is at most length");

    let mut shuffled = indices.to_vec();
    shuffling::shuffle_slice::<P, _>(&mut shuffled, seed)?;

    shuffled
        .get(start.try_conv::<usize>()?..end.try_conv::<usize>()?)
        .map(<[_]>::to_vec)
        .ok_or_else(|| {
            Error::CommitteeIndexOutOfBounds {
                index,
                committee_count: count,
            }
            .into()
        })
}

#[must_use]
pub fn compute_timestamp_at_slot<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
    slot: Slot,
) -> UnixSeconds {
    let slots_since_genesis = slot - GENESIS_SLOT;
    state.genesis_time() + slots_since_genesis * config.seconds_per_slot.get()
}

#[must_use]
pub fn committee_count_from_active_validator_count<P: Preset>(active_validator_count: u64) -> u64 {
    active_validator_count
        .div_typenum::<P::SlotsPerEpoch>()
        .div(P::TARGET_COMMITTEE_SIZE)
        .clamp(1, P::MAX_COMMITTEES_PER_SLOT.get())
}

/// Checks that the logical length of `aggregation_bits` equals the size of its committee.
///
/// `BitList::len` excludes the sentinel bit of the SSZ encoding.
pub fn verify_attestation_bitfield_lengths<N: typenum::Unsigned + Clone>(
    aggregation_bits: &BitList<N>,
    committee_length: usize,
) -> Result<()> {
    let aggregation_bitlist_length = aggregation_bits.len();

    ensure!(
        aggregation_bitlist_length == committee_length,
        Error::CommitteeLengthMismatch {
            aggregation_bitlist_length,
            committee_length,
        },
    );

    Ok(())
}

#[must_use]
pub fn dilithium_withdrawal_credentials(public_key: &PublicKeyBytes) -> H256 {
    let mut withdrawal_credentials = hashing::hash_bytes(public_key);
    withdrawal_credentials[0] = DILITHIUM_WITHDRAWAL_PREFIX;
    withdrawal_credentials
}

#[must_use]
pub fn eth1_address_withdrawal_credentials(address: ExecutionAddress) -> H256 {
    let mut withdrawal_credentials = H256::ZERO;
    let address_start = withdrawal_credentials.len() - address.len();

    withdrawal_credentials[0] = ETH1_ADDRESS_WITHDRAWAL_PREFIX;
    withdrawal_credentials[address_start..].copy_from_slice(address.as_slice());
    withdrawal_credentials
}

#[must_use]
pub fn kzg_commitment_to_versioned_hash(kzg_commitment: &KzgCommitment) -> VersionedHash {
    let mut versioned_hash = hashing::hash_bytes(&kzg_commitment[..]);
    versioned_hash[..VERSIONED_HASH_VERSION_KZG.len()].copy_from_slice(&VERSIONED_HASH_VERSION_KZG);
    versioned_hash
}

#[must_use]
pub const fn min_slashing_penalty_quotient<P: Preset>(phase: Phase) -> NonZeroU64 {
    match phase {
        Phase::Phase0 => P::MIN_SLASHING_PENALTY_QUOTIENT,
        Phase::Altair => P::MIN_SLASHING_PENALTY_QUOTIENT_ALTAIR,
        Phase::Bellatrix | Phase::Capella | Phase::Deneb => {
            P::MIN_SLASHING_PENALTY_QUOTIENT_BELLATRIX
        }
    }
}

#[must_use]
pub const fn proportional_slashing_multiplier<P: Preset>(phase: Phase) -> u64 {
    match phase {
        Phase::Phase0 => P::PROPORTIONAL_SLASHING_MULTIPLIER,
        Phase::Altair => P::PROPORTIONAL_SLASHING_MULTIPLIER_ALTAIR,
        Phase::Bellatrix | Phase::Capella | Phase::Deneb => {
            P::PROPORTIONAL_SLASHING_MULTIPLIER_BELLATRIX
        }
    }
}

#[must_use]
pub const fn inactivity_penalty_quotient<P: Preset>(phase: Phase) -> NonZeroU64 {
    match phase {
        Phase::Phase0 => P::INACTIVITY_PENALTY_QUOTIENT,
        Phase::Altair => P::INACTIVITY_PENALTY_QUOTIENT_ALTAIR,
        Phase::Bellatrix | Phase::Capella | Phase::Deneb => {
            P::INACTIVITY_PENALTY_QUOTIENT_BELLATRIX
        }
    }
}

/// Returns the whistleblower reward share paid to the block proposer in `phase`.
#[must_use]
pub fn proposer_share_of_whistleblower_reward<P: Preset>(
    phase: Phase,
    whistleblower_reward: Gwei,
) -> Gwei {
    match phase {
        Phase::Phase0 => whistleblower_reward / P::PROPOSER_REWARD_QUOTIENT,
        Phase::Altair | Phase::Bellatrix | Phase::Capella | Phase::Deneb => {
            whistleblower_reward * PROPOSER_WEIGHT / WEIGHT_DENOMINATOR
        }
    }
}

/// Returns `(proposer_reward, participant_reward)` for one sync committee position.
#[must_use]
pub fn compute_sync_rewards<P: Preset>(total_active_balance: Gwei) -> (Gwei, Gwei) {
    let increment = P::EFFECTIVE_BALANCE_INCREMENT.get();
    let total_active_increments = total_active_balance / increment;

    let base_reward_per_increment = match NonZeroU64::new(total_active_balance.sqrt()) {
        Some(sqrt) => increment * P::BASE_REWARD_FACTOR / sqrt,
        None => 0,
    };

    let total_base_rewards = base_reward_per_increment * total_active_increments;

    let max_participant_rewards = total_base_rewards * SYNC_REWARD_WEIGHT
        / WEIGHT_DENOMINATOR
        / P::SlotsPerEpoch::U64;

    let participant_reward = max_participant_rewards / P::SyncCommitteeSize::U64;

    let proposer_reward =
        participant_reward * PROPOSER_WEIGHT / (WEIGHT_DENOMINATOR.get() - PROPOSER_WEIGHT);

    (proposer_reward, participant_reward)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use test_case::test_case;
    use typenum::U8;
    use types::preset::{Mainnet, Minimal};

    use super::*;

    #[test]
    fn sync_rewards_for_a_single_max_balance() {
        assert_eq!(
            compute_sync_rewards::<Mainnet>(Mainnet::MAX_EFFECTIVE_BALANCE),
            (882, 6176),
        );
    }

    #[test]
    fn sync_rewards_are_zero_without_active_balance() {
        assert_eq!(compute_sync_rewards::<Minimal>(0), (0, 0));
    }

    #[test_case(0 => true)]
    #[test_case(1 => false)]
    #[test_case(7 => false)]
    #[test_case(8 => true)]
    fn epoch_start_in_minimal(slot: Slot) -> bool {
        is_epoch_start::<Minimal>(slot)
    }

    #[test]
    fn previous_slot_saturates_at_genesis() {
        assert_eq!(previous_slot(0), 0);
        assert_eq!(previous_slot(9), 8);
    }

    #[test_case(4, 4 => matches Ok(()))]
    #[test_case(3, 4 => matches Err(_))]
    #[test_case(5, 4 => matches Err(_))]
    fn bitfield_length_must_match_committee(bits: usize, committee_length: usize) -> Result<()> {
        let aggregation_bits = BitList::<U8>::with_capacity(bits).map_err(|error| {
            anyhow::anyhow!("failed to allocate bitlist of length {bits}: {error:?}")
        })?;

        verify_attestation_bitfield_lengths(&aggregation_bits, committee_length)
    }

    #[test]
    fn bitfield_length_error_names_both_lengths() -> Result<()> {
        let aggregation_bits = BitList::<U8>::with_capacity(3)
            .map_err(|error| anyhow::anyhow!("{error:?}"))?;

        let error = verify_attestation_bitfield_lengths(&aggregation_bits, 5)
            .expect_err("length 3 does not match committee of 5");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::CommitteeLengthMismatch {
                aggregation_bitlist_length: 3,
                committee_length: 5,
            }),
        ));

        Ok(())
    }

    #[test]
    fn committees_partition_the_shuffled_indices() -> Result<()> {
        let indices = (0..50).collect::<Vec<_>>();
        let seed = H256::repeat_byte(7);
        let count = 6;

        let committees = (0..count)
            .map(|index| compute_committee::<Minimal>(&indices, seed, index, count))
            .collect::<Result<Vec<_>>>()?;

        let members = committees.iter().flatten().copied().collect::<HashSet<_>>();

        assert_eq!(committees.iter().map(Vec::len).sum::<usize>(), indices.len());
        assert_eq!(members.len(), indices.len());
        assert!(compute_committee::<Minimal>(&indices, seed, count, count).is_err());

        Ok(())
    }

    #[test]
    fn domain_starts_with_domain_type() {
        let config = Config::minimal();
        let domain = compute_domain(&config, [3, 0, 0, 0], None, None);

        assert_eq!(domain[..4], [3, 0, 0, 0]);
        assert_ne!(domain, compute_domain(&config, [4, 0, 0, 0], None, None));
    }

    #[test]
    fn eth1_credentials_end_with_address() {
        let address = ExecutionAddress::repeat_byte(0xaa);
        let credentials = eth1_address_withdrawal_credentials(address);

        assert_eq!(credentials[0], ETH1_ADDRESS_WITHDRAWAL_PREFIX);
        assert_eq!(credentials[1..12], [0; 11]);
        assert_eq!(credentials[12..], [0xaa; 20]);
    }

    #[test]
    fn fork_dependent_quotients_tighten_over_time() {
        assert!(
            min_slashing_penalty_quotient::<Mainnet>(Phase::Phase0)
                > min_slashing_penalty_quotient::<Mainnet>(Phase::Deneb),
        );
        assert_eq!(proportional_slashing_multiplier::<Mainnet>(Phase::Capella), 3);
        assert_eq!(
            inactivity_penalty_quotient::<Mainnet>(Phase::Altair),
            Mainnet::INACTIVITY_PENALTY_QUOTIENT_ALTAIR,
        );
    }
}
