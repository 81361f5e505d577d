use anyhow::{ensure, Result};
use bit_field::BitField as _;
use helper_functions::{
    accessors::{
        attestation_epoch, get_attesting_indices, get_attestation_participation_flags,
        get_base_reward, get_base_reward_per_increment, get_beacon_proposer_index,
        get_block_root_at_slot, index_of_public_key, public_key, total_active_balance,
    },
    error::SignatureKind,
    misc::{compute_sync_rewards, previous_slot},
    mutators::{balance, decrease_balance, increase_balance},
    signing::SignForSingleForkAtSlot,
    verifier::{Verifier, VerifierOption},
};
use itertools::Itertools as _;
use types::{
    altair::{
        beacon_state::BeaconState,
        consts::{PARTICIPATION_FLAG_WEIGHTS, PROPOSER_WEIGHT, WEIGHT_DENOMINATOR},
        containers::{BeaconBlock, SyncAggregate},
    },
    config::Config,
    nonstandard::AttestationEpoch,
    phase0::{
        containers::{Attestation, Deposit, DepositData},
        primitives::ValidatorIndex,
    },
    preset::Preset,
    traits::{self, BeaconBlockBody, PostAltairBeaconState},
};

use crate::unphased::{self, DepositOutcome, Error};

pub fn process_block<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    block: &BeaconBlock<P>,
    mut verifier: impl Verifier,
) -> Result<()> {
    verifier.reserve(count_required_signatures(block));
    custom_process_block(config, state, block, &mut verifier)?;
    verifier.finish()
}

pub fn custom_process_block<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    block: &BeaconBlock<P>,
    mut verifier: impl Verifier,
) -> Result<()> {
    debug_assert_eq!(state.slot, block.slot);

    unphased::process_block_header(state, block)?;
    unphased::process_randao(config, state, &block.body, &mut verifier)?;
    unphased::process_eth1_data(state, &block.body)?;

    process_operations(config, state, &block.body, &mut verifier)?;
    process_sync_aggregate(config, state, &block.body.sync_aggregate, verifier)
}

/// Counts the signatures in `block` other than the block signature.
pub fn count_required_signatures<P: Preset>(
    block: &(impl traits::BeaconBlock<P> + ?Sized),
) -> usize {
    let sync_aggregate_signatures = block.body().post_altair().map_or(0, |body| {
        body.sync_aggregate().sync_committee_bits.num_set_bits()
    });

    unphased::count_base_signatures(block) - 1 + sync_aggregate_signatures
}

/// Applies the operations that every phase starting with Altair contains.
pub fn process_operations<P: Preset>(
    config: &Config,
    state: &mut impl PostAltairBeaconState<P>,
    body: &(impl BeaconBlockBody<P> + ?Sized),
    mut verifier: impl Verifier,
) -> Result<()> {
    // > Verify that outstanding deposits are processed up to the maximum number of deposits
    unphased::validate_deposit_count(state, body)?;

    for proposer_slashing in body.proposer_slashings().iter().copied() {
        unphased::process_proposer_slashing(config, state, proposer_slashing, &mut verifier)?;
    }

    for attester_slashing in body.attester_slashings().iter() {
        unphased::process_attester_slashing(config, state, attester_slashing, &mut verifier)?;
    }

    unphased::validate_attestations(config, state, body.attestations().iter(), &mut verifier)?;

    for attestation in body.attestations().iter() {
        apply_attestation(state, attestation)?;
    }

    for deposit in body.deposits().iter() {
        process_deposit(config, state, deposit)?;
    }

    for voluntary_exit in body.voluntary_exits().iter().copied() {
        unphased::process_voluntary_exit(config, state, voluntary_exit, &mut verifier)?;
    }

    Ok(())
}

/// Sets participation flags for an attestation that has already been validated and rewards the
/// proposer for every newly set flag.
pub fn apply_attestation<P: Preset>(
    state: &mut impl PostAltairBeaconState<P>,
    attestation: &Attestation<P>,
) -> Result<()> {
    let Attestation {
        ref aggregation_bits,
        data,
        ..
    } = *attestation;

    // > Participation flag indices
    let inclusion_delay = state.slot() - data.slot;
    let participation_flags = get_attestation_participation_flags(state, data, inclusion_delay)?;

    // > Update epoch participation flags
    let base_reward_per_increment = get_base_reward_per_increment(state);

    let attesting_indices_with_base_rewards = get_attesting_indices(state, data, aggregation_bits)?
        .map(|validator_index| {
            let base_reward = get_base_reward(state, validator_index, base_reward_per_increment)?;
            Ok((validator_index, base_reward))
        })
        .collect::<Result<Vec<_>>>()?;

    let epoch_participation = match attestation_epoch(state, data.target.epoch)? {
        AttestationEpoch::Previous => state.previous_epoch_participation_mut(),
        AttestationEpoch::Current => state.current_epoch_participation_mut(),
    };

    let mut proposer_reward_numerator = 0;

    for (validator_index, base_reward) in attesting_indices_with_base_rewards {
        let epoch_participation = epoch_participation.get_mut(validator_index)?;

        for (flag_index, weight) in PARTICIPATION_FLAG_WEIGHTS {
            if participation_flags.get_bit(flag_index) && !epoch_participation.get_bit(flag_index) {
                proposer_reward_numerator += base_reward * weight;
            }
        }

        *epoch_participation |= participation_flags;
    }

    // > Reward proposer
    let proposer_index = get_beacon_proposer_index(state)?;
    let proposer_reward_denominator =
        (WEIGHT_DENOMINATOR.get() - PROPOSER_WEIGHT) * WEIGHT_DENOMINATOR.get() / PROPOSER_WEIGHT;
    let proposer_reward = proposer_reward_numerator / proposer_reward_denominator;

    increase_balance(balance(state, proposer_index)?, proposer_reward)
}

pub fn process_deposit<P: Preset>(
    config: &Config,
    state: &mut impl PostAltairBeaconState<P>,
    deposit: &Deposit,
) -> Result<DepositOutcome> {
    let outcome = unphased::process_deposit(config, state, deposit)?;
    extend_participation_for_new_validator(state, outcome)?;
    Ok(outcome)
}

/// Applies a deposit without checking its Merkle proof. Used when building genesis states.
pub fn process_deposit_data<P: Preset>(
    config: &Config,
    state: &mut impl PostAltairBeaconState<P>,
    deposit_data: DepositData,
) -> Result<DepositOutcome> {
    let outcome = unphased::process_deposit_data(config, state, deposit_data)?;
    extend_participation_for_new_validator(state, outcome)?;
    Ok(outcome)
}

fn extend_participation_for_new_validator<P: Preset>(
    state: &mut impl PostAltairBeaconState<P>,
    outcome: DepositOutcome,
) -> Result<()> {
    if let DepositOutcome::AddedValidator(_) = outcome {
        state.previous_epoch_participation_mut().push(0)?;
        state.current_epoch_participation_mut().push(0)?;
        state.inactivity_scores_mut().push(0)?;
    }

    Ok(())
}

pub fn process_sync_aggregate<P: Preset>(
    config: &Config,
    state: &mut impl PostAltairBeaconState<P>,
    sync_aggregate: &SyncAggregate<P>,
    verifier: impl Verifier,
) -> Result<()> {
    let committee_indices = current_sync_committee_indices(state)?;

    // > Verify sync committee aggregate signature signing over the previous slot block root
    verify_sync_aggregate_signature(config, state, &committee_indices, sync_aggregate, verifier)?;

    // > Compute participant and proposer rewards
    let (proposer_reward, participant_reward) =
        compute_sync_rewards::<P>(total_active_balance(state));

    // > Apply participant and proposer rewards
    let proposer_index = get_beacon_proposer_index(state)?;
    let mut total_proposer_reward = 0;

    for (participant_index, participation_bit) in committee_indices
        .into_iter()
        .zip(sync_aggregate.sync_committee_bits.iter())
    {
        if participation_bit {
            increase_balance(balance(state, participant_index)?, participant_reward)?;
            total_proposer_reward += proposer_reward;
        } else {
            decrease_balance(balance(state, participant_index)?, participant_reward);
        }
    }

    increase_balance(balance(state, proposer_index)?, total_proposer_reward)
}

/// Resolves the members of `state.current_sync_committee` to validator indices.
pub fn current_sync_committee_indices<P: Preset>(
    state: &(impl PostAltairBeaconState<P> + ?Sized),
) -> Result<Vec<ValidatorIndex>> {
    state
        .current_sync_committee()
        .pubkeys
        .iter()
        .map(|public_key| {
            index_of_public_key(state, public_key).ok_or_else(|| {
                Error::ImpossibleScenarioPubkeyNotInRegistry {
                    public_key: Box::new(*public_key),
                }
                .into()
            })
        })
        .collect()
}

/// Passes one signature per participating sync committee member to `verifier`.
///
/// `committee_indices` are the validator indices of `state.current_sync_committee` members in
/// committee order.
pub fn verify_sync_aggregate_signature<P: Preset, V: Verifier>(
    config: &Config,
    state: &(impl PostAltairBeaconState<P> + ?Sized),
    committee_indices: &[ValidatorIndex],
    sync_aggregate: &SyncAggregate<P>,
    mut verifier: V,
) -> Result<()> {
    if V::IS_NULL || verifier.has_option(VerifierOption::SkipBlockSyncAggregateSignature) {
        return Ok(());
    }

    let SyncAggregate {
        sync_committee_bits,
        sync_committee_signatures,
    } = sync_aggregate;

    let participant_indices = committee_indices
        .iter()
        .copied()
        .zip(sync_committee_bits.iter())
        .filter_map(|(validator_index, bit)| bit.then_some(validator_index))
        .collect_vec();

    ensure!(
        participant_indices.len() == sync_committee_signatures.len(),
        Error::SyncAggregateSignatureCountMismatch {
            signature_count: sync_committee_signatures.len(),
            participant_count: participant_indices.len(),
        },
    );

    // An empty aggregate has nothing to verify.
    if participant_indices.is_empty() {
        return Ok(());
    }

    let signers = participant_indices
        .into_iter()
        .map(|validator_index| Ok((validator_index, public_key(state, validator_index)?)))
        .collect::<Result<Vec<_>>>()?;

    let previous_slot = previous_slot(state.slot());
    let block_root = get_block_root_at_slot(state, previous_slot)?;
    let signing_root =
        SignForSingleForkAtSlot::<P>::signing_root(&block_root, config, state, previous_slot);

    verifier.verify_multiple(
        signing_root,
        sync_committee_signatures,
        signers,
        SignatureKind::SyncAggregate,
    )
}
