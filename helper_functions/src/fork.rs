use core::ops::BitOrAssign as _;
use std::sync::Arc;

use anyhow::Result;
use itertools::Itertools as _;
use logging::info_with_progress;
use types::{
    altair::beacon_state::BeaconState as AltairBeaconState,
    bellatrix::{
        beacon_state::BeaconState as BellatrixBeaconState,
        containers::ExecutionPayloadHeader as BellatrixExecutionPayloadHeader,
    },
    capella::{
        beacon_state::BeaconState as CapellaBeaconState,
        containers::ExecutionPayloadHeader as CapellaExecutionPayloadHeader,
    },
    collections::{EpochParticipation, HistoricalSummaries, InactivityScores},
    config::Config,
    deneb::{
        beacon_state::BeaconState as DenebBeaconState,
        containers::ExecutionPayloadHeader as DenebExecutionPayloadHeader,
    },
    phase0::{
        beacon_state::BeaconState as Phase0BeaconState,
        containers::{Fork, PendingAttestation},
        primitives::H256,
    },
    preset::Preset,
};

use crate::accessors;

pub fn upgrade_to_altair<P: Preset>(
    config: &Config,
    pre: Phase0BeaconState<P>,
) -> Result<AltairBeaconState<P>> {
    let epoch = accessors::get_current_epoch(&pre);

    let Phase0BeaconState {
        genesis_time,
        genesis_validators_root,
        slot,
        fork,
        latest_block_header,
        block_roots,
        state_roots,
        historical_roots,
        eth1_data,
        eth1_data_votes,
        eth1_deposit_index,
        validators,
        balances,
        randao_mixes,
        slashings,
        previous_epoch_attestations,
        current_epoch_attestations: _,
        justification_bits,
        previous_justified_checkpoint,
        current_justified_checkpoint,
        finalized_checkpoint,
        cache,
    } = pre;

    let fork = Fork {
        previous_version: fork.current_version,
        current_version: config.altair_fork_version,
        epoch,
    };

    let zero_participation = EpochParticipation::<P>::repeat_default(validators.len_usize())?;
    let inactivity_scores = InactivityScores::<P>::repeat_default(validators.len_usize())?;

    let mut post = AltairBeaconState {
        genesis_time,
        genesis_validators_root,
        slot,
        fork,
        latest_block_header,
        block_roots,
        state_roots,
        historical_roots,
        eth1_data,
        eth1_data_votes,
        eth1_deposit_index,
        validators,
        balances,
        randao_mixes,
        slashings,
        previous_epoch_participation: zero_participation.clone(),
        current_epoch_participation: zero_participation,
        justification_bits,
        previous_justified_checkpoint,
        current_justified_checkpoint,
        finalized_checkpoint,
        inactivity_scores,
        current_sync_committee: Arc::default(),
        next_sync_committee: Arc::default(),
        cache,
    };

    translate_participation(&mut post, &previous_epoch_attestations)?;

    // The same committee is assigned as both current and next at the fork boundary.
    let sync_committee = accessors::get_next_sync_committee(&post)?;
    post.current_sync_committee = Arc::clone(&sync_committee);
    post.next_sync_committee = sync_committee;

    info_with_progress!("upgraded state to altair at slot {slot}");

    Ok(post)
}

/// Converts pending attestations from the previous epoch into participation flags.
fn translate_participation<'attestations, P: Preset>(
    state: &mut AltairBeaconState<P>,
    pending_attestations: impl IntoIterator<Item = &'attestations PendingAttestation<P>>,
) -> Result<()> {
    for attestation in pending_attestations {
        let PendingAttestation {
            ref aggregation_bits,
            data,
            inclusion_delay,
            ..
        } = *attestation;

        let attesting_indices =
            accessors::get_attesting_indices(state, data, aggregation_bits)?.collect_vec();

        let participation_flags =
            accessors::get_attestation_participation_flags(state, data, inclusion_delay)?;

        for attesting_index in attesting_indices {
            state
                .previous_epoch_participation
                .get_mut(attesting_index)?
                .bitor_assign(participation_flags);
        }
    }

    Ok(())
}

#[must_use]
pub fn upgrade_to_bellatrix<P: Preset>(
    config: &Config,
    pre: AltairBeaconState<P>,
) -> BellatrixBeaconState<P> {
    let epoch = accessors::get_current_epoch(&pre);

    let AltairBeaconState {
        genesis_time,
        genesis_validators_root,
        slot,
        fork,
        latest_block_header,
        block_roots,
        state_roots,
        historical_roots,
        eth1_data,
        eth1_data_votes,
        eth1_deposit_index,
        validators,
        balances,
        randao_mixes,
        slashings,
        previous_epoch_participation,
        current_epoch_participation,
        justification_bits,
        previous_justified_checkpoint,
        current_justified_checkpoint,
        finalized_checkpoint,
        inactivity_scores,
        current_sync_committee,
        next_sync_committee,
        cache,
    } = pre;

    let fork = Fork {
        previous_version: fork.current_version,
        current_version: config.bellatrix_fork_version,
        epoch,
    };

    info_with_progress!("upgraded state to bellatrix at slot {slot}");

    BellatrixBeaconState {
        genesis_time,
        genesis_validators_root,
        slot,
        fork,
        latest_block_header,
        block_roots,
        state_roots,
        historical_roots,
        eth1_data,
        eth1_data_votes,
        eth1_deposit_index,
        validators,
        balances,
        randao_mixes,
        slashings,
        previous_epoch_participation,
        current_epoch_participation,
        justification_bits,
        previous_justified_checkpoint,
        current_justified_checkpoint,
        finalized_checkpoint,
        inactivity_scores,
        current_sync_committee,
        next_sync_committee,
        latest_execution_payload_header: BellatrixExecutionPayloadHeader::default(),
        cache,
    }
}

#[must_use]
pub fn upgrade_to_capella<P: Preset>(
    config: &Config,
    pre: BellatrixBeaconState<P>,
) -> CapellaBeaconState<P> {
    let epoch = accessors::get_current_epoch(&pre);

    let BellatrixBeaconState {
        genesis_time,
        genesis_validators_root,
        slot,
        fork,
        latest_block_header,
        block_roots,
        state_roots,
        historical_roots,
        eth1_data,
        eth1_data_votes,
        eth1_deposit_index,
        validators,
        balances,
        randao_mixes,
        slashings,
        previous_epoch_participation,
        current_epoch_participation,
        justification_bits,
        previous_justified_checkpoint,
        current_justified_checkpoint,
        finalized_checkpoint,
        inactivity_scores,
        current_sync_committee,
        next_sync_committee,
        latest_execution_payload_header,
        cache,
    } = pre;

    let fork = Fork {
        previous_version: fork.current_version,
        current_version: config.capella_fork_version,
        epoch,
    };

    let BellatrixExecutionPayloadHeader {
        parent_hash,
        fee_recipient,
        state_root,
        receipts_root,
        logs_bloom,
        prev_randao,
        block_number,
        gas_limit,
        gas_used,
        timestamp,
        extra_data,
        base_fee_per_gas,
        block_hash,
        transactions_root,
    } = latest_execution_payload_header;

    let latest_execution_payload_header = CapellaExecutionPayloadHeader {
        parent_hash,
        fee_recipient,
        state_root,
        receipts_root,
        logs_bloom,
        prev_randao,
        block_number,
        gas_limit,
        gas_used,
        timestamp,
        extra_data,
        base_fee_per_gas,
        block_hash,
        transactions_root,
        withdrawals_root: H256::ZERO,
    };

    info_with_progress!("upgraded state to capella at slot {slot}");

    CapellaBeaconState {
        genesis_time,
        genesis_validators_root,
        slot,
        fork,
        latest_block_header,
        block_roots,
        state_roots,
        historical_roots,
        eth1_data,
        eth1_data_votes,
        eth1_deposit_index,
        validators,
        balances,
        randao_mixes,
        slashings,
        previous_epoch_participation,
        current_epoch_participation,
        justification_bits,
        previous_justified_checkpoint,
        current_justified_checkpoint,
        finalized_checkpoint,
        inactivity_scores,
        current_sync_committee,
        next_sync_committee,
        latest_execution_payload_header,
        next_withdrawal_index: 0,
        next_withdrawal_validator_index: 0,
        historical_summaries: HistoricalSummaries::<P>::default(),
        cache,
    }
}

#[must_use]
pub fn upgrade_to_deneb<P: Preset>(
    config: &Config,
    pre: CapellaBeaconState<P>,
) -> DenebBeaconState<P> {
    let epoch = accessors::get_current_epoch(&pre);

    let CapellaBeaconState {
        genesis_time,
        genesis_validators_root,
        slot,
        fork,
        latest_block_header,
        block_roots,
        state_roots,
        historical_roots,
        eth1_data,
        eth1_data_votes,
        eth1_deposit_index,
        validators,
        balances,
        randao_mixes,
        slashings,
        previous_epoch_participation,
        current_epoch_participation,
        justification_bits,
        previous_justified_checkpoint,
        current_justified_checkpoint,
        finalized_checkpoint,
        inactivity_scores,
        current_sync_committee,
        next_sync_committee,
        latest_execution_payload_header,
        next_withdrawal_index,
        next_withdrawal_validator_index,
        historical_summaries,
        cache,
    } = pre;

    let fork = Fork {
        previous_version: fork.current_version,
        current_version: config.deneb_fork_version,
        epoch,
    };

    let CapellaExecutionPayloadHeader {
        parent_hash,
        fee_recipient,
        state_root,
        receipts_root,
        logs_bloom,
        prev_randao,
        block_number,
        gas_limit,
        gas_used,
        timestamp,
        extra_data,
        base_fee_per_gas,
        block_hash,
        transactions_root,
        withdrawals_root,
    } = latest_execution_payload_header;

    let latest_execution_payload_header = DenebExecutionPayloadHeader {
        parent_hash,
        fee_recipient,
        state_root,
        receipts_root,
        logs_bloom,
        prev_randao,
        block_number,
        gas_limit,
        gas_used,
        timestamp,
        extra_data,
        base_fee_per_gas,
        block_hash,
        transactions_root,
        withdrawals_root,
        blob_gas_used: 0,
        excess_blob_gas: 0,
    };

    info_with_progress!("upgraded state to deneb at slot {slot}");

    DenebBeaconState {
        genesis_time,
        genesis_validators_root,
        slot,
        fork,
        latest_block_header,
        block_roots,
        state_roots,
        historical_roots,
        eth1_data,
        eth1_data_votes,
        eth1_deposit_index,
        validators,
        balances,
        randao_mixes,
        slashings,
        previous_epoch_participation,
        current_epoch_participation,
        justification_bits,
        previous_justified_checkpoint,
        current_justified_checkpoint,
        finalized_checkpoint,
        inactivity_scores,
        current_sync_committee,
        next_sync_committee,
        latest_execution_payload_header,
        next_withdrawal_index,
        next_withdrawal_validator_index,
        historical_summaries,
        cache,
    }
}

#[cfg(test)]
mod tests {
    use nonzero_ext::nonzero;
    use ssz_types::BitList;
    use types::{
        cache::{Cache, CommitteeCache},
        collections::{Attestations, Balances, Validators},
        phase0::{
            consts::FAR_FUTURE_EPOCH,
            containers::{AttestationData, Validator},
        },
        preset::Minimal,
        traits::BeaconState as _,
    };

    use super::*;

    fn phase0_state(validator_count: usize) -> Result<Phase0BeaconState<Minimal>> {
        let validator = Validator {
            effective_balance: Minimal::MAX_EFFECTIVE_BALANCE,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            ..Validator::default()
        };

        Ok(Phase0BeaconState {
            slot: 16,
            validators: Validators::<Minimal>::try_from_iter(core::iter::repeat_n(
                validator,
                validator_count,
            ))?,
            balances: Balances::<Minimal>::try_from_iter(core::iter::repeat_n(
                Minimal::MAX_EFFECTIVE_BALANCE,
                validator_count,
            ))?,
            ..Phase0BeaconState::default()
        })
    }

    #[test]
    fn altair_upgrade_fills_participation_and_sync_committees() -> Result<()> {
        let config = Config::minimal();
        let pre = phase0_state(16)?;
        let post = upgrade_to_altair(&config, pre)?;

        assert_eq!(post.fork.previous_version, config.genesis_fork_version);
        assert_eq!(post.fork.current_version, config.altair_fork_version);
        assert_eq!(post.fork.epoch, 2);
        assert_eq!(post.previous_epoch_participation.len_usize(), 16);
        assert_eq!(post.inactivity_scores.len_usize(), 16);
        assert_eq!(post.current_sync_committee, post.next_sync_committee);

        Ok(())
    }

    #[test]
    fn altair_upgrade_translates_pending_attestations() -> Result<()> {
        let config = Config::minimal();
        let mut pre = phase0_state(16)?;

        let data = AttestationData {
            slot: 8,
            ..AttestationData::default()
        };

        let committee = accessors::get_beacon_committee(&pre, data.slot, data.index)?.to_vec();
        let mut aggregation_bits = BitList::with_capacity(committee.len())
            .map_err(|error| anyhow::anyhow!("{error:?}"))?;

        aggregation_bits
            .set(0, true)
            .map_err(|error| anyhow::anyhow!("{error:?}"))?;

        pre.previous_epoch_attestations = Attestations::try_from_iter([PendingAttestation {
            aggregation_bits,
            data,
            inclusion_delay: 1,
            proposer_index: 0,
        }])?;

        let post = upgrade_to_altair(&config, pre)?;

        assert_ne!(*post.previous_epoch_participation.get(committee[0])?, 0);
        assert_eq!(
            post.previous_epoch_participation
                .iter()
                .filter(|flags| **flags != 0)
                .count(),
            1,
        );

        Ok(())
    }

    #[test]
    fn upgrades_carry_the_cache_and_rotate_versions() -> Result<()> {
        let config = Config::minimal();
        let committee_cache = Arc::new(CommitteeCache::new(nonzero!(2_usize)));

        let pre = Phase0BeaconState {
            cache: Cache::with_committee_cache(Arc::clone(&committee_cache)),
            ..phase0_state(8)?
        };

        let altair = upgrade_to_altair(&config, pre)?;
        let bellatrix = upgrade_to_bellatrix(&config, altair);
        let capella = upgrade_to_capella(&config, bellatrix);
        let deneb = upgrade_to_deneb(&config, capella);

        assert_eq!(deneb.fork.previous_version, config.capella_fork_version);
        assert_eq!(deneb.fork.current_version, config.deneb_fork_version);
        assert!(deneb.latest_execution_payload_header.withdrawals_root.is_zero());
        assert!(deneb.historical_summaries.is_empty());
        assert!(deneb
            .cache()
            .committee_cache()
            .is_some_and(|cache| Arc::ptr_eq(cache, &committee_cache)));

        Ok(())
    }
}
