use anyhow::Result;
use helper_functions::{
    accessors::{attestation_epoch, get_beacon_proposer_index},
    verifier::Verifier,
};
use types::{
    config::Config,
    nonstandard::AttestationEpoch,
    phase0::{
        beacon_state::BeaconState,
        containers::{Attestation, BeaconBlock, BeaconBlockBody, PendingAttestation},
    },
    preset::Preset,
};

use crate::unphased;

pub fn process_block<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    block: &BeaconBlock<P>,
    mut verifier: impl Verifier,
) -> Result<()> {
    verifier.reserve(unphased::count_base_signatures(block) - 1);
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

    process_operations(config, state, &block.body, verifier)
}

fn process_operations<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    body: &BeaconBlockBody<P>,
    mut verifier: impl Verifier,
) -> Result<()> {
    // > Verify that outstanding deposits are processed up to the maximum number of deposits
    unphased::validate_deposit_count(state, body)?;

    for proposer_slashing in body.proposer_slashings.iter().copied() {
        unphased::process_proposer_slashing(config, state, proposer_slashing, &mut verifier)?;
    }

    for attester_slashing in body.attester_slashings.iter() {
        unphased::process_attester_slashing(config, state, attester_slashing, &mut verifier)?;
    }

    unphased::validate_attestations(config, state, body.attestations.iter(), &mut verifier)?;

    for attestation in body.attestations.iter() {
        apply_attestation(state, attestation)?;
    }

    for deposit in body.deposits.iter() {
        unphased::process_deposit(config, state, deposit)?;
    }

    for voluntary_exit in body.voluntary_exits.iter().copied() {
        unphased::process_voluntary_exit(config, state, voluntary_exit, &mut verifier)?;
    }

    Ok(())
}

/// Records an attestation that has already been validated.
pub fn apply_attestation<P: Preset>(
    state: &mut BeaconState<P>,
    attestation: &Attestation<P>,
) -> Result<()> {
    let data = attestation.data;

    let pending_attestation = PendingAttestation {
        aggregation_bits: attestation.aggregation_bits.clone(),
        data,
        inclusion_delay: state.slot - data.slot,
        proposer_index: get_beacon_proposer_index(state)?,
    };

    let attestations = match attestation_epoch(state, data.target.epoch)? {
        AttestationEpoch::Previous => &mut state.previous_epoch_attestations,
        AttestationEpoch::Current => &mut state.current_epoch_attestations,
    };

    attestations.push(pending_attestation)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use ssz_types::BitList;
    use types::{
        collections::{Balances, Validators},
        phase0::{
            consts::FAR_FUTURE_EPOCH,
            containers::{AttestationData, Checkpoint, Validator},
        },
        preset::Minimal,
    };

    use super::*;

    fn state_at_slot(slot: u64) -> Result<BeaconState<Minimal>> {
        let validator = Validator {
            effective_balance: Minimal::MAX_EFFECTIVE_BALANCE,
            activation_epoch: 0,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            ..Validator::default()
        };

        Ok(BeaconState {
            slot,
            validators: Validators::<Minimal>::try_from_iter(core::iter::repeat_n(validator, 16))?,
            balances: Balances::<Minimal>::try_from_iter(core::iter::repeat_n(
                Minimal::MAX_EFFECTIVE_BALANCE,
                16,
            ))?,
            ..BeaconState::default()
        })
    }

    fn attestation_at_slot(slot: u64, target_epoch: u64) -> Result<Attestation<Minimal>> {
        Ok(Attestation {
            aggregation_bits: BitList::with_capacity(2)
                .map_err(|error| anyhow::anyhow!("{error:?}"))?,
            data: AttestationData {
                slot,
                target: Checkpoint {
                    epoch: target_epoch,
                    ..Checkpoint::default()
                },
                ..AttestationData::default()
            },
            signatures: ssz_types::VariableList::default(),
        })
    }

    #[test]
    fn attestations_are_recorded_by_target_epoch() -> Result<()> {
        let mut state = state_at_slot(10)?;

        apply_attestation(&mut state, &attestation_at_slot(9, 1)?)?;
        apply_attestation(&mut state, &attestation_at_slot(6, 0)?)?;

        assert_eq!(state.current_epoch_attestations.len_usize(), 1);
        assert_eq!(state.previous_epoch_attestations.len_usize(), 1);

        let recorded = state.current_epoch_attestations.get(0)?;

        assert_eq!(recorded.inclusion_delay, 1);
        assert_eq!(recorded.proposer_index, get_beacon_proposer_index(&state)?);

        let recorded = state.previous_epoch_attestations.get(0)?;

        assert_eq!(recorded.inclusion_delay, 4);

        Ok(())
    }
}
