use anyhow::Result;
use logging::{debug_with_progress, TRANSITION_LOG_METRICS};
use types::{config::Config, phase0::beacon_state::BeaconState, preset::Preset};

use super::epoch_intermediates::{self, Statistics};
use crate::unphased;

pub fn process_epoch(config: &Config, state: &mut BeaconState<impl Preset>) -> Result<()> {
    let (statistics, summaries, performance) = epoch_intermediates::statistics(state)?;

    process_justification_and_finalization(state, statistics)?;

    let deltas = epoch_intermediates::epoch_deltas(state, statistics, summaries, performance)?;

    unphased::process_rewards_and_penalties(state, deltas)?;
    unphased::process_registry_updates(config, state)?;
    unphased::process_slashings(state)?;
    unphased::process_eth1_data_reset(state);
    unphased::process_effective_balance_updates(state);
    unphased::process_slashings_reset(state);
    unphased::process_randao_mixes_reset(state);
    unphased::process_historical_roots_update(state)?;

    process_participation_record_updates(state);

    state.cache.advance_epoch();

    TRANSITION_LOG_METRICS.record_epoch();
    debug_with_progress!("processed Phase 0 epoch ending at slot {}", state.slot);

    Ok(())
}

pub fn process_justification_and_finalization(
    state: &mut BeaconState<impl Preset>,
    statistics: Statistics,
) -> Result<()> {
    if !unphased::should_process_justification_and_finalization(state) {
        return Ok(());
    }

    unphased::weigh_justification_and_finalization(
        state,
        statistics.current_epoch_active_balance,
        statistics.previous_epoch_target_attesting_balance,
        statistics.current_epoch_target_attesting_balance,
    )
}

fn process_participation_record_updates(state: &mut BeaconState<impl Preset>) {
    // > Rotate current/previous epoch attestations
    state.previous_epoch_attestations = core::mem::take(&mut state.current_epoch_attestations);
}

#[cfg(test)]
mod tests {
    use ssz_types::BitList;
    use types::{
        collections::Attestations,
        phase0::{
            containers::{AttestationData, Checkpoint, PendingAttestation},
            primitives::H256,
        },
        preset::Minimal,
    };

    use super::*;

    #[test]
    fn pending_attestations_are_rotated() -> Result<()> {
        let mut state = BeaconState::<Minimal> {
            slot: 7,
            ..BeaconState::default()
        };

        let attestation = PendingAttestation {
            aggregation_bits: BitList::with_capacity(1)
                .map_err(|error| anyhow::anyhow!("{error:?}"))?,
            data: AttestationData {
                slot: 3,
                target: Checkpoint {
                    epoch: 0,
                    root: H256::repeat_byte(1),
                },
                ..AttestationData::default()
            },
            inclusion_delay: 1,
            proposer_index: 0,
        };

        state.current_epoch_attestations = Attestations::try_from_iter([attestation.clone()])?;

        process_epoch(&Config::minimal(), &mut state)?;

        assert!(state.current_epoch_attestations.is_empty());
        itertools::assert_equal(state.previous_epoch_attestations.iter(), [&attestation]);

        Ok(())
    }
}
