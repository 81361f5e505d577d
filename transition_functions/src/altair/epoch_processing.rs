use anyhow::Result;
use helper_functions::{
    accessors::{get_current_epoch, get_next_sync_committee, total_active_balance},
    predicates::is_in_inactivity_leak,
};
use logging::{debug_with_progress, TRANSITION_LOG_METRICS};
use types::{
    collections::EpochParticipation,
    config::Config,
    nonstandard::Participation,
    phase0::consts::GENESIS_EPOCH,
    preset::Preset,
    traits::{BeaconState, PostAltairBeaconState},
};

use super::epoch_intermediates::{self, AltairValidatorSummary, Statistics};
use crate::unphased;

/// Epoch processing for Altair and Bellatrix.
///
/// Later phases replace the historical accumulator and share the rest through
/// [`process_epoch_with`].
pub fn process_epoch<P: Preset>(
    config: &Config,
    state: &mut impl PostAltairBeaconState<P>,
) -> Result<()> {
    process_epoch_with(config, state, unphased::process_historical_roots_update)
}

pub fn process_epoch_with<P: Preset, S: PostAltairBeaconState<P>>(
    config: &Config,
    state: &mut S,
    process_historical_accumulator: impl FnOnce(&mut S) -> Result<()>,
) -> Result<()> {
    let (statistics, summaries, participation) = epoch_intermediates::statistics(state);

    process_justification_and_finalization(state, statistics)?;

    process_inactivity_updates(
        config,
        state,
        summaries.iter().copied(),
        participation.iter().copied(),
    )?;

    // Deltas depend on the finalized checkpoint and inactivity scores updated above.
    let deltas = epoch_intermediates::epoch_deltas(
        config,
        state,
        statistics,
        summaries,
        participation,
    );

    unphased::process_rewards_and_penalties(state, deltas)?;
    unphased::process_registry_updates(config, state)?;
    unphased::process_slashings(state)?;
    unphased::process_eth1_data_reset(state);
    unphased::process_effective_balance_updates(state);
    unphased::process_slashings_reset(state);
    unphased::process_randao_mixes_reset(state);

    process_historical_accumulator(state)?;
    process_participation_flag_updates(state)?;
    process_sync_committee_updates(state)?;

    state.cache_mut().advance_epoch();

    TRANSITION_LOG_METRICS.record_epoch();

    debug_with_progress!(
        "processed {} epoch ending at slot {}",
        state.phase(),
        state.slot(),
    );

    Ok(())
}

pub fn process_justification_and_finalization<P: Preset>(
    state: &mut impl BeaconState<P>,
    statistics: Statistics,
) -> Result<()> {
    if !unphased::should_process_justification_and_finalization(state) {
        return Ok(());
    }

    unphased::weigh_justification_and_finalization(
        state,
        total_active_balance(state),
        statistics.previous_epoch_target_participating_balance,
        statistics.current_epoch_target_participating_balance,
    )
}

pub fn process_inactivity_updates<P: Preset>(
    config: &Config,
    state: &mut impl PostAltairBeaconState<P>,
    summaries: impl IntoIterator<Item = AltairValidatorSummary>,
    participation: impl IntoIterator<Item = (Participation, Participation)>,
) -> Result<()> {
    // > Skip the genesis epoch as score updates are based on the previous epoch participation
    if get_current_epoch(state) == GENESIS_EPOCH {
        return Ok(());
    }

    let in_inactivity_leak = is_in_inactivity_leak(state);
    let updates = summaries.into_iter().zip(participation).collect::<Vec<_>>();

    anyhow::ensure!(
        updates.len() == state.inactivity_scores().len_usize(),
        "validator summaries do not match inactivity scores",
    );

    let mut updates = updates.into_iter();

    state.inactivity_scores_mut().update(|inactivity_score| {
        let Some((summary, (previous, _))) = updates.next() else {
            return;
        };

        if !summary.eligible_for_penalties {
            return;
        }

        let unslashed_and_participating =
            !summary.slashed && summary.active_in_previous_epoch && previous.matching_target();

        // > Increase the inactivity score of inactive validators
        if unslashed_and_participating {
            *inactivity_score = inactivity_score.saturating_sub(1);
        } else {
            *inactivity_score += config.inactivity_score_bias.get();
        }

        // > Decrease the inactivity score of all eligible validators during a leak-free epoch
        if !in_inactivity_leak {
            *inactivity_score =
                inactivity_score.saturating_sub(config.inactivity_score_recovery_rate);
        }
    });

    Ok(())
}

pub fn process_participation_flag_updates<P: Preset>(
    state: &mut impl PostAltairBeaconState<P>,
) -> Result<()> {
    // > Rotate current/previous epoch participation
    let zero_participation = EpochParticipation::<P>::repeat_default(state.validators().len_usize())?;

    *state.previous_epoch_participation_mut() =
        core::mem::replace(state.current_epoch_participation_mut(), zero_participation);

    Ok(())
}

pub fn process_sync_committee_updates<P: Preset>(
    state: &mut impl PostAltairBeaconState<P>,
) -> Result<()> {
    let next_epoch = get_current_epoch(state) + 1;

    if next_epoch % P::EPOCHS_PER_SYNC_COMMITTEE_PERIOD == 0 {
        let committee = get_next_sync_committee(state)?;

        *state.current_sync_committee_mut() =
            core::mem::replace(state.next_sync_committee_mut(), committee);
    }

    Ok(())
}
