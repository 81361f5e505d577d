use core::ops::Range;

use anyhow::Result;
use arithmetic::U64Ext as _;
use helper_functions::{
    accessors::{
        absolute_epoch, get_block_root, get_current_epoch, get_next_epoch, get_randao_mix,
        get_validator_activation_churn_limit, get_validator_churn_limit, total_active_balance,
    },
    misc::{compute_activation_exit_epoch, proportional_slashing_multiplier},
    mutators::{balance, decrease_balance, increase_balance, initiate_validator_exit},
    predicates::{
        is_active_validator, is_eligible_for_activation, is_eligible_for_activation_queue,
    },
};
use itertools::Itertools as _;
use tree_hash::TreeHash as _;
use typenum::Unsigned as _;
use types::{
    collections::Eth1DataVotes,
    config::Config,
    nonstandard::AttestationEpoch,
    phase0::{
        consts::GENESIS_EPOCH,
        containers::{Checkpoint, HistoricalBatch},
        primitives::Gwei,
    },
    preset::Preset,
    traits::BeaconState,
};

use crate::unphased::EpochDeltas;

/// Applies one set of deltas per validator, in registry order.
pub fn process_rewards_and_penalties<P: Preset>(
    state: &mut (impl BeaconState<P> + ?Sized),
    deltas: impl IntoIterator<Item = impl EpochDeltas>,
) -> Result<()> {
    if !should_process_rewards_and_penalties(state) {
        return Ok(());
    }

    let mut deltas = deltas.into_iter();
    let mut result = Ok(());

    state.balances_mut().update(|balance| {
        let deltas = deltas
            .next()
            .expect("deltas should have as many elements as there are validators");

        if result.is_ok() {
            result = increase_balance(balance, deltas.combined_reward());
        }

        decrease_balance(balance, deltas.combined_penalty());
    });

    result
}

pub fn process_registry_updates<P: Preset>(
    config: &Config,
    state: &mut (impl BeaconState<P> + ?Sized),
) -> Result<()> {
    let current_epoch = get_current_epoch(state);
    let next_epoch = get_next_epoch(state);

    // The indices collected in these do not overlap.
    let mut eligible_for_activation_queue = vec![];
    let mut ejections = vec![];
    let mut activation_queue = vec![];

    for (validator, validator_index) in state.validators().iter().zip(0..) {
        if is_eligible_for_activation_queue::<P>(validator) {
            eligible_for_activation_queue.push(validator_index);
        }

        if is_active_validator(validator, current_epoch)
            && validator.effective_balance <= config.ejection_balance
        {
            ejections.push(validator_index);
        }

        if is_eligible_for_activation(state, validator) {
            activation_queue.push((validator_index, validator.activation_eligibility_epoch));
        }
    }

    // > Process activation eligibility and ejections
    for validator_index in eligible_for_activation_queue {
        state
            .validators_mut()
            .get_mut(validator_index)?
            .activation_eligibility_epoch = next_epoch;
    }

    for validator_index in ejections {
        initiate_validator_exit(config, state, validator_index)?;
    }

    // > Queue validators eligible for activation and not yet dequeued for activation
    let activation_queue = activation_queue
        .into_iter()
        // > Order by the sequence of activation_eligibility_epoch setting and then index
        .sorted_unstable_by_key(|&(validator_index, activation_eligibility_epoch)| {
            (activation_eligibility_epoch, validator_index)
        })
        .map(|(validator_index, _)| validator_index);

    // > Dequeued validators for activation up to churn limit
    let churn_limit = if state.is_post_deneb() {
        get_validator_activation_churn_limit(config, state)
    } else {
        get_validator_churn_limit(config, state)
    };

    let activation_exit_epoch = compute_activation_exit_epoch::<P>(current_epoch);

    for validator_index in activation_queue.take(churn_limit.try_into()?) {
        state
            .validators_mut()
            .get_mut(validator_index)?
            .activation_epoch = activation_exit_epoch;
    }

    Ok(())
}

pub fn process_slashings<P: Preset>(state: &mut (impl BeaconState<P> + ?Sized)) -> Result<()> {
    let current_epoch = get_current_epoch(state);
    let total_balance = total_active_balance(state);
    let multiplier = proportional_slashing_multiplier::<P>(state.phase());

    let adjusted_total_slashing_balance = state
        .slashings()
        .iter()
        .sum::<Gwei>()
        .saturating_mul(multiplier)
        .min(total_balance);

    let increment = P::EFFECTIVE_BALANCE_INCREMENT;
    let target_withdrawable_epoch = current_epoch + P::EpochsPerSlashingsVector::U64 / 2;

    let penalties = state
        .validators()
        .iter()
        .zip(0..)
        .filter(|(validator, _)| {
            validator.slashed && validator.withdrawable_epoch == target_withdrawable_epoch
        })
        .map(|(validator, validator_index)| {
            // > Factored out from penalty numerator to avoid uint64 overflow
            let penalty = (validator.effective_balance / increment)
                .mul_div(adjusted_total_slashing_balance, total_balance)
                .expect("adjusted total slashing balance is at most the total balance")
                * increment.get();

            (validator_index, penalty)
        })
        .collect_vec();

    for (validator_index, penalty) in penalties {
        decrease_balance(balance(state, validator_index)?, penalty);
    }

    Ok(())
}

pub fn process_eth1_data_reset<P: Preset>(state: &mut (impl BeaconState<P> + ?Sized)) {
    // > Reset eth1 data votes
    if (state.slot() + 1).mod_typenum::<P::SlotsPerEth1VotingPeriod>() == 0 {
        *state.eth1_data_votes_mut() = Eth1DataVotes::<P>::default();
    }
}

pub fn process_effective_balance_updates<P: Preset>(state: &mut (impl BeaconState<P> + ?Sized)) {
    let hysteresis_increment = P::EFFECTIVE_BALANCE_INCREMENT.get() / P::HYSTERESIS_QUOTIENT;
    let downward_threshold = hysteresis_increment * P::HYSTERESIS_DOWNWARD_MULTIPLIER;
    let upward_threshold = hysteresis_increment * P::HYSTERESIS_UPWARD_MULTIPLIER;

    let (validators, balances) = state.validators_mut_with_balances();
    let mut balances = balances.iter().copied();

    // > Update effective balances with hysteresis
    validators.update(|validator| {
        let balance = balances
            .next()
            .expect("list of validators and list of balances should have the same length");

        let below = balance.saturating_add(downward_threshold) < validator.effective_balance;
        let above = validator.effective_balance.saturating_add(upward_threshold) < balance;

        if below || above {
            validator.effective_balance = balance
                .prev_multiple_of(P::EFFECTIVE_BALANCE_INCREMENT)
                .min(P::MAX_EFFECTIVE_BALANCE);
        }
    });
}

pub fn process_slashings_reset<P: Preset>(state: &mut (impl BeaconState<P> + ?Sized)) {
    let next_epoch = get_next_epoch(state);

    // > Reset slashings
    *state.slashings_mut().mod_index_mut(next_epoch) = 0;
}

pub fn process_randao_mixes_reset<P: Preset>(state: &mut (impl BeaconState<P> + ?Sized)) {
    let current_epoch = get_current_epoch(state);
    let next_epoch = get_next_epoch(state);

    // > Set randao mix
    *state.randao_mixes_mut().mod_index_mut(next_epoch) = get_randao_mix(state, current_epoch);
}

/// Returns `true` at the end of every `SLOTS_PER_HISTORICAL_ROOT` slots.
pub fn is_historical_accumulator_boundary<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
) -> bool {
    let epochs_per_historical_root = P::SlotsPerHistoricalRoot::U64 / P::SlotsPerEpoch::U64;
    get_next_epoch(state) % epochs_per_historical_root == 0
}

pub fn process_historical_roots_update<P: Preset>(
    state: &mut (impl BeaconState<P> + ?Sized),
) -> Result<()> {
    // > Set historical root accumulator
    if is_historical_accumulator_boundary(state) {
        let historical_batch = HistoricalBatch::<P> {
            block_roots: state.block_roots().clone(),
            state_roots: state.state_roots().clone(),
        };

        state
            .historical_roots_mut()
            .push(historical_batch.tree_hash_root())?;
    }

    Ok(())
}

pub fn weigh_justification_and_finalization<P: Preset>(
    state: &mut (impl BeaconState<P> + ?Sized),
    current_epoch_active_balance: Gwei,
    previous_epoch_target_balance: Gwei,
    current_epoch_target_balance: Gwei,
) -> Result<()> {
    let old_previous_justified_checkpoint = state.previous_justified_checkpoint();
    let old_current_justified_checkpoint = state.current_justified_checkpoint();

    // > Process justifications
    *state.previous_justified_checkpoint_mut() = state.current_justified_checkpoint();

    state
        .justification_bits_mut()
        .shift_up(1)
        .expect("justification bits have 4 elements");

    for (attestation_epoch, bit, target_balance) in [
        (AttestationEpoch::Previous, 1, previous_epoch_target_balance),
        (AttestationEpoch::Current, 0, current_epoch_target_balance),
    ] {
        if u128::from(target_balance) * 3 >= u128::from(current_epoch_active_balance) * 2 {
            let root = get_block_root(state, attestation_epoch)?;

            *state.current_justified_checkpoint_mut() = Checkpoint {
                epoch: absolute_epoch(state, attestation_epoch.into()),
                root,
            };

            state
                .justification_bits_mut()
                .set(bit, true)
                .expect("justification bits have 4 elements");
        }
    }

    // > Process finalizations
    let bits = state.justification_bits();
    let all_set = |range: Range<usize>| {
        range
            .into_iter()
            .all(|bit| bits.get(bit).unwrap_or(false))
    };
    let current_epoch = get_current_epoch(state);

    let mut finalized_checkpoint = None;

    // > The 2nd/3rd/4th most recent epochs are justified, the 2nd using the 4th as source
    if all_set(1..4) && old_previous_justified_checkpoint.epoch + 3 == current_epoch {
        finalized_checkpoint = Some(old_previous_justified_checkpoint);
    }

    // > The 2nd/3rd most recent epochs are justified, the 2nd using the 3rd as source
    if all_set(1..3) && old_previous_justified_checkpoint.epoch + 2 == current_epoch {
        finalized_checkpoint = Some(old_previous_justified_checkpoint);
    }

    // > The 1st/2nd/3rd most recent epochs are justified, the 1st using the 3rd as source
    if all_set(0..3) && old_current_justified_checkpoint.epoch + 2 == current_epoch {
        finalized_checkpoint = Some(old_current_justified_checkpoint);
    }

    // > The 1st/2nd most recent epochs are justified, the 1st using the 2nd as source
    if all_set(0..2) && old_current_justified_checkpoint.epoch + 1 == current_epoch {
        finalized_checkpoint = Some(old_current_justified_checkpoint);
    }

    if let Some(checkpoint) = finalized_checkpoint {
        *state.finalized_checkpoint_mut() = checkpoint;
    }

    Ok(())
}

pub fn should_process_justification_and_finalization<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
) -> bool {
    // > Initial FFG checkpoint values have a `0x00` stub for `root`.
    // > Skip FFG updates in the first two epochs to avoid
    // > corner cases that might result in modifying this stub.
    GENESIS_EPOCH + 1 < get_current_epoch(state)
}

pub fn should_process_rewards_and_penalties<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
) -> bool {
    // > No rewards are applied at the end of `GENESIS_EPOCH`
    // > because rewards are for work done in the previous epoch
    GENESIS_EPOCH < get_current_epoch(state)
}

#[cfg(test)]
mod tests {
    use types::{
        collections::{Balances, Validators},
        phase0::{
            beacon_state::BeaconState as Phase0BeaconState, consts::FAR_FUTURE_EPOCH,
            containers::Validator, primitives::H256,
        },
        preset::Minimal,
    };

    use crate::unphased::CombinedDeltas;

    use super::*;

    fn validator(effective_balance: Gwei) -> Validator {
        Validator {
            effective_balance,
            activation_epoch: 0,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            ..Validator::default()
        }
    }

    fn state_at_end_of_epoch(
        epoch: u64,
        balances: &[Gwei],
    ) -> Result<Phase0BeaconState<Minimal>> {
        let slots_per_epoch = <Minimal as Preset>::SlotsPerEpoch::U64;

        Ok(Phase0BeaconState {
            slot: (epoch + 1) * slots_per_epoch - 1,
            validators: Validators::<Minimal>::try_from_iter(
                balances
                    .iter()
                    .map(|_| validator(Minimal::MAX_EFFECTIVE_BALANCE)),
            )?,
            balances: Balances::<Minimal>::try_from_iter(balances.iter().copied())?,
            ..Phase0BeaconState::default()
        })
    }

    #[test]
    fn rewards_are_not_applied_in_genesis_epoch() -> Result<()> {
        let mut state = state_at_end_of_epoch(0, &[10, 10])?;

        let deltas = [CombinedDeltas {
            reward: 5,
            penalty: 1,
        }; 2];

        process_rewards_and_penalties(&mut state, deltas)?;

        itertools::assert_equal(state.balances.iter().copied(), [10, 10]);

        Ok(())
    }

    #[test]
    fn penalties_saturate_at_zero() -> Result<()> {
        let mut state = state_at_end_of_epoch(1, &[10, 10])?;

        let deltas = [
            CombinedDeltas {
                reward: 5,
                penalty: 1,
            },
            CombinedDeltas {
                reward: 0,
                penalty: 100,
            },
        ];

        process_rewards_and_penalties(&mut state, deltas)?;

        itertools::assert_equal(state.balances.iter().copied(), [14, 0]);

        Ok(())
    }

    #[test]
    fn effective_balance_follows_balance_with_hysteresis() -> Result<()> {
        let increment = Minimal::EFFECTIVE_BALANCE_INCREMENT.get();
        let max = Minimal::MAX_EFFECTIVE_BALANCE;

        // A quarter of an increment below is within the downward threshold.
        let mut state = state_at_end_of_epoch(1, &[max - increment / 4, max - 2 * increment])?;

        process_effective_balance_updates(&mut state);

        assert_eq!(state.validators.get(0)?.effective_balance, max);
        assert_eq!(state.validators.get(1)?.effective_balance, max - 2 * increment);

        Ok(())
    }

    #[test]
    fn low_balance_validator_is_ejected() -> Result<()> {
        let config = Config::minimal();
        let mut state = state_at_end_of_epoch(1, &[0; 8])?;

        state.validators.get_mut(3)?.effective_balance = config.ejection_balance;

        process_registry_updates(&config, &mut state)?;

        assert_ne!(state.validators.get(3)?.exit_epoch, FAR_FUTURE_EPOCH);
        assert_eq!(state.validators.get(2)?.exit_epoch, FAR_FUTURE_EPOCH);

        Ok(())
    }

    #[test]
    fn activation_queue_is_ordered_by_eligibility_epoch() -> Result<()> {
        let config = Config::minimal();
        let mut state = state_at_end_of_epoch(10, &[0; 8])?;

        state.finalized_checkpoint.epoch = 9;

        for (validator_index, eligibility_epoch) in [(5, 3), (6, 2)] {
            let validator = state.validators.get_mut(validator_index)?;
            validator.activation_epoch = FAR_FUTURE_EPOCH;
            validator.activation_eligibility_epoch = eligibility_epoch;
        }

        process_registry_updates(&config, &mut state)?;

        let activation_exit_epoch = compute_activation_exit_epoch::<Minimal>(10);

        // The minimum churn limit admits both validators.
        assert_eq!(state.validators.get(5)?.activation_epoch, activation_exit_epoch);
        assert_eq!(state.validators.get(6)?.activation_epoch, activation_exit_epoch);

        Ok(())
    }

    #[test]
    fn slashed_validator_is_penalized_at_half_of_slashings_vector() -> Result<()> {
        let increment = Minimal::EFFECTIVE_BALANCE_INCREMENT.get();
        let max = Minimal::MAX_EFFECTIVE_BALANCE;
        let mut state = state_at_end_of_epoch(1, &[max; 4])?;

        let half = <Minimal as Preset>::EpochsPerSlashingsVector::U64 / 2;

        let validator = state.validators.get_mut(0)?;
        validator.slashed = true;
        validator.withdrawable_epoch = 1 + half;

        *state.slashings.mod_index_mut(1) = max;

        process_slashings(&mut state)?;

        // Phase 0 multiplier is 1, so the penalty is a quarter of the effective balance.
        assert_eq!(*state.balances.get(0)?, max - (max / increment / 4) * increment);
        assert_eq!(*state.balances.get(1)?, max);

        Ok(())
    }

    #[test]
    fn justification_with_supermajority_finalizes_previous_checkpoint() -> Result<()> {
        let mut state = state_at_end_of_epoch(3, &[])?;

        let checkpoint = Checkpoint {
            epoch: 2,
            root: H256::repeat_byte(2),
        };

        state.current_justified_checkpoint = checkpoint;
        state.justification_bits.set(0, true).expect("index is in bounds");

        // Previous and current epoch targets are both supported.
        weigh_justification_and_finalization(&mut state, 300, 200, 200)?;

        assert_eq!(state.finalized_checkpoint, checkpoint);
        assert_eq!(state.previous_justified_checkpoint, checkpoint);
        assert_eq!(state.current_justified_checkpoint.epoch, 3);

        Ok(())
    }

    #[test]
    fn randao_mix_is_carried_into_next_epoch() -> Result<()> {
        let mut state = state_at_end_of_epoch(1, &[])?;
        *state.randao_mixes.mod_index_mut(1) = H256::repeat_byte(9);

        process_randao_mixes_reset(&mut state);

        assert_eq!(*state.randao_mixes.mod_index(2), H256::repeat_byte(9));

        Ok(())
    }
}
