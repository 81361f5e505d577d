use arithmetic::U64Ext as _;
use helper_functions::{
    accessors::{
        combined_participation, get_base_reward_per_increment, get_current_epoch,
        get_previous_epoch, total_active_balance,
    },
    misc::inactivity_penalty_quotient,
    predicates::{is_active_validator, is_eligible_for_penalties, is_in_inactivity_leak},
};
use itertools::izip;
use types::{
    altair::consts::{
        TIMELY_HEAD_WEIGHT, TIMELY_SOURCE_WEIGHT, TIMELY_TARGET_WEIGHT, WEIGHT_DENOMINATOR,
    },
    config::Config,
    nonstandard::Participation,
    phase0::{containers::Validator, primitives::Gwei},
    preset::Preset,
    traits::PostAltairBeaconState,
};

use crate::unphased::EpochDeltas;

#[derive(Clone, Copy, Default, Debug)]
pub struct AltairValidatorSummary {
    pub effective_balance: Gwei,
    pub slashed: bool,
    pub active_in_previous_epoch: bool,
    pub eligible_for_penalties: bool,
}

// The active balance in the current epoch is cached in `Cache.total_active_balance`.
#[expect(clippy::struct_field_names)]
#[derive(Clone, Copy, Default, Debug)]
pub struct Statistics {
    pub previous_epoch_source_participating_balance: Gwei,
    pub previous_epoch_target_participating_balance: Gwei,
    pub previous_epoch_head_participating_balance: Gwei,
    pub current_epoch_target_participating_balance: Gwei,
}

impl Statistics {
    fn clamp_balances<P: Preset>(&mut self) {
        for balance in [
            &mut self.previous_epoch_source_participating_balance,
            &mut self.previous_epoch_target_participating_balance,
            &mut self.previous_epoch_head_participating_balance,
            &mut self.current_epoch_target_participating_balance,
        ] {
            *balance = (*balance).max(P::EFFECTIVE_BALANCE_INCREMENT.get());
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct AltairEpochDeltas {
    pub source_reward: Gwei,
    pub source_penalty: Gwei,
    pub target_reward: Gwei,
    pub target_penalty: Gwei,
    pub head_reward: Gwei,
    pub inactivity_penalty: Gwei,
}

impl EpochDeltas for AltairEpochDeltas {
    fn combined_reward(self) -> Gwei {
        self.source_reward + self.target_reward + self.head_reward
    }

    fn combined_penalty(self) -> Gwei {
        self.source_penalty
            .saturating_add(self.target_penalty)
            .saturating_add(self.inactivity_penalty)
    }
}

/// Sums the effective balances of unslashed participants.
///
/// The returned participation is `(previous, current)` for every validator.
pub fn statistics<P: Preset>(
    state: &impl PostAltairBeaconState<P>,
) -> (
    Statistics,
    Vec<AltairValidatorSummary>,
    Vec<(Participation, Participation)>,
) {
    let current_epoch = get_current_epoch(state);
    let previous_epoch = get_previous_epoch(state);
    let participation = combined_participation(state);

    let mut statistics = Statistics::default();

    let summaries = state
        .validators()
        .iter()
        .zip(participation.iter().copied())
        .map(|(validator, (previous, current))| {
            let Validator {
                effective_balance,
                slashed,
                ..
            } = *validator;

            let active_in_previous_epoch = is_active_validator(validator, previous_epoch);

            // Participation only counts for validators that were active in the epoch.
            if !slashed {
                if active_in_previous_epoch {
                    if previous.matching_source() {
                        statistics.previous_epoch_source_participating_balance += effective_balance;
                    }

                    if previous.matching_target() {
                        statistics.previous_epoch_target_participating_balance += effective_balance;
                    }

                    if previous.matching_head() {
                        statistics.previous_epoch_head_participating_balance += effective_balance;
                    }
                }

                if is_active_validator(validator, current_epoch) && current.matching_target() {
                    statistics.current_epoch_target_participating_balance += effective_balance;
                }
            }

            AltairValidatorSummary {
                effective_balance,
                slashed,
                active_in_previous_epoch,
                eligible_for_penalties: is_eligible_for_penalties(validator, previous_epoch),
            }
        })
        .collect();

    statistics.clamp_balances::<P>();

    (statistics, summaries, participation)
}

pub fn epoch_deltas<P: Preset>(
    config: &Config,
    state: &impl PostAltairBeaconState<P>,
    statistics: Statistics,
    summaries: impl IntoIterator<Item = AltairValidatorSummary>,
    participation: impl IntoIterator<Item = (Participation, Participation)>,
) -> Vec<AltairEpochDeltas> {
    let in_inactivity_leak = is_in_inactivity_leak(state);
    let base_reward_per_increment = get_base_reward_per_increment(state);
    let inactivity_penalty_denominator = config.inactivity_score_bias.get()
        * inactivity_penalty_quotient::<P>(state.phase()).get();

    let increment = P::EFFECTIVE_BALANCE_INCREMENT;
    let source_increments = statistics.previous_epoch_source_participating_balance / increment;
    let target_increments = statistics.previous_epoch_target_participating_balance / increment;
    let head_increments = statistics.previous_epoch_head_participating_balance / increment;
    let active_increments = total_active_balance(state) / increment;

    izip!(summaries, participation, state.inactivity_scores().iter())
        .map(|(summary, (previous, _), inactivity_score)| {
            let mut deltas = AltairEpochDeltas::default();

            let AltairValidatorSummary {
                effective_balance,
                slashed,
                eligible_for_penalties,
                ..
            } = summary;

            if !eligible_for_penalties {
                return deltas;
            }

            let base_reward = effective_balance / increment * base_reward_per_increment;

            let component_reward = |weight, participating_increments| {
                if in_inactivity_leak {
                    return 0;
                }

                let reward_numerator = base_reward * weight * participating_increments;
                reward_numerator / (active_increments * WEIGHT_DENOMINATOR.get())
            };

            let component_penalty = |weight| base_reward * weight / WEIGHT_DENOMINATOR;

            if !slashed && previous.matching_source() {
                deltas.source_reward = component_reward(TIMELY_SOURCE_WEIGHT, source_increments);
            } else {
                deltas.source_penalty = component_penalty(TIMELY_SOURCE_WEIGHT);
            }

            if !slashed && previous.matching_target() {
                deltas.target_reward = component_reward(TIMELY_TARGET_WEIGHT, target_increments);
            } else {
                deltas.target_penalty = component_penalty(TIMELY_TARGET_WEIGHT);
                // Saturates at `Gwei::MAX` for very large inactivity scores.
                deltas.inactivity_penalty = effective_balance
                    .mul_div(*inactivity_score, inactivity_penalty_denominator)
                    .unwrap_or(Gwei::MAX);
            }

            // Missing the head vote is not penalized.
            if !slashed && previous.matching_head() {
                deltas.head_reward = component_reward(TIMELY_HEAD_WEIGHT, head_increments);
            }

            deltas
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use test_case::test_case;
    use types::{
        altair::beacon_state::BeaconState,
        collections::{Balances, EpochParticipation, InactivityScores, Validators},
        phase0::consts::FAR_FUTURE_EPOCH,
        preset::Minimal,
    };

    use super::*;

    const VALIDATOR_COUNT: usize = 32;

    fn state_with_participation(
        flags: u8,
        inactivity_score: u64,
    ) -> Result<BeaconState<Minimal>> {
        let validator = Validator {
            effective_balance: Minimal::MAX_EFFECTIVE_BALANCE,
            activation_epoch: 0,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            ..Validator::default()
        };

        Ok(BeaconState {
            // Last slot of epoch 2, so the previous epoch is 1.
            slot: 23,
            validators: Validators::<Minimal>::try_from_iter(core::iter::repeat_n(
                validator,
                VALIDATOR_COUNT,
            ))?,
            balances: Balances::<Minimal>::try_from_iter(core::iter::repeat_n(
                Minimal::MAX_EFFECTIVE_BALANCE,
                VALIDATOR_COUNT,
            ))?,
            previous_epoch_participation: EpochParticipation::<Minimal>::try_from_iter(
                core::iter::repeat_n(flags, VALIDATOR_COUNT),
            )?,
            current_epoch_participation: EpochParticipation::<Minimal>::repeat_default(VALIDATOR_COUNT)?,
            inactivity_scores: InactivityScores::<Minimal>::try_from_iter(core::iter::repeat_n(
                inactivity_score,
                VALIDATOR_COUNT,
            ))?,
            ..BeaconState::default()
        })
    }

    #[test]
    fn full_participation_earns_every_component() -> Result<()> {
        let state = state_with_participation(0b111, 0)?;
        let (statistics, summaries, participation) = statistics(&state);

        assert_eq!(
            statistics.previous_epoch_head_participating_balance,
            Minimal::MAX_EFFECTIVE_BALANCE * VALIDATOR_COUNT as u64,
        );

        let deltas = epoch_deltas(&Config::minimal(), &state, statistics, summaries, participation);

        assert!(deltas.iter().all(|deltas| {
            deltas.source_reward > 0
                && deltas.target_reward > 0
                && deltas.head_reward > 0
                && deltas.combined_penalty() == 0
        }));

        Ok(())
    }

    #[test]
    fn missing_target_incurs_inactivity_penalty() -> Result<()> {
        let state = state_with_participation(0b001, 8)?;
        let (statistics, summaries, participation) = statistics(&state);
        let config = Config::minimal();
        let deltas = epoch_deltas(&config, &state, statistics, summaries, participation);

        let penalty_denominator = config.inactivity_score_bias.get()
            * Minimal::INACTIVITY_PENALTY_QUOTIENT_ALTAIR.get();
        let expected_inactivity_penalty = Minimal::MAX_EFFECTIVE_BALANCE * 8 / penalty_denominator;

        for deltas in deltas {
            assert!(deltas.source_reward > 0);
            assert_eq!(deltas.target_reward, 0);
            assert!(deltas.target_penalty > 0);
            assert_eq!(deltas.head_reward, 0);
            assert_eq!(deltas.inactivity_penalty, expected_inactivity_penalty);
        }

        Ok(())
    }

    #[test_case(1 << 40)]
    #[test_case(u64::MAX)]
    fn inactivity_penalty_for_huge_scores_does_not_overflow(inactivity_score: u64) -> Result<()> {
        let state = state_with_participation(0b001, inactivity_score)?;
        let (statistics, summaries, participation) = statistics(&state);
        let config = Config::minimal();
        let deltas = epoch_deltas(&config, &state, statistics, summaries, participation);

        let penalty_denominator = config.inactivity_score_bias.get()
            * Minimal::INACTIVITY_PENALTY_QUOTIENT_ALTAIR.get();
        let exact_penalty = u128::from(Minimal::MAX_EFFECTIVE_BALANCE)
            * u128::from(inactivity_score)
            / u128::from(penalty_denominator);
        let expected_inactivity_penalty = u64::try_from(exact_penalty).unwrap_or(u64::MAX);

        for deltas in deltas {
            assert_eq!(deltas.inactivity_penalty, expected_inactivity_penalty);
            assert!(deltas.combined_penalty() >= expected_inactivity_penalty);
        }

        Ok(())
    }
}
