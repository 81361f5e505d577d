use core::num::NonZeroU64;

use anyhow::Result;
use arithmetic::U64Ext as _;
use helper_functions::{
    accessors::{
        get_attesting_indices, get_block_root, get_block_root_at_slot, get_current_epoch,
        get_finality_delay, get_previous_epoch,
    },
    predicates::{is_active_validator, is_eligible_for_penalties, is_in_inactivity_leak},
};
use itertools::{izip, Itertools as _};
use num_integer::Roots as _;
use types::{
    nonstandard::AttestationEpoch,
    phase0::{
        beacon_state::BeaconState,
        consts::BASE_REWARDS_PER_EPOCH,
        containers::{PendingAttestation, Validator},
        primitives::{Gwei, ValidatorIndex},
    },
    preset::Preset,
};

use crate::unphased::EpochDeltas;

/// Attesting balances computed from the pending attestations in a Phase 0 state.
///
/// Every balance is at least `EFFECTIVE_BALANCE_INCREMENT`.
#[expect(clippy::struct_field_names)]
#[derive(Clone, Copy, Default, Debug)]
pub struct Statistics {
    pub previous_epoch_source_attesting_balance: Gwei,
    pub previous_epoch_target_attesting_balance: Gwei,
    pub previous_epoch_head_attesting_balance: Gwei,
    pub current_epoch_active_balance: Gwei,
    pub current_epoch_target_attesting_balance: Gwei,
}

impl Statistics {
    fn accumulate_previous_epoch_attestation(
        &mut self,
        performance: &mut Performance,
        attestation: &PendingAttestation<impl Preset>,
        matching_target: bool,
        matching_head: bool,
        effective_balance: Gwei,
    ) {
        if !performance.previous_epoch_matching_source() {
            self.previous_epoch_source_attesting_balance += effective_balance;
            performance.previous_epoch_match = Match::Source;
        }

        if !performance.previous_epoch_matching_target() && matching_target {
            self.previous_epoch_target_attesting_balance += effective_balance;
            performance.previous_epoch_match = Match::Target;
        }

        if !performance.previous_epoch_matching_head() && matching_target && matching_head {
            self.previous_epoch_head_attesting_balance += effective_balance;
            performance.previous_epoch_match = Match::Head;
        }

        let PendingAttestation {
            inclusion_delay,
            proposer_index,
            ..
        } = *attestation;

        let Some(delay) = NonZeroU64::new(inclusion_delay) else {
            return;
        };

        let inclusion = Inclusion {
            delay,
            proposer_index,
        };

        let fastest = performance
            .previous_epoch_fastest_inclusion
            .get_or_insert(inclusion);

        if delay < fastest.delay {
            *fastest = inclusion;
        }
    }

    fn clamp_balances<P: Preset>(&mut self) {
        for balance in [
            &mut self.previous_epoch_source_attesting_balance,
            &mut self.previous_epoch_target_attesting_balance,
            &mut self.previous_epoch_head_attesting_balance,
            &mut self.current_epoch_active_balance,
            &mut self.current_epoch_target_attesting_balance,
        ] {
            *balance = (*balance).max(P::EFFECTIVE_BALANCE_INCREMENT.get());
        }
    }
}

/// How a single validator voted in the previous and current epochs.
#[derive(Clone, Copy, Default, Debug)]
pub struct Performance {
    previous_epoch_match: Match,
    previous_epoch_fastest_inclusion: Option<Inclusion>,
    current_epoch_matching_target: bool,
}

impl Performance {
    #[must_use]
    pub fn previous_epoch_matching_source(self) -> bool {
        Match::Source <= self.previous_epoch_match
    }

    #[must_use]
    pub fn previous_epoch_matching_target(self) -> bool {
        Match::Target <= self.previous_epoch_match
    }

    #[must_use]
    pub fn previous_epoch_matching_head(self) -> bool {
        Match::Head <= self.previous_epoch_match
    }

    #[must_use]
    pub const fn previous_epoch_fastest_inclusion(self) -> Option<Inclusion> {
        self.previous_epoch_fastest_inclusion
    }

    #[must_use]
    pub const fn current_epoch_matching_target(self) -> bool {
        self.current_epoch_matching_target
    }
}

// Matching a later component implies matching the earlier ones.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Debug)]
enum Match {
    #[default]
    None,
    Source,
    Target,
    Head,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Inclusion {
    pub delay: NonZeroU64,
    pub proposer_index: ValidatorIndex,
}

#[derive(Clone, Copy, Default, Debug)]
pub struct ValidatorSummary {
    pub effective_balance: Gwei,
    pub slashed: bool,
    pub eligible_for_penalties: bool,
}

/// Rewards and penalties broken down by component.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Phase0EpochDeltas {
    pub source_reward: Gwei,
    pub source_penalty: Gwei,
    pub target_reward: Gwei,
    pub target_penalty: Gwei,
    pub head_reward: Gwei,
    pub head_penalty: Gwei,
    pub proposer_reward: Gwei,
    pub inclusion_delay_reward: Gwei,
    pub canceling_penalty: Gwei,
    pub inactivity_penalty: Gwei,
}

impl EpochDeltas for Phase0EpochDeltas {
    fn combined_reward(self) -> Gwei {
        self.source_reward
            + self.target_reward
            + self.head_reward
            + self.proposer_reward
            + self.inclusion_delay_reward
    }

    fn combined_penalty(self) -> Gwei {
        self.source_penalty
            + self.target_penalty
            + self.head_penalty
            + self.canceling_penalty
            + self.inactivity_penalty
    }
}

pub fn statistics<P: Preset>(
    state: &BeaconState<P>,
) -> Result<(Statistics, Vec<ValidatorSummary>, Vec<Performance>)> {
    let current_epoch = get_current_epoch(state);
    let previous_epoch = get_previous_epoch(state);

    let mut statistics = Statistics::default();

    let summaries = state
        .validators
        .iter()
        .map(|validator| {
            let Validator {
                effective_balance,
                slashed,
                ..
            } = *validator;

            if is_active_validator(validator, current_epoch) {
                statistics.current_epoch_active_balance += effective_balance;
            }

            ValidatorSummary {
                effective_balance,
                slashed,
                eligible_for_penalties: is_eligible_for_penalties(validator, previous_epoch),
            }
        })
        .collect_vec();

    let mut performance = vec![Performance::default(); summaries.len()];

    // `get_block_root` fails in the first slot of an epoch, which is never the case when this is
    // called from `process_epoch`.
    if let Ok(previous_epoch_target_root) = get_block_root(state, AttestationEpoch::Previous) {
        for attestation in state.previous_epoch_attestations.iter() {
            let data = attestation.data;
            let matching_target = data.target.root == previous_epoch_target_root;
            let matching_head = data.beacon_block_root == get_block_root_at_slot(state, data.slot)?;

            for validator_index in
                get_attesting_indices(state, data, &attestation.aggregation_bits)?
            {
                let index = usize::try_from(validator_index)?;
                let summary = summaries[index];

                if summary.slashed {
                    continue;
                }

                statistics.accumulate_previous_epoch_attestation(
                    &mut performance[index],
                    attestation,
                    matching_target,
                    matching_head,
                    summary.effective_balance,
                );
            }
        }
    }

    if let Ok(current_epoch_target_root) = get_block_root(state, AttestationEpoch::Current) {
        for attestation in state.current_epoch_attestations.iter() {
            if attestation.data.target.root != current_epoch_target_root {
                continue;
            }

            for validator_index in
                get_attesting_indices(state, attestation.data, &attestation.aggregation_bits)?
            {
                let index = usize::try_from(validator_index)?;
                let summary = summaries[index];

                if summary.slashed || performance[index].current_epoch_matching_target {
                    continue;
                }

                statistics.current_epoch_target_attesting_balance += summary.effective_balance;
                performance[index].current_epoch_matching_target = true;
            }
        }
    }

    statistics.clamp_balances::<P>();

    Ok((statistics, summaries, performance))
}

pub fn epoch_deltas<P: Preset>(
    state: &BeaconState<P>,
    statistics: Statistics,
    summaries: impl IntoIterator<Item = ValidatorSummary>,
    performance: impl IntoIterator<Item = Performance>,
) -> Result<Vec<Phase0EpochDeltas>> {
    let finality_delay = get_finality_delay(state);
    let in_inactivity_leak = is_in_inactivity_leak(state);
    let increment = P::EFFECTIVE_BALANCE_INCREMENT;
    let total_active_balance_sqrt = statistics.current_epoch_active_balance.sqrt();
    let total_active_increments = statistics.current_epoch_active_balance / increment;

    let mut deltas = vec![Phase0EpochDeltas::default(); state.validators.len_usize()];

    for (index, summary, performance) in izip!(0_usize.., summaries, performance) {
        let ValidatorSummary {
            effective_balance,
            eligible_for_penalties,
            ..
        } = summary;

        let base_reward = effective_balance * P::BASE_REWARD_FACTOR
            / total_active_balance_sqrt
            / BASE_REWARDS_PER_EPOCH;

        let attestation_component_reward = |attesting_balance: Gwei| {
            if in_inactivity_leak {
                // > Since full base reward will be canceled out by inactivity penalty deltas,
                // > optimal participation receives full base reward compensation here.
                base_reward
            } else {
                // > Factored out from balance totals to avoid uint64 overflow
                base_reward
                    .mul_div(attesting_balance / increment, total_active_increments)
                    .expect("attesting balance is at most the total active balance")
            }
        };

        let proposer_reward = base_reward / P::PROPOSER_REWARD_QUOTIENT;

        if eligible_for_penalties {
            let deltas = &mut deltas[index];

            if performance.previous_epoch_matching_source() {
                deltas.source_reward += attestation_component_reward(
                    statistics.previous_epoch_source_attesting_balance,
                );
            } else {
                deltas.source_penalty += base_reward;
            }

            if performance.previous_epoch_matching_target() {
                deltas.target_reward += attestation_component_reward(
                    statistics.previous_epoch_target_attesting_balance,
                );
            } else {
                deltas.target_penalty += base_reward;
            }

            if performance.previous_epoch_matching_head() {
                deltas.head_reward +=
                    attestation_component_reward(statistics.previous_epoch_head_attesting_balance);
            } else {
                deltas.head_penalty += base_reward;
            }

            if in_inactivity_leak {
                // > If validator is performing optimally this cancels all rewards for a neutral
                // > balance
                deltas.canceling_penalty +=
                    BASE_REWARDS_PER_EPOCH.get() * base_reward - proposer_reward;

                if !performance.previous_epoch_matching_target() {
                    deltas.inactivity_penalty +=
                        effective_balance * finality_delay / P::INACTIVITY_PENALTY_QUOTIENT;
                }
            }
        }

        if let Some(Inclusion {
            delay,
            proposer_index,
        }) = performance.previous_epoch_fastest_inclusion()
        {
            let max_attester_reward = base_reward - proposer_reward;

            deltas[usize::try_from(proposer_index)?].proposer_reward += proposer_reward;
            deltas[index].inclusion_delay_reward += max_attester_reward / delay;
        }
    }

    Ok(deltas)
}

#[cfg(test)]
mod tests {
    use helper_functions::accessors::get_beacon_committee;
    use ssz_types::BitList;
    use types::{
        collections::{Attestations, Balances, Validators},
        phase0::{
            consts::FAR_FUTURE_EPOCH,
            containers::{AttestationData, Checkpoint},
            primitives::H256,
        },
        preset::Minimal,
    };

    use super::*;

    const VALIDATOR_COUNT: u64 = 64;

    fn state_in_epoch_2() -> Result<BeaconState<Minimal>> {
        let validator = Validator {
            effective_balance: Minimal::MAX_EFFECTIVE_BALANCE,
            activation_epoch: 0,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            ..Validator::default()
        };

        Ok(BeaconState {
            slot: 23,
            validators: Validators::<Minimal>::try_from_iter(
                core::iter::repeat_n(validator, VALIDATOR_COUNT as usize),
            )?,
            balances: Balances::<Minimal>::try_from_iter(core::iter::repeat_n(
                Minimal::MAX_EFFECTIVE_BALANCE,
                VALIDATOR_COUNT as usize,
            ))?,
            finalized_checkpoint: Checkpoint {
                epoch: 1,
                root: H256::ZERO,
            },
            ..BeaconState::default()
        })
    }

    fn full_attestation_at_slot(
        state: &BeaconState<Minimal>,
        slot: u64,
        inclusion_delay: u64,
    ) -> Result<PendingAttestation<Minimal>> {
        let committee_size = get_beacon_committee(state, slot, 0)?.len();
        let mut aggregation_bits = BitList::with_capacity(committee_size)
            .map_err(|error| anyhow::anyhow!("{error:?}"))?;

        for position in 0..committee_size {
            aggregation_bits
                .set(position, true)
                .map_err(|error| anyhow::anyhow!("{error:?}"))?;
        }

        Ok(PendingAttestation {
            aggregation_bits,
            data: AttestationData {
                slot,
                index: 0,
                beacon_block_root: get_block_root_at_slot(state, slot)?,
                source: Checkpoint::default(),
                target: Checkpoint {
                    epoch: 1,
                    root: get_block_root(state, AttestationEpoch::Previous)?,
                },
            },
            inclusion_delay,
            proposer_index: 7,
        })
    }

    #[test]
    fn validators_without_attestations_are_penalized_for_every_component() -> Result<()> {
        let state = state_in_epoch_2()?;

        let (statistics, summaries, performance) = statistics(&state)?;
        let deltas = epoch_deltas(&state, statistics, summaries, performance)?;

        assert_eq!(
            statistics.current_epoch_active_balance,
            VALIDATOR_COUNT * Minimal::MAX_EFFECTIVE_BALANCE,
        );

        let deltas = deltas[0];

        assert_eq!(deltas.combined_reward(), 0);
        assert_ne!(deltas.source_penalty, 0);
        assert_eq!(deltas.source_penalty, deltas.target_penalty);
        assert_eq!(deltas.source_penalty, deltas.head_penalty);

        Ok(())
    }

    #[test]
    fn attesters_are_rewarded_and_proposer_gets_inclusion_share() -> Result<()> {
        let mut state = state_in_epoch_2()?;

        let attestation = full_attestation_at_slot(&state, 8, 1)?;
        let attesters =
            get_attesting_indices(&state, attestation.data, &attestation.aggregation_bits)?
                .collect_vec();

        state.previous_epoch_attestations = Attestations::try_from_iter([attestation])?;

        let (statistics, summaries, performance) = statistics(&state)?;

        assert!(performance[usize::try_from(attesters[0])?].previous_epoch_matching_head());

        let deltas = epoch_deltas(&state, statistics, summaries, performance)?;
        let attester_deltas = deltas[usize::try_from(attesters[0])?];

        assert_ne!(attester_deltas.source_reward, 0);
        assert_ne!(attester_deltas.inclusion_delay_reward, 0);
        assert_eq!(attester_deltas.source_penalty, 0);
        assert_ne!(deltas[7].proposer_reward, 0);

        Ok(())
    }
}
