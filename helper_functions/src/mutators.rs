use core::cmp::Ordering;

use anyhow::Result;
use easy_ext::ext;
use typenum::Unsigned as _;
use types::{
    config::Config,
    nonstandard::ExitOutcome,
    phase0::{
        consts::FAR_FUTURE_EPOCH,
        primitives::{Gwei, ValidatorIndex},
    },
    preset::Preset,
    traits::BeaconState,
};

use crate::{
    accessors::{get_beacon_proposer_index, get_current_epoch, get_validator_churn_limit},
    error::Error,
    misc::{
        compute_activation_exit_epoch, min_slashing_penalty_quotient,
        proposer_share_of_whistleblower_reward,
    },
};

pub fn balance<P: Preset>(
    state: &mut (impl BeaconState<P> + ?Sized),
    validator_index: ValidatorIndex,
) -> Result<&mut Gwei> {
    state
        .balances_mut()
        .get_mut(validator_index)
        .map_err(Into::into)
}

/// Adds `delta` to `balance`, failing instead of wrapping around.
#[inline]
pub fn increase_balance(balance: &mut Gwei, delta: Gwei) -> Result<()> {
    *balance = balance.checked_add(delta).ok_or(Error::BalanceOverflow)?;
    Ok(())
}

#[inline]
pub fn decrease_balance(balance: &mut Gwei, delta: Gwei) {
    *balance = balance.saturating_sub(delta);
}

/// Queues `validator_index` for exit.
///
/// A validator that has already initiated an exit is left unchanged and reported with
/// [`ExitOutcome::AlreadyExited`].
pub fn initiate_validator_exit<P: Preset>(
    config: &Config,
    state: &mut (impl BeaconState<P> + ?Sized),
    validator_index: ValidatorIndex,
) -> Result<ExitOutcome> {
    let exit_epoch = state.validators().get(validator_index)?.exit_epoch;

    if exit_epoch != FAR_FUTURE_EPOCH {
        return Ok(ExitOutcome::AlreadyExited { exit_epoch });
    }

    let mut exit_queue_epoch = compute_activation_exit_epoch::<P>(get_current_epoch(state));
    let mut exit_queue_churn = 0;

    for validator in state.validators() {
        let exit_epoch = validator.exit_epoch;

        if exit_epoch == FAR_FUTURE_EPOCH {
            continue;
        }

        match exit_epoch.cmp(&exit_queue_epoch) {
            Ordering::Less => {}
            Ordering::Equal => exit_queue_churn += 1,
            Ordering::Greater => {
                exit_queue_epoch = exit_epoch;
                exit_queue_churn = 1;
            }
        }
    }

    if exit_queue_churn >= get_validator_churn_limit(config, state) {
        exit_queue_epoch += 1;
    }

    let withdrawable_epoch = exit_queue_epoch
        .checked_add(config.min_validator_withdrawability_delay)
        .ok_or(Error::EpochOverflow)?;

    let validator = state.validators_mut().get_mut(validator_index)?;

    validator.exit_epoch = exit_queue_epoch;
    validator.withdrawable_epoch = withdrawable_epoch;

    Ok(ExitOutcome::Initiated {
        exit_epoch: exit_queue_epoch,
    })
}

#[ext(ExitOutcomeExt)]
pub impl ExitOutcome {
    /// Treats an already exiting validator as an error.
    fn into_result(self, validator_index: ValidatorIndex) -> Result<ExitOutcome> {
        match self {
            Self::Initiated { .. } => Ok(self),
            Self::AlreadyExited { exit_epoch } => Err(Error::ValidatorAlreadyExited {
                validator_index,
                exit_epoch,
            }
            .into()),
        }
    }
}

/// Slashes `slashed_index` and rewards the proposer and `whistleblower_index`.
///
/// The proposer is the whistleblower when `whistleblower_index` is `None`.
pub fn slash_validator<P: Preset>(
    config: &Config,
    state: &mut (impl BeaconState<P> + ?Sized),
    slashed_index: ValidatorIndex,
    whistleblower_index: Option<ValidatorIndex>,
) -> Result<()> {
    let phase = state.phase();
    let epoch = get_current_epoch(state);

    // A validator that is already exiting can still be slashed.
    initiate_validator_exit(config, state, slashed_index)?;

    let validator = state.validators_mut().get_mut(slashed_index)?;
    let effective_balance = validator.effective_balance;

    validator.slashed = true;
    validator.withdrawable_epoch = validator
        .withdrawable_epoch
        .max(epoch + P::EpochsPerSlashingsVector::U64);

    let slashings = state.slashings_mut().mod_index_mut(epoch);
    *slashings = slashings
        .checked_add(effective_balance)
        .ok_or(Error::BalanceOverflow)?;

    decrease_balance(
        balance(state, slashed_index)?,
        effective_balance / min_slashing_penalty_quotient::<P>(phase),
    );

    let proposer_index = get_beacon_proposer_index(state)?;
    let whistleblower_index = whistleblower_index.unwrap_or(proposer_index);
    let whistleblower_reward = effective_balance / P::WHISTLEBLOWER_REWARD_QUOTIENT;
    let proposer_reward = proposer_share_of_whistleblower_reward::<P>(phase, whistleblower_reward);

    increase_balance(balance(state, proposer_index)?, proposer_reward)?;

    increase_balance(
        balance(state, whistleblower_index)?,
        whistleblower_reward - proposer_reward,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use types::{
        altair::beacon_state::BeaconState as AltairBeaconState,
        collections::{Balances, Validators},
        phase0::{beacon_state::BeaconState as Phase0BeaconState, containers::Validator},
        preset::Minimal,
    };

    use crate::accessors;

    use super::*;

    fn active_validator() -> Validator {
        Validator {
            effective_balance: Minimal::MAX_EFFECTIVE_BALANCE,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            ..Validator::default()
        }
    }

    #[test]
    fn exit_is_delayed_past_seed_lookahead() -> Result<()> {
        let config = Config::minimal();

        let exiting = Validator {
            exit_epoch: 4,
            ..active_validator()
        };

        let mut state = Phase0BeaconState::<Minimal> {
            validators: Validators::<Minimal>::try_from_iter([exiting, active_validator()])?,
            ..Phase0BeaconState::default()
        };

        let outcome = initiate_validator_exit(&config, &mut state, 1)?;

        assert_eq!(outcome, ExitOutcome::Initiated { exit_epoch: 5 });
        assert_eq!(state.validators.get(1)?.exit_epoch, 5);
        assert_eq!(
            state.validators.get(1)?.withdrawable_epoch,
            5 + config.min_validator_withdrawability_delay,
        );

        Ok(())
    }

    #[test]
    fn exiting_validator_is_left_unchanged() -> Result<()> {
        let config = Config::minimal();

        let exiting = Validator {
            exit_epoch: 4,
            withdrawable_epoch: 9,
            ..active_validator()
        };

        let mut state = Phase0BeaconState::<Minimal> {
            validators: Validators::<Minimal>::try_from_iter([exiting])?,
            ..Phase0BeaconState::default()
        };

        let before = state.clone();
        let outcome = initiate_validator_exit(&config, &mut state, 0)?;

        assert_eq!(outcome, ExitOutcome::AlreadyExited { exit_epoch: 4 });
        assert_eq!(state, before);

        let error = outcome
            .into_result(0)
            .expect_err("the validator has already exited");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::ValidatorAlreadyExited {
                validator_index: 0,
                exit_epoch: 4,
            }),
        ));

        Ok(())
    }

    #[test]
    fn exit_of_unknown_validator_fails() {
        let mut state = Phase0BeaconState::<Minimal>::default();

        initiate_validator_exit(&Config::minimal(), &mut state, 3)
            .expect_err("validator 3 does not exist");
    }

    #[test]
    fn increase_balance_rejects_overflow() {
        let mut balance = u64::MAX - 1;

        let error = increase_balance(&mut balance, 2).expect_err("the sum overflows u64");

        assert_eq!(error.to_string(), "addition overflows");
        assert_eq!(balance, u64::MAX - 1);
    }

    #[test]
    fn increase_balance_adds() -> Result<()> {
        let mut balance = 5;

        increase_balance(&mut balance, 10)?;

        assert_eq!(balance, 15);

        Ok(())
    }

    #[test]
    fn decrease_balance_saturates_at_zero() {
        let mut balance = 5;

        for delta in [3, 10, u64::MAX] {
            decrease_balance(&mut balance, delta);
        }

        assert_eq!(balance, 0);
    }

    #[test]
    fn slashings_total_overflow_is_an_error() -> Result<()> {
        let mut state = Phase0BeaconState::<Minimal> {
            validators: Validators::<Minimal>::try_from_iter(core::iter::repeat_n(active_validator(), 8))?,
            balances: Balances::<Minimal>::try_from_iter(core::iter::repeat_n(
                Minimal::MAX_EFFECTIVE_BALANCE,
                8,
            ))?,
            ..Phase0BeaconState::default()
        };

        *state.slashings.mod_index_mut(0) = u64::MAX - 1;

        let error = slash_validator(&Config::minimal(), &mut state, 0, None)
            .expect_err("the slashings total overflows u64");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::BalanceOverflow),
        ));
        assert_eq!(*state.slashings.mod_index(0), u64::MAX - 1);

        Ok(())
    }

    #[test]
    fn slashing_splits_whistleblower_reward_by_phase() -> Result<()> {
        let config = Config::minimal();
        let validator_count = 8;
        let balance = Minimal::MAX_EFFECTIVE_BALANCE;

        let mut phase0_state = Phase0BeaconState::<Minimal> {
            validators: Validators::<Minimal>::try_from_iter(
                core::iter::repeat_n(active_validator(), validator_count),
            )?,
            balances: Balances::<Minimal>::try_from_iter(core::iter::repeat_n(balance, validator_count))?,
            ..Phase0BeaconState::default()
        };

        let mut altair_state = AltairBeaconState::<Minimal> {
            validators: phase0_state.validators.clone(),
            balances: phase0_state.balances.clone(),
            ..AltairBeaconState::default()
        };

        let proposer_index = accessors::get_beacon_proposer_index(&phase0_state)?;
        let slashed_index = (proposer_index + 1) % validator_count as u64;
        let whistleblower_reward = balance / Minimal::WHISTLEBLOWER_REWARD_QUOTIENT;

        slash_validator(&config, &mut phase0_state, slashed_index, None)?;

        let slashed = phase0_state.validators.get(slashed_index)?;

        assert!(slashed.slashed);
        assert_ne!(slashed.exit_epoch, FAR_FUTURE_EPOCH);
        assert_eq!(*phase0_state.slashings.mod_index(0), balance);
        assert_eq!(
            *phase0_state.balances.get(slashed_index)?,
            balance - balance / Minimal::MIN_SLASHING_PENALTY_QUOTIENT,
        );
        assert_eq!(
            *phase0_state.balances.get(proposer_index)?,
            balance + whistleblower_reward,
        );

        let altair_proposer_index = accessors::get_beacon_proposer_index(&altair_state)?;
        let altair_slashed_index = (altair_proposer_index + 1) % validator_count as u64;

        slash_validator(
            &config,
            &mut altair_state,
            altair_slashed_index,
            Some(altair_slashed_index),
        )?;

        let proposer_reward = whistleblower_reward * 8 / 64;

        assert_eq!(
            *altair_state.balances.get(altair_proposer_index)?,
            balance + proposer_reward,
        );
        assert_eq!(
            *altair_state.balances.get(altair_slashed_index)?,
            balance - balance / Minimal::MIN_SLASHING_PENALTY_QUOTIENT_ALTAIR + whistleblower_reward
                - proposer_reward,
        );

        Ok(())
    }
}
