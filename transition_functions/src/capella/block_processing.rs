use anyhow::{ensure, Result};
use execution_engine::{ExecutionEngine, NullExecutionEngine};
use helper_functions::{
    accessors::get_current_epoch,
    error::SignatureKind,
    misc::{dilithium_withdrawal_credentials, eth1_address_withdrawal_credentials},
    mutators::{balance, decrease_balance},
    predicates::{
        is_execution_enabled, is_fully_withdrawable_validator, is_partially_withdrawable_validator,
    },
    signing::SignForAllForksWithGenesis,
    verifier::{SingleVerifier, Verifier},
};
use ssz_types::VariableList;
use tree_hash::TreeHash as _;
use typenum::Unsigned as _;
use types::{
    capella::{
        beacon_state::BeaconState,
        containers::{
            BeaconBlock, ExecutionPayload, ExecutionPayloadHeader,
            SignedDilithiumToExecutionChange, Withdrawal,
        },
    },
    config::Config,
    phase0::{
        consts::DILITHIUM_WITHDRAWAL_PREFIX,
        primitives::{ExecutionAddress, H256},
    },
    preset::Preset,
    traits::{
        PostCapellaBeaconBlockBody, PostCapellaBeaconState, PostCapellaExecutionPayload,
        PostCapellaExecutionPayloadHeader,
    },
};

use crate::{
    altair, bellatrix,
    unphased::{self, Error},
};

pub fn process_block<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    block: &BeaconBlock<P>,
    mut verifier: impl Verifier,
) -> Result<()> {
    verifier.reserve(altair::count_required_signatures(block));

    custom_process_block(config, state, block, NullExecutionEngine, &mut verifier)?;

    verifier.finish()
}

pub fn custom_process_block<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    block: &BeaconBlock<P>,
    execution_engine: impl ExecutionEngine<P>,
    mut verifier: impl Verifier,
) -> Result<()> {
    debug_assert_eq!(state.slot, block.slot);

    unphased::process_block_header(state, block)?;

    if is_execution_enabled(state, &block.body) {
        // > [New in Capella]
        process_withdrawals(state, &block.body.execution_payload)?;

        process_execution_payload(
            config,
            state,
            block.tree_hash_root(),
            &block.body.execution_payload,
            execution_engine,
        )?;
    }

    unphased::process_randao(config, state, &block.body, &mut verifier)?;
    unphased::process_eth1_data(state, &block.body)?;

    process_operations(config, state, &block.body, &mut verifier)?;

    altair::process_sync_aggregate(config, state, &block.body.sync_aggregate, verifier)
}

fn process_execution_payload<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    block_root: H256,
    payload: &ExecutionPayload<P>,
    execution_engine: impl ExecutionEngine<P>,
) -> Result<()> {
    bellatrix::validate_execution_payload(config, state, payload)?;

    // > Verify the execution payload is valid
    execution_engine.notify_new_payload(block_root, payload, None)?;

    // > Cache execution payload header
    state.latest_execution_payload_header = ExecutionPayloadHeader::from(payload);

    Ok(())
}

/// Applies the operations of a Capella or later block body.
pub fn process_operations<P: Preset>(
    config: &Config,
    state: &mut impl PostCapellaBeaconState<P>,
    body: &(impl PostCapellaBeaconBlockBody<P> + ?Sized),
    mut verifier: impl Verifier,
) -> Result<()> {
    altair::process_operations(config, state, body, &mut verifier)?;

    // > [New in Capella]
    for signed_change in body.dilithium_to_execution_changes().iter() {
        process_dilithium_to_execution_change(config, state, signed_change, &mut verifier)?;
    }

    Ok(())
}

pub fn process_dilithium_to_execution_change<P: Preset>(
    config: &Config,
    state: &mut impl PostCapellaBeaconState<P>,
    signed_change: &SignedDilithiumToExecutionChange,
    verifier: impl Verifier,
) -> Result<()> {
    validate_dilithium_to_execution_change_with_verifier(config, state, signed_change, verifier)?;

    let change = &signed_change.message;

    state
        .validators_mut()
        .get_mut(change.validator_index)?
        .withdrawal_credentials = eth1_address_withdrawal_credentials(change.to_execution_address);

    Ok(())
}

pub fn validate_dilithium_to_execution_change<P: Preset>(
    config: &Config,
    state: &(impl PostCapellaBeaconState<P> + ?Sized),
    signed_change: &SignedDilithiumToExecutionChange,
) -> Result<()> {
    validate_dilithium_to_execution_change_with_verifier(
        config,
        state,
        signed_change,
        SingleVerifier,
    )
}

fn validate_dilithium_to_execution_change_with_verifier<P: Preset>(
    config: &Config,
    state: &(impl PostCapellaBeaconState<P> + ?Sized),
    signed_change: &SignedDilithiumToExecutionChange,
    mut verifier: impl Verifier,
) -> Result<()> {
    let change = &signed_change.message;
    let index = change.validator_index;
    let in_state = state.validators().get(index)?.withdrawal_credentials;

    ensure!(
        in_state[0] == DILITHIUM_WITHDRAWAL_PREFIX,
        Error::WithdrawalCredentialsNotDilithium { index },
    );

    let in_block = dilithium_withdrawal_credentials(&change.from_dilithium_pubkey);

    ensure!(
        in_state == in_block,
        Error::WithdrawalCredentialsMismatch { in_state, in_block },
    );

    // > Fork-agnostic domain since address changes are valid across forks
    verifier.verify_singular(
        SignForAllForksWithGenesis::<P>::signing_root(change, config, state),
        signed_change.signature,
        &change.from_dilithium_pubkey,
        SignatureKind::DilithiumToExecutionChange,
    )
}

pub fn process_withdrawals<P: Preset>(
    state: &mut impl PostCapellaBeaconState<P>,
    execution_payload: &(impl PostCapellaExecutionPayload<P> + ?Sized),
) -> Result<()> {
    let expected_withdrawals = get_expected_withdrawals(state)?;

    validate_withdrawals_root::<P>(
        expected_withdrawals.clone(),
        execution_payload.withdrawals().tree_hash_root(),
    )?;

    for withdrawal in &expected_withdrawals {
        decrease_balance(balance(state, withdrawal.validator_index)?, withdrawal.amount);
    }

    // > Update the next withdrawal index if this block contained withdrawals
    if let Some(latest_withdrawal) = expected_withdrawals.last() {
        *state.next_withdrawal_index_mut() = latest_withdrawal.index + 1;
    }

    let validator_count = state.validators().len_u64();

    // > Update the next validator index to start the next withdrawal sweep
    let next_validator_index = match expected_withdrawals.last() {
        // > Next sweep starts after the latest withdrawal's validator index
        Some(latest_withdrawal)
            if expected_withdrawals.len() == P::MaxWithdrawalsPerPayload::USIZE =>
        {
            latest_withdrawal.validator_index + 1
        }
        // > Advance sweep by the max length of the sweep if there was not a full set of withdrawals
        _ => state.next_withdrawal_validator_index() + P::MAX_VALIDATORS_PER_WITHDRAWALS_SWEEP,
    };

    *state.next_withdrawal_validator_index_mut() =
        next_validator_index.checked_rem(validator_count).unwrap_or_default();

    Ok(())
}

/// Checks the `withdrawals_root` of a payload header without applying the withdrawals.
pub fn validate_header_withdrawals_root<P: Preset>(
    state: &(impl PostCapellaBeaconState<P> + ?Sized),
    header: &(impl PostCapellaExecutionPayloadHeader<P> + ?Sized),
) -> Result<()> {
    let expected_withdrawals = get_expected_withdrawals(state)?;
    validate_withdrawals_root::<P>(expected_withdrawals, header.withdrawals_root())
}

fn validate_withdrawals_root<P: Preset>(
    expected_withdrawals: Vec<Withdrawal>,
    in_block: H256,
) -> Result<()> {
    let computed = VariableList::<_, P::MaxWithdrawalsPerPayload>::new(expected_withdrawals)
        .map_err(|error| anyhow::anyhow!("{error:?}"))?
        .tree_hash_root();

    ensure!(
        computed == in_block,
        Error::WithdrawalRootMismatch { computed, in_block },
    );

    Ok(())
}

pub fn get_expected_withdrawals<P: Preset>(
    state: &(impl PostCapellaBeaconState<P> + ?Sized),
) -> Result<Vec<Withdrawal>> {
    let epoch = get_current_epoch(state);
    let total_validators = state.validators().len_u64();
    let bound = total_validators.min(P::MAX_VALIDATORS_PER_WITHDRAWALS_SWEEP);

    let mut withdrawal_index = state.next_withdrawal_index();
    let mut validator_index = state.next_withdrawal_validator_index();
    let mut withdrawals = vec![];

    for _ in 0..bound {
        let balance = *state.balances().get(validator_index)?;
        let validator = state.validators().get(validator_index)?;
        let address = ExecutionAddress::from_slice(&validator.withdrawal_credentials[12..]);

        let amount = if is_fully_withdrawable_validator(validator, balance, epoch) {
            Some(balance)
        } else if is_partially_withdrawable_validator::<P>(validator, balance) {
            Some(balance - P::MAX_EFFECTIVE_BALANCE)
        } else {
            None
        };

        if let Some(amount) = amount {
            withdrawals.push(Withdrawal {
                index: withdrawal_index,
                validator_index,
                address,
                amount,
            });

            withdrawal_index += 1;
        }

        if withdrawals.len() == P::MaxWithdrawalsPerPayload::USIZE {
            break;
        }

        validator_index = (validator_index + 1) % total_validators;
    }

    Ok(withdrawals)
}

#[cfg(test)]
mod tests {
    use dilithium::SecretKey;
    use test_case::test_case;
    use types::{
        capella::containers::DilithiumToExecutionChange,
        collections::{Balances, Validators},
        phase0::{consts::FAR_FUTURE_EPOCH, containers::Validator},
        preset::Minimal,
    };

    use super::*;

    const EXCESS: u64 = 7_000_000_000;

    fn state_with_withdrawable_validators() -> Result<BeaconState<Minimal>> {
        let address = ExecutionAddress::repeat_byte(0xaa);

        let fully_withdrawable = Validator {
            withdrawal_credentials: eth1_address_withdrawal_credentials(address),
            effective_balance: Minimal::MAX_EFFECTIVE_BALANCE,
            exit_epoch: 0,
            withdrawable_epoch: 0,
            ..Validator::default()
        };

        let partially_withdrawable = Validator {
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            exit_epoch: FAR_FUTURE_EPOCH,
            ..fully_withdrawable
        };

        let not_withdrawable = Validator {
            withdrawal_credentials: H256::ZERO,
            ..partially_withdrawable
        };

        Ok(BeaconState {
            validators: Validators::<Minimal>::try_from_iter([
                fully_withdrawable,
                partially_withdrawable,
                not_withdrawable,
            ])?,
            balances: Balances::<Minimal>::try_from_iter([
                5,
                Minimal::MAX_EFFECTIVE_BALANCE + EXCESS,
                Minimal::MAX_EFFECTIVE_BALANCE + EXCESS,
            ])?,
            ..BeaconState::default()
        })
    }

    fn payload_with_withdrawals(
        withdrawals: Vec<Withdrawal>,
    ) -> Result<ExecutionPayload<Minimal>> {
        Ok(ExecutionPayload {
            withdrawals: VariableList::new(withdrawals)
                .map_err(|error| anyhow::anyhow!("{error:?}"))?,
            ..ExecutionPayload::default()
        })
    }

    #[test]
    fn expected_withdrawals_cover_full_and_partial_withdrawals() -> Result<()> {
        let state = state_with_withdrawable_validators()?;
        let withdrawals = get_expected_withdrawals(&state)?;
        let address = ExecutionAddress::repeat_byte(0xaa);

        assert_eq!(
            withdrawals,
            [
                Withdrawal {
                    index: 0,
                    validator_index: 0,
                    address,
                    amount: 5,
                },
                Withdrawal {
                    index: 1,
                    validator_index: 1,
                    address,
                    amount: EXCESS,
                },
            ],
        );

        Ok(())
    }

    #[test]
    fn withdrawals_are_applied_and_sweep_advances() -> Result<()> {
        let mut state = state_with_withdrawable_validators()?;
        let payload = payload_with_withdrawals(get_expected_withdrawals(&state)?)?;

        process_withdrawals(&mut state, &payload)?;

        itertools::assert_equal(
            state.balances.iter().copied(),
            [
                0,
                Minimal::MAX_EFFECTIVE_BALANCE,
                Minimal::MAX_EFFECTIVE_BALANCE + EXCESS,
            ],
        );

        assert_eq!(state.next_withdrawal_index, 2);

        // The sweep bound exceeds the validator count, so the sweep wraps around.
        assert_eq!(
            state.next_withdrawal_validator_index,
            Minimal::MAX_VALIDATORS_PER_WITHDRAWALS_SWEEP % 3,
        );

        Ok(())
    }

    #[test_case(|withdrawals| withdrawals.clear(); "withdrawals omitted")]
    #[test_case(|withdrawals| withdrawals[1].amount += 1; "one amount differs")]
    #[test_case(|withdrawals| withdrawals.reverse(); "order reversed")]
    fn payload_with_unexpected_withdrawals_is_rejected(
        tamper: fn(&mut Vec<Withdrawal>),
    ) -> Result<()> {
        let mut state = state_with_withdrawable_validators()?;
        let expected_withdrawals = get_expected_withdrawals(&state)?;
        let expected_root = payload_with_withdrawals(expected_withdrawals.clone())?
            .withdrawals
            .tree_hash_root();

        let mut withdrawals = expected_withdrawals;
        tamper(&mut withdrawals);

        let payload = payload_with_withdrawals(withdrawals)?;
        let payload_root = payload.withdrawals.tree_hash_root();

        assert_ne!(expected_root, payload_root);

        let error = process_withdrawals(&mut state, &payload)
            .expect_err("the payload does not contain the expected withdrawals");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::WithdrawalRootMismatch { computed, in_block })
                if *computed == expected_root && *in_block == payload_root,
        ));

        let message = error.to_string();

        assert!(message.contains(&format!("{expected_root:?}")));
        assert!(message.contains(&format!("{payload_root:?}")));

        Ok(())
    }

    #[test]
    fn header_withdrawals_root_is_checked() -> Result<()> {
        let state = state_with_withdrawable_validators()?;
        let payload = payload_with_withdrawals(get_expected_withdrawals(&state)?)?;
        let mut header = ExecutionPayloadHeader::from(&payload);

        validate_header_withdrawals_root(&state, &header)?;

        header.withdrawals_root = H256::ZERO;

        validate_header_withdrawals_root(&state, &header)
            .expect_err("withdrawals root was cleared");

        Ok(())
    }

    #[test]
    fn dilithium_credentials_are_changed_to_execution_address() -> Result<()> {
        let config = Config::minimal();
        let secret_key = SecretKey::random();
        let public_key = secret_key.to_public_key().to_bytes();
        let address = ExecutionAddress::repeat_byte(0xbb);

        let mut state = BeaconState::<Minimal> {
            validators: Validators::<Minimal>::try_from_iter([Validator {
                withdrawal_credentials: dilithium_withdrawal_credentials(&public_key),
                ..Validator::default()
            }])?,
            balances: Balances::<Minimal>::try_from_iter([0])?,
            ..BeaconState::default()
        };

        let change = DilithiumToExecutionChange {
            validator_index: 0,
            from_dilithium_pubkey: public_key,
            to_execution_address: address,
        };

        let signed_change = SignedDilithiumToExecutionChange {
            message: change,
            signature: SignForAllForksWithGenesis::<Minimal>::sign(
                &change,
                &config,
                &state,
                &secret_key,
            )
            .to_bytes(),
        };

        process_dilithium_to_execution_change(&config, &mut state, &signed_change, SingleVerifier)?;

        assert_eq!(
            state.validators.get(0)?.withdrawal_credentials,
            eth1_address_withdrawal_credentials(address),
        );

        let error = validate_dilithium_to_execution_change(&config, &state, &signed_change)
            .expect_err("credentials no longer have the Dilithium prefix");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::WithdrawalCredentialsNotDilithium { index: 0 }),
        ));

        Ok(())
    }
}
