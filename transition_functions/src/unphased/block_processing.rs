use anyhow::{ensure, Result};
use arithmetic::U64Ext as _;
use dilithium::PublicKeyBytes;
use helper_functions::{
    accessors::{
        attestation_epoch, get_beacon_committee, get_beacon_proposer_index,
        get_committee_count_per_slot, get_current_epoch, get_indexed_attestation,
        get_previous_epoch, get_randao_mix, index_of_public_key, initialize_shuffled_indices,
        public_key, slashable_indices,
    },
    error::SignatureKind,
    misc::{compute_epoch_at_slot, verify_attestation_bitfield_lengths},
    mutators::{
        balance, increase_balance, initiate_validator_exit, slash_validator, ExitOutcomeExt as _,
    },
    predicates::{
        is_active_validator, is_slashable_attestation_data, is_slashable_validator,
        is_valid_merkle_branch, validate_constructed_indexed_attestation,
    },
    signing::{RandaoEpoch, SignForAllForks as _, SignForSingleFork as _},
    verifier::{MultiVerifier, SingleVerifier, Triple, Verifier, VerifierOption},
};
use itertools::Itertools as _;
use rayon::iter::{
    IndexedParallelIterator as _, IntoParallelRefIterator as _, ParallelIterator as _,
};
use tree_hash::TreeHash as _;
use typenum::Unsigned as _;
use types::{
    config::Config,
    nonstandard::{AttestationEpoch, RelativeEpoch},
    phase0::{
        consts::FAR_FUTURE_EPOCH,
        containers::{
            Attestation, AttesterSlashing, BeaconBlockHeader, Deposit, DepositData,
            DepositMessage, ProposerSlashing, SignedVoluntaryExit, Validator,
        },
        primitives::{DepositIndex, Gwei, ValidatorIndex, H256},
    },
    preset::Preset,
    traits::{BeaconBlock, BeaconBlockBody, BeaconState},
};

use crate::unphased::Error;

/// What happened to the deposit passed to [`process_deposit_data`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DepositOutcome {
    AddedValidator(ValidatorIndex),
    ToppedUp(ValidatorIndex),
    /// The deposit was for a new validator and its signature was invalid.
    /// The deposit index is still incremented.
    Rejected,
}

pub fn process_block_header<P: Preset>(
    state: &mut (impl BeaconState<P> + ?Sized),
    block: &(impl BeaconBlock<P> + ?Sized),
) -> Result<()> {
    // > Verify that the slots match
    ensure!(
        block.slot() == state.slot(),
        Error::SlotMismatch {
            state_slot: state.slot(),
            block_slot: block.slot(),
        },
    );

    // > Verify that the block is newer than latest block header
    ensure!(
        block.slot() > state.latest_block_header().slot,
        Error::BlockNotNewerThanLatestBlockHeader {
            block_slot: block.slot(),
            block_header_slot: state.latest_block_header().slot,
        },
    );

    // > Verify that proposer index is the correct index
    let computed = get_beacon_proposer_index(state)?;
    let in_block = block.proposer_index();

    ensure!(
        computed == in_block,
        Error::ProposerIndexMismatch { computed, in_block },
    );

    // > Verify that the parent matches
    let computed = state.latest_block_header().tree_hash_root();
    let in_block = block.parent_root();

    ensure!(
        computed == in_block,
        Error::ParentRootMismatch { computed, in_block },
    );

    // > Verify proposer is not slashed
    let proposer = state.validators().get(block.proposer_index())?;

    ensure!(
        !proposer.slashed,
        Error::ProposerSlashed {
            index: block.proposer_index(),
        },
    );

    // > Cache current block as the new latest block
    *state.latest_block_header_mut() = BeaconBlockHeader {
        slot: block.slot(),
        proposer_index: block.proposer_index(),
        parent_root: block.parent_root(),
        // > Overwritten in the next process_slot call
        state_root: H256::ZERO,
        body_root: block.body().hash_tree_root(),
    };

    Ok(())
}

pub fn process_randao<P: Preset>(
    config: &Config,
    state: &mut (impl BeaconState<P> + ?Sized),
    body: &(impl BeaconBlockBody<P> + ?Sized),
    mut verifier: impl Verifier,
) -> Result<()> {
    let epoch = get_current_epoch(state);
    let randao_reveal = body.randao_reveal();

    // > Verify RANDAO reveal
    if !verifier.has_option(VerifierOption::SkipRandaoVerification) {
        let proposer_index = get_beacon_proposer_index(state)?;

        verifier.verify_singular(
            RandaoEpoch::from(epoch).signing_root(config, state),
            randao_reveal,
            public_key(state, proposer_index)?,
            SignatureKind::Randao,
        )?;
    }

    // > Mix in RANDAO reveal
    let mix = get_randao_mix(state, epoch) ^ hashing::hash_bytes(randao_reveal);
    *state.randao_mixes_mut().mod_index_mut(epoch) = mix;

    Ok(())
}

pub fn process_eth1_data<P: Preset>(
    state: &mut (impl BeaconState<P> + ?Sized),
    body: &(impl BeaconBlockBody<P> + ?Sized),
) -> Result<()> {
    let eth1_data = body.eth1_data();

    state.eth1_data_votes_mut().push(eth1_data)?;

    let vote_count = state
        .eth1_data_votes()
        .iter()
        .filter(|vote| **vote == eth1_data)
        .count();

    if vote_count * 2 > P::SlotsPerEth1VotingPeriod::USIZE {
        *state.eth1_data_mut() = eth1_data;
    }

    Ok(())
}

/// Checks that `body` includes every deposit it can.
///
/// A block must include `min(MAX_DEPOSITS, eth1_data.deposit_count - eth1_deposit_index)`
/// deposits.
pub fn validate_deposit_count<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    body: &(impl BeaconBlockBody<P> + ?Sized),
) -> Result<()> {
    let computed = P::MaxDeposits::U64.min(
        state
            .eth1_data()
            .deposit_count
            .saturating_sub(state.eth1_deposit_index()),
    );

    let in_block = body.deposits().len() as u64;

    ensure!(
        computed == in_block,
        Error::DepositCountMismatch { computed, in_block },
    );

    Ok(())
}

pub fn process_proposer_slashing<P: Preset>(
    config: &Config,
    state: &mut (impl BeaconState<P> + ?Sized),
    proposer_slashing: ProposerSlashing,
    verifier: impl Verifier,
) -> Result<()> {
    validate_proposer_slashing_with_verifier(config, state, proposer_slashing, verifier)?;

    let index = proposer_slashing.signed_header_1.message.proposer_index;

    slash_validator(config, state, index, None)
}

pub fn validate_proposer_slashing<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
    proposer_slashing: ProposerSlashing,
) -> Result<()> {
    validate_proposer_slashing_with_verifier(config, state, proposer_slashing, SingleVerifier)
}

pub fn validate_proposer_slashing_with_verifier<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
    proposer_slashing: ProposerSlashing,
    mut verifier: impl Verifier,
) -> Result<()> {
    let header_1 = proposer_slashing.signed_header_1.message;
    let header_2 = proposer_slashing.signed_header_2.message;

    // > Verify header slots match
    ensure!(
        header_1.slot == header_2.slot,
        Error::ProposerSlashingSlotMismatch {
            slot_1: header_1.slot,
            slot_2: header_2.slot,
        },
    );

    // > Verify header proposer indices match
    ensure!(
        header_1.proposer_index == header_2.proposer_index,
        Error::ProposerSlashingProposerMismatch {
            proposer_index_1: header_1.proposer_index,
            proposer_index_2: header_2.proposer_index,
        },
    );

    // > Verify the headers are different
    ensure!(
        header_1 != header_2,
        Error::ProposerSlashingHeadersIdentical { header: header_1 },
    );

    // > Verify the proposer is slashable
    let index = header_1.proposer_index;
    let proposer = state.validators().get(index)?;

    ensure!(
        is_slashable_validator(proposer, get_current_epoch(state)),
        Error::ProposerNotSlashable {
            index,
            proposer: Box::new(proposer.clone()),
        },
    );

    // > Verify signatures
    for signed_header in [
        proposer_slashing.signed_header_1,
        proposer_slashing.signed_header_2,
    ] {
        verifier.verify_singular(
            signed_header.message.signing_root(config, state),
            signed_header.signature,
            public_key(state, index)?,
            SignatureKind::Block,
        )?;
    }

    Ok(())
}

pub fn process_attester_slashing<P: Preset>(
    config: &Config,
    state: &mut (impl BeaconState<P> + ?Sized),
    attester_slashing: &AttesterSlashing<P>,
    verifier: impl Verifier,
) -> Result<()> {
    let slashable_indices =
        validate_attester_slashing_with_verifier(config, state, attester_slashing, verifier)?;

    for validator_index in slashable_indices {
        slash_validator(config, state, validator_index, None)?;
    }

    Ok(())
}

pub fn validate_attester_slashing<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
    attester_slashing: &AttesterSlashing<P>,
) -> Result<Vec<ValidatorIndex>> {
    validate_attester_slashing_with_verifier(config, state, attester_slashing, SingleVerifier)
}

/// Returns the indices of validators that `attester_slashing` slashes, in ascending order.
pub fn validate_attester_slashing_with_verifier<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
    attester_slashing: &AttesterSlashing<P>,
    mut verifier: impl Verifier,
) -> Result<Vec<ValidatorIndex>> {
    let attestation_1 = &attester_slashing.attestation_1;
    let attestation_2 = &attester_slashing.attestation_2;

    let data_1 = attestation_1.data;
    let data_2 = attestation_2.data;

    // Surround votes are slashable in either order.
    ensure!(
        is_slashable_attestation_data(data_1, data_2)
            || is_slashable_attestation_data(data_2, data_1),
        Error::AttestationDataNotSlashable { data_1, data_2 },
    );

    validate_constructed_indexed_attestation(config, state, attestation_1, &mut verifier)?;
    validate_constructed_indexed_attestation(config, state, attestation_2, &mut verifier)?;

    let slashable_indices = slashable_indices(state, attestation_1, attestation_2).collect_vec();

    ensure!(!slashable_indices.is_empty(), Error::NoSlashableIndices);

    Ok(slashable_indices)
}

pub fn validate_attestation<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
    attestation: &Attestation<P>,
) -> Result<()> {
    validate_attestation_with_verifier(config, state, attestation, SingleVerifier)
}

pub fn validate_attestation_with_verifier<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
    attestation: &Attestation<P>,
    verifier: impl Verifier,
) -> Result<()> {
    let data = attestation.data;
    let previous_epoch = get_previous_epoch(state);
    let current_epoch = get_current_epoch(state);

    ensure!(
        data.target.epoch == previous_epoch || data.target.epoch == current_epoch,
        Error::AttestationTargetsWrongEpoch {
            attestation_epoch: data.target.epoch,
            previous_epoch,
            current_epoch,
        },
    );

    let slot_epoch = compute_epoch_at_slot::<P>(data.slot);

    ensure!(
        data.target.epoch == slot_epoch,
        Error::AttestationTargetEpochMismatch {
            target_epoch: data.target.epoch,
            slot_epoch,
        },
    );

    let min_delay = P::MIN_ATTESTATION_INCLUSION_DELAY.get();

    ensure!(
        data.slot + min_delay <= state.slot(),
        Error::AttestationIncludedTooEarly {
            attestation_slot: data.slot,
            state_slot: state.slot(),
            min_delay,
        },
    );

    // Deneb accepts attestations from the previous epoch for the whole current epoch.
    if !state.is_post_deneb() {
        ensure!(
            state.slot() <= data.slot + P::SlotsPerEpoch::U64,
            Error::AttestationIncludedTooLate {
                attestation_slot: data.slot,
                state_slot: state.slot(),
            },
        );
    }

    let relative_epoch = RelativeEpoch::from(attestation_epoch(state, data.target.epoch)?);
    let committee_count = get_committee_count_per_slot(state, relative_epoch);

    ensure!(
        data.index < committee_count,
        Error::CommitteeIndexOutOfBounds {
            index: data.index,
            committee_count,
        },
    );

    let justified_checkpoint = match attestation_epoch(state, data.target.epoch)? {
        AttestationEpoch::Previous => state.previous_justified_checkpoint(),
        AttestationEpoch::Current => state.current_justified_checkpoint(),
    };

    ensure!(
        data.source == justified_checkpoint,
        Error::AttestationSourceMismatch {
            in_state: justified_checkpoint,
            in_block: data.source,
        },
    );

    let committee = get_beacon_committee(state, data.slot, data.index)?;

    verify_attestation_bitfield_lengths(&attestation.aggregation_bits, committee.len())?;

    // > Verify signature
    let indexed_attestation = get_indexed_attestation(state, attestation)?;

    validate_constructed_indexed_attestation(config, state, &indexed_attestation, verifier)
}

/// Validates `attestations` and passes their signatures to `verifier`.
///
/// With a verifier that checks signatures the attestations are validated in parallel and the
/// collected signatures are labeled with the position of their attestation in the block.
pub fn validate_attestations<'attestations, P: Preset, V: Verifier>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
    attestations: impl IntoIterator<Item = &'attestations Attestation<P>>,
    mut verifier: V,
) -> Result<()> {
    // Signature verification dominates the cost of validating attestations. Without it the
    // overhead of splitting the work is not worth it.
    if V::IS_NULL {
        for attestation in attestations {
            validate_attestation_with_verifier(config, state, attestation, &mut verifier)?;
        }

        return Ok(());
    }

    let attestations = attestations.into_iter().collect_vec();

    initialize_shuffled_indices(state, attestations.iter().copied())?;

    let triples = attestations
        .par_iter()
        .enumerate()
        .map(|(position, attestation)| {
            let mut attestation_verifier = MultiVerifier::default();

            validate_attestation_with_verifier(
                config,
                state,
                attestation,
                &mut attestation_verifier,
            )?;

            let triples = attestation_verifier
                .into_triples()
                .into_iter()
                .map(|triple| triple.with_description_prefix(format!("attestation {position}")))
                .collect_vec();

            Ok(triples)
        })
        .collect::<Result<Vec<Vec<Triple>>>>()?;

    verifier.extend(triples.into_iter().flatten(), SignatureKind::Attestation)
}

pub fn verify_deposit_merkle_branch<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    eth1_deposit_index: DepositIndex,
    deposit: &Deposit,
) -> Result<()> {
    // > Verify the Merkle branch
    ensure!(
        is_valid_merkle_branch(
            deposit.data.tree_hash_root(),
            deposit.proof.iter().copied(),
            eth1_deposit_index,
            state.eth1_data().deposit_root,
        ),
        Error::DepositProofInvalid {
            deposit: Box::new(deposit.clone()),
        },
    );

    Ok(())
}

pub fn process_deposit<P: Preset>(
    config: &Config,
    state: &mut (impl BeaconState<P> + ?Sized),
    deposit: &Deposit,
) -> Result<DepositOutcome> {
    verify_deposit_merkle_branch(state, state.eth1_deposit_index(), deposit)?;

    process_deposit_data(config, state, deposit.data)
}

/// Applies a deposit whose Merkle proof has already been checked.
pub fn process_deposit_data<P: Preset>(
    config: &Config,
    state: &mut (impl BeaconState<P> + ?Sized),
    deposit_data: DepositData,
) -> Result<DepositOutcome> {
    let DepositData {
        pubkey,
        withdrawal_credentials,
        amount,
        signature,
    } = deposit_data;

    // > Deposits must be processed in order
    *state.eth1_deposit_index_mut() += 1;

    if let Some(validator_index) = index_of_public_key(state, &pubkey) {
        // > Increase balance by deposit amount
        increase_balance(balance(state, validator_index)?, amount)?;
        return Ok(DepositOutcome::ToppedUp(validator_index));
    }

    // > Verify the deposit signature (proof of possession) which is not checked by the deposit
    // > contract
    let deposit_message = DepositMessage {
        pubkey,
        withdrawal_credentials,
        amount,
    };

    // Invalid signatures are allowed by the deposit contract.
    if deposit_message.verify(config, signature, &pubkey).is_err() {
        return Ok(DepositOutcome::Rejected);
    }

    let validator_index = add_validator_to_registry(state, pubkey, withdrawal_credentials, amount)?;

    Ok(DepositOutcome::AddedValidator(validator_index))
}

fn add_validator_to_registry<P: Preset>(
    state: &mut (impl BeaconState<P> + ?Sized),
    pubkey: PublicKeyBytes,
    withdrawal_credentials: H256,
    amount: Gwei,
) -> Result<ValidatorIndex> {
    let effective_balance = amount
        .prev_multiple_of(P::EFFECTIVE_BALANCE_INCREMENT)
        .min(P::MAX_EFFECTIVE_BALANCE);

    let validator = Validator {
        pubkey,
        withdrawal_credentials,
        effective_balance,
        slashed: false,
        activation_eligibility_epoch: FAR_FUTURE_EPOCH,
        activation_epoch: FAR_FUTURE_EPOCH,
        exit_epoch: FAR_FUTURE_EPOCH,
        withdrawable_epoch: FAR_FUTURE_EPOCH,
    };

    let validator_index = state.validators().len_u64();

    state.validators_mut().push(validator)?;
    state.balances_mut().push(amount)?;

    if let Some(validator_indices) = state.cache_mut().validator_indices.get_mut() {
        validator_indices.insert(pubkey, validator_index);
    }

    Ok(validator_index)
}

pub fn process_voluntary_exit<P: Preset>(
    config: &Config,
    state: &mut (impl BeaconState<P> + ?Sized),
    signed_voluntary_exit: SignedVoluntaryExit,
    verifier: impl Verifier,
) -> Result<()> {
    validate_voluntary_exit_with_verifier(config, state, signed_voluntary_exit, verifier)?;

    let index = signed_voluntary_exit.message.validator_index;

    // > Initiate exit
    initiate_validator_exit(config, state, index)?.into_result(index)?;

    Ok(())
}

pub fn validate_voluntary_exit<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
    signed_voluntary_exit: SignedVoluntaryExit,
) -> Result<()> {
    validate_voluntary_exit_with_verifier(config, state, signed_voluntary_exit, SingleVerifier)
}

pub fn validate_voluntary_exit_with_verifier<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
    signed_voluntary_exit: SignedVoluntaryExit,
    mut verifier: impl Verifier,
) -> Result<()> {
    let voluntary_exit = signed_voluntary_exit.message;
    let index = voluntary_exit.validator_index;
    let validator = state.validators().get(index)?;
    let current_epoch = get_current_epoch(state);

    // > Verify the validator is active
    ensure!(
        is_active_validator(validator, current_epoch),
        Error::ValidatorNotActive {
            index,
            current_epoch,
        },
    );

    // > Verify exit has not been initiated
    ensure!(
        validator.exit_epoch == FAR_FUTURE_EPOCH,
        Error::ValidatorAlreadyExited {
            index,
            exit_epoch: validator.exit_epoch,
        },
    );

    // > Exits must specify an epoch when they become valid; they are not valid before then
    ensure!(
        current_epoch >= voluntary_exit.epoch,
        Error::VoluntaryExitIsExpired {
            epoch: voluntary_exit.epoch,
            current_epoch,
        },
    );

    // > Verify the validator has been active long enough
    ensure!(
        current_epoch >= validator.activation_epoch + config.shard_committee_period,
        Error::ValidatorHasNotBeenActiveLongEnough {
            index,
            activation_epoch: validator.activation_epoch,
            current_epoch,
        },
    );

    // > Verify signature
    verifier.verify_singular(
        voluntary_exit.signing_root(config, state),
        signed_voluntary_exit.signature,
        public_key(state, index)?,
        SignatureKind::VoluntaryExit,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use dilithium::{SecretKey, SignatureBytes};
    use helper_functions::verifier::NullVerifier;
    use ssz_types::{BitList, VariableList};
    use test_case::test_case;
    use types::{
        collections::{Balances, Validators},
        phase0::{
            beacon_state::BeaconState as Phase0BeaconState,
            containers::{
                AttestationData, BeaconBlock as Phase0BeaconBlock,
                BeaconBlockBody as Phase0BeaconBlockBody, Checkpoint, Eth1Data,
                IndexedAttestation, SignedBeaconBlockHeader,
            },
        },
        preset::Minimal,
    };

    use super::*;

    fn active_validator(pubkey: PublicKeyBytes) -> Validator {
        Validator {
            pubkey,
            effective_balance: Minimal::MAX_EFFECTIVE_BALANCE,
            activation_epoch: 0,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            ..Validator::default()
        }
    }

    fn state_with_validators(count: u64) -> Result<Phase0BeaconState<Minimal>> {
        let validators = (0..count).map(|index| {
            let mut bytes = [0; dilithium::PUBLIC_KEY_SIZE];
            bytes[..8].copy_from_slice(&index.to_le_bytes());
            active_validator(PublicKeyBytes::from_array(bytes))
        });

        Ok(Phase0BeaconState {
            validators: Validators::<Minimal>::try_from_iter(validators)?,
            balances: Balances::<Minimal>::try_from_iter((0..count).map(|_| Minimal::MAX_EFFECTIVE_BALANCE))?,
            ..Phase0BeaconState::default()
        })
    }

    #[test]
    fn block_header_is_cached_with_zero_state_root() -> Result<()> {
        let mut state = state_with_validators(16)?;
        state.slot = 1;

        let block = Phase0BeaconBlock::<Minimal> {
            slot: 1,
            proposer_index: get_beacon_proposer_index(&state)?,
            parent_root: state.latest_block_header.tree_hash_root(),
            state_root: H256::repeat_byte(1),
            ..Phase0BeaconBlock::default()
        };

        process_block_header(&mut state, &block)?;

        assert_eq!(state.latest_block_header.slot, 1);
        assert_eq!(state.latest_block_header.state_root, H256::ZERO);
        assert_eq!(state.latest_block_header.body_root, block.body.tree_hash_root());

        Ok(())
    }

    #[test]
    fn block_from_wrong_proposer_is_rejected() -> Result<()> {
        let mut state = state_with_validators(16)?;
        state.slot = 1;

        let computed = get_beacon_proposer_index(&state)?;
        let in_block = (computed + 1) % 16;

        let block = Phase0BeaconBlock::<Minimal> {
            slot: 1,
            proposer_index: in_block,
            parent_root: state.latest_block_header.tree_hash_root(),
            ..Phase0BeaconBlock::default()
        };

        let error = process_block_header(&mut state, &block)
            .expect_err("block proposer index does not match state");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::ProposerIndexMismatch { computed: c, in_block: i })
                if *c == computed && *i == in_block,
        ));

        Ok(())
    }

    #[test]
    fn eth1_data_is_adopted_by_majority() -> Result<()> {
        let mut state = Phase0BeaconState::<Minimal>::default();
        let body = Phase0BeaconBlockBody::<Minimal> {
            eth1_data: Eth1Data {
                deposit_count: 5,
                ..Eth1Data::default()
            },
            ..Phase0BeaconBlockBody::default()
        };

        // The minimal voting period has 32 slots, so 17 votes are needed.
        for _ in 0..16 {
            process_eth1_data(&mut state, &body)?;
        }

        assert_eq!(state.eth1_data.deposit_count, 0);

        process_eth1_data(&mut state, &body)?;

        assert_eq!(state.eth1_data.deposit_count, 5);

        Ok(())
    }

    #[test]
    fn randao_reveal_is_mixed_in_without_verification() -> Result<()> {
        let mut state = state_with_validators(16)?;
        let body = Phase0BeaconBlockBody::<Minimal> {
            randao_reveal: SignatureBytes::from_array([7; dilithium::SIGNATURE_SIZE]),
            ..Phase0BeaconBlockBody::default()
        };

        let verifier = MultiVerifier::new([VerifierOption::SkipRandaoVerification]);

        process_randao(&Config::minimal(), &mut state, &body, verifier)?;

        assert_eq!(
            *state.randao_mixes.mod_index(0),
            hashing::hash_bytes(body.randao_reveal),
        );

        Ok(())
    }

    #[test]
    fn identical_proposer_slashing_headers_are_rejected() -> Result<()> {
        let state = state_with_validators(16)?;
        let header = SignedBeaconBlockHeader::default();

        let proposer_slashing = ProposerSlashing {
            signed_header_1: header,
            signed_header_2: header,
        };

        let error = validate_proposer_slashing_with_verifier(
            &Config::minimal(),
            &state,
            proposer_slashing,
            NullVerifier,
        )
        .expect_err("headers are identical");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::ProposerSlashingHeadersIdentical { .. }),
        ));

        Ok(())
    }

    #[test]
    fn double_vote_slashes_common_attesters() -> Result<()> {
        let config = Config::minimal();
        let mut state = state_with_validators(16)?;

        let data = |root_byte| AttestationData {
            target: Checkpoint {
                epoch: 0,
                root: H256::repeat_byte(root_byte),
            },
            ..AttestationData::default()
        };

        let indexed_attestation = |indices: &[u64], root_byte| -> Result<_> {
            Ok(IndexedAttestation::<Minimal> {
                attesting_indices: VariableList::new(indices.to_vec())
                    .map_err(|error| anyhow::anyhow!("{error:?}"))?,
                data: data(root_byte),
                signatures: VariableList::new(vec![SignatureBytes::default(); indices.len()])
                    .map_err(|error| anyhow::anyhow!("{error:?}"))?,
            })
        };

        let attester_slashing = AttesterSlashing {
            attestation_1: indexed_attestation(&[1, 3, 5], 1)?,
            attestation_2: indexed_attestation(&[3, 4, 5], 2)?,
        };

        let slashed = validate_attester_slashing_with_verifier(
            &config,
            &state,
            &attester_slashing,
            NullVerifier,
        )?;

        assert_eq!(slashed, [3, 5]);

        process_attester_slashing(&config, &mut state, &attester_slashing, NullVerifier)?;

        assert!(state.validators.get(3)?.slashed);
        assert!(state.validators.get(5)?.slashed);
        assert!(!state.validators.get(1)?.slashed);

        Ok(())
    }

    #[test]
    fn only_common_attester_of_sparse_sets_is_slashed() -> Result<()> {
        const ATTESTERS_1: [ValidatorIndex; 69] = [
            21, 92, 150, 226, 301, 377, 452, 528, 604, 679, 755, 831, 906, 982, 1058, 1133, 1209,
            1284, 1360, 1436, 1511, 1587, 1662, 1738, 1814, 1889, 1965, 2041, 2116, 2192, 2268,
            2343, 2419, 2494, 2570, 2646, 2721, 2797, 2800, 2872, 2948, 3024, 3099, 3175, 3251,
            3326, 3402, 3478, 3553, 3629, 3704, 3780, 3856, 3931, 4007, 4082, 4158, 4234, 4309,
            4385, 4461, 4536, 4612, 4688, 4763, 4839, 4914, 4990, 5091,
        ];
        const ATTESTERS_2: [ValidatorIndex; 4] = [1361, 1438, 2383, 2800];

        let config = Config::minimal();
        let mut state = state_with_validators(5100)?;

        let indexed_attestation = |indices: &[u64], root_byte| -> Result<_> {
            Ok(IndexedAttestation::<Minimal> {
                attesting_indices: VariableList::new(indices.to_vec())
                    .map_err(|error| anyhow::anyhow!("{error:?}"))?,
                data: AttestationData {
                    target: Checkpoint {
                        epoch: 0,
                        root: H256::repeat_byte(root_byte),
                    },
                    ..AttestationData::default()
                },
                signatures: VariableList::new(vec![SignatureBytes::default(); indices.len()])
                    .map_err(|error| anyhow::anyhow!("{error:?}"))?,
            })
        };

        let attester_slashing = AttesterSlashing {
            attestation_1: indexed_attestation(&ATTESTERS_1, 1)?,
            attestation_2: indexed_attestation(&ATTESTERS_2, 2)?,
        };

        let proposer_index = get_beacon_proposer_index(&state)?;

        process_attester_slashing(&config, &mut state, &attester_slashing, NullVerifier)?;

        let slashed = state
            .validators
            .iter()
            .positions(|validator| validator.slashed)
            .collect_vec();

        assert_eq!(slashed, [2800]);

        let max_balance = Minimal::MAX_EFFECTIVE_BALANCE;
        let penalty = max_balance / Minimal::MIN_SLASHING_PENALTY_QUOTIENT;
        let whistleblower_reward = max_balance / Minimal::WHISTLEBLOWER_REWARD_QUOTIENT;

        let expected_balance = |index| {
            let mut expected = max_balance;

            if index == 2800 {
                expected -= penalty;
            }

            // The proposer is also the whistleblower, so it receives the whole reward.
            if index == proposer_index {
                expected += whistleblower_reward;
            }

            expected
        };

        for index in [2800, proposer_index, 21, 1361, 5091] {
            assert_eq!(*state.balances.get(index)?, expected_balance(index));
        }

        Ok(())
    }

    #[test]
    fn identical_attestations_are_not_slashable() -> Result<()> {
        let state = state_with_validators(16)?;
        let attester_slashing = AttesterSlashing::<Minimal>::default();

        let error = validate_attester_slashing_with_verifier(
            &Config::minimal(),
            &state,
            &attester_slashing,
            NullVerifier,
        )
        .expect_err("attestation data is identical");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::AttestationDataNotSlashable { .. }),
        ));

        Ok(())
    }

    fn attestation_at_slot_5(state: &Phase0BeaconState<Minimal>) -> Result<Attestation<Minimal>> {
        let committee_size = get_beacon_committee(state, 5, 0)?.len();
        let mut aggregation_bits = BitList::with_capacity(committee_size)
            .map_err(|error| anyhow::anyhow!("{error:?}"))?;

        aggregation_bits
            .set(0, true)
            .map_err(|error| anyhow::anyhow!("{error:?}"))?;

        Ok(Attestation {
            aggregation_bits,
            data: AttestationData {
                slot: 5,
                ..AttestationData::default()
            },
            signatures: VariableList::new(vec![SignatureBytes::default()])
                .map_err(|error| anyhow::anyhow!("{error:?}"))?,
        })
    }

    #[test_case(0, true; "at minimum delay")]
    #[test_case(1, false; "one slot too early")]
    fn attestation_inclusion_delay_boundary(slots_early: u64, accepted: bool) -> Result<()> {
        let min_delay = Minimal::MIN_ATTESTATION_INCLUSION_DELAY.get();
        let state_slot = 5 + min_delay - slots_early;

        let mut state = state_with_validators(16)?;
        state.slot = state_slot;

        let attestation = attestation_at_slot_5(&state)?;
        let config = Config::minimal();
        let result =
            validate_attestation_with_verifier(&config, &state, &attestation, NullVerifier);

        if accepted {
            return result;
        }

        let error = result.expect_err("attestation is included before the minimum delay");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::AttestationIncludedTooEarly {
                attestation_slot: 5,
                state_slot: slot,
                min_delay: delay,
            }) if *slot == state_slot && *delay == min_delay,
        ));

        let message = error.to_string();

        assert!(message.contains("slot 5"));
        assert!(message.contains(&format!("slot {state_slot}")));

        Ok(())
    }

    #[test]
    fn new_deposit_with_valid_signature_adds_validator() -> Result<()> {
        let config = Config::minimal();
        let mut state = state_with_validators(4)?;

        let secret_key = SecretKey::random();
        let pubkey = PublicKeyBytes::from(&secret_key.to_public_key());

        let deposit_message = DepositMessage {
            pubkey,
            withdrawal_credentials: H256::repeat_byte(1),
            amount: Minimal::MAX_EFFECTIVE_BALANCE + 3,
        };

        let deposit_data = DepositData {
            pubkey,
            withdrawal_credentials: deposit_message.withdrawal_credentials,
            amount: deposit_message.amount,
            signature: (&deposit_message.sign(&config, &secret_key)).into(),
        };

        let outcome = process_deposit_data(&config, &mut state, deposit_data)?;

        assert_eq!(outcome, DepositOutcome::AddedValidator(4));
        assert_eq!(state.eth1_deposit_index, 1);
        assert_eq!(state.validators.get(4)?.effective_balance, Minimal::MAX_EFFECTIVE_BALANCE);
        assert_eq!(*state.balances.get(4)?, Minimal::MAX_EFFECTIVE_BALANCE + 3);
        assert_eq!(index_of_public_key(&state, &pubkey), Some(4));

        Ok(())
    }

    #[test]
    fn new_deposit_with_invalid_signature_is_rejected() -> Result<()> {
        let mut state = state_with_validators(4)?;

        let deposit_data = DepositData {
            pubkey: PublicKeyBytes::from(&SecretKey::random().to_public_key()),
            amount: Minimal::MAX_EFFECTIVE_BALANCE,
            ..DepositData::default()
        };

        let outcome = process_deposit_data(&Config::minimal(), &mut state, deposit_data)?;

        assert_eq!(outcome, DepositOutcome::Rejected);
        assert_eq!(state.eth1_deposit_index, 1);
        assert_eq!(state.validators.len_u64(), 4);

        Ok(())
    }

    #[test]
    fn deposit_for_known_key_tops_up_balance() -> Result<()> {
        let mut state = state_with_validators(4)?;
        let pubkey = state.validators.get(2)?.pubkey;

        let deposit_data = DepositData {
            pubkey,
            amount: 5,
            ..DepositData::default()
        };

        let outcome = process_deposit_data(&Config::minimal(), &mut state, deposit_data)?;

        assert_eq!(outcome, DepositOutcome::ToppedUp(2));
        assert_eq!(*state.balances.get(2)?, Minimal::MAX_EFFECTIVE_BALANCE + 5);

        Ok(())
    }

    #[test]
    fn deposit_with_wrong_proof_is_rejected() -> Result<()> {
        let state = state_with_validators(4)?;

        let error = verify_deposit_merkle_branch(&state, 0, &Deposit::default())
            .expect_err("proof does not lead to the deposit root");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::DepositProofInvalid { .. }),
        ));

        Ok(())
    }

    #[test]
    fn young_validator_cannot_exit() -> Result<()> {
        let state = state_with_validators(4)?;

        let error = validate_voluntary_exit_with_verifier(
            &Config::minimal(),
            &state,
            SignedVoluntaryExit::default(),
            NullVerifier,
        )
        .expect_err("validator was activated in the current epoch");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::ValidatorHasNotBeenActiveLongEnough { index: 0, .. }),
        ));

        Ok(())
    }

    #[test]
    fn too_few_deposits_are_rejected() -> Result<()> {
        let mut state = Phase0BeaconState::<Minimal>::default();
        state.eth1_data.deposit_count = 3;

        let body = Phase0BeaconBlockBody::<Minimal>::default();

        let error = validate_deposit_count(&state, &body).expect_err("block has no deposits");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::DepositCountMismatch {
                computed: 3,
                in_block: 0,
            }),
        ));

        Ok(())
    }
}
