use anyhow::{ensure, Result};
use bit_field::BitField as _;
use itertools::Itertools as _;
use types::{
    config::Config,
    phase0::{
        consts::{ETH1_ADDRESS_WITHDRAWAL_PREFIX, FAR_FUTURE_EPOCH},
        containers::{AttestationData, IndexedAttestation, Validator},
        primitives::{Epoch, Gwei, H256},
    },
    preset::Preset,
    traits::{BeaconState, PostBellatrixBeaconBlockBody, PostBellatrixBeaconState},
};

use crate::{
    accessors,
    error::{Error, SignatureKind},
    signing::SignForSingleFork as _,
    verifier::Verifier,
};

#[inline]
#[must_use]
pub const fn is_active_validator(validator: &Validator, epoch: Epoch) -> bool {
    validator.activation_epoch <= epoch && epoch < validator.exit_epoch
}

#[must_use]
pub const fn is_eligible_for_activation_queue<P: Preset>(validator: &Validator) -> bool {
    validator.activation_eligibility_epoch == FAR_FUTURE_EPOCH
        && validator.effective_balance == P::MAX_EFFECTIVE_BALANCE
}

#[must_use]
pub fn is_eligible_for_activation<P: Preset>(
    state: &(impl BeaconState<P> + ?Sized),
    validator: &Validator,
) -> bool {
    // Placement in the queue is finalized and the validator has not been activated yet.
    validator.activation_eligibility_epoch <= state.finalized_checkpoint().epoch
        && validator.activation_epoch == FAR_FUTURE_EPOCH
}

#[inline]
#[must_use]
pub const fn is_eligible_for_penalties(validator: &Validator, previous_epoch: Epoch) -> bool {
    is_active_validator(validator, previous_epoch)
        || (validator.slashed && previous_epoch + 1 < validator.withdrawable_epoch)
}

#[inline]
#[must_use]
pub const fn is_slashable_validator(validator: &Validator, epoch: Epoch) -> bool {
    !validator.slashed
        && validator.activation_epoch <= epoch
        && epoch < validator.withdrawable_epoch
}

/// Checks for a double vote or for `data_1` surrounding `data_2`.
///
/// The surround check is one-sided. Callers that need both directions swap the arguments.
#[inline]
#[must_use]
pub fn is_slashable_attestation_data(data_1: AttestationData, data_2: AttestationData) -> bool {
    data_1 != data_2
        && (data_1.target.epoch == data_2.target.epoch
            || (data_1.source.epoch < data_2.source.epoch
                && data_2.target.epoch < data_1.target.epoch))
}

/// Validates `indexed_attestation` and passes its signatures to `verifier`.
///
/// With a [`MultiVerifier`](crate::verifier::MultiVerifier) the signatures are only collected.
pub fn validate_constructed_indexed_attestation<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
    indexed_attestation: &IndexedAttestation<P>,
    mut verifier: impl Verifier,
) -> Result<()> {
    let indices = &indexed_attestation.attesting_indices;
    let signatures = &indexed_attestation.signatures;

    ensure!(!indices.is_empty(), Error::AttestationHasNoAttestingIndices);

    ensure!(
        indices.iter().tuple_windows().all(|(a, b)| a < b),
        Error::AttestingIndicesNotSortedAndUnique,
    );

    ensure!(
        indices.len() == signatures.len(),
        Error::SignatureCountMismatch {
            signature_count: signatures.len(),
            attesting_index_count: indices.len(),
        },
    );

    let signers = indices
        .iter()
        .map(|validator_index| {
            let public_key = accessors::public_key(state, *validator_index)?;
            Ok((*validator_index, public_key))
        })
        .collect::<Result<Vec<_>>>()?;

    verifier.verify_multiple(
        indexed_attestation.data.signing_root(config, state),
        signatures,
        signers,
        SignatureKind::Attestation,
    )
}

/// Checks a Merkle proof of `leaf` at `index`, with `branch` ordered from the leaf up.
///
/// The depth of the tree is the length of `branch`.
#[must_use]
pub fn is_valid_merkle_branch(
    leaf: H256,
    branch: impl IntoIterator<Item = H256>,
    index: u64,
    root: H256,
) -> bool {
    let mut hash = leaf;

    for (height, node) in branch.into_iter().enumerate() {
        if height < 64 && index.get_bit(height) {
            hash = hashing::hash_256_256(node, hash);
        } else {
            hash = hashing::hash_256_256(hash, node);
        }
    }

    hash == root
}

#[must_use]
pub fn is_in_inactivity_leak<P: Preset>(state: &(impl BeaconState<P> + ?Sized)) -> bool {
    accessors::get_finality_delay(state) > P::MIN_EPOCHS_TO_INACTIVITY_PENALTY
}

#[must_use]
pub fn is_merge_transition_complete<P: Preset>(
    state: &(impl PostBellatrixBeaconState<P> + ?Sized),
) -> bool {
    !state.latest_execution_payload_header().is_default_payload()
}

#[must_use]
pub fn is_execution_enabled<P: Preset>(
    state: &(impl PostBellatrixBeaconState<P> + ?Sized),
    body: &(impl PostBellatrixBeaconBlockBody<P> + ?Sized),
) -> bool {
    is_merge_transition_complete(state) || !body.execution_payload().is_default_payload()
}

#[must_use]
pub fn has_eth1_withdrawal_credential(validator: &Validator) -> bool {
    validator.withdrawal_credentials[0] == ETH1_ADDRESS_WITHDRAWAL_PREFIX
}

#[must_use]
pub fn is_fully_withdrawable_validator(validator: &Validator, balance: Gwei, epoch: Epoch) -> bool {
    has_eth1_withdrawal_credential(validator)
        && validator.withdrawable_epoch <= epoch
        && balance > 0
}

#[must_use]
pub fn is_partially_withdrawable_validator<P: Preset>(
    validator: &Validator,
    balance: Gwei,
) -> bool {
    let has_max_effective_balance = validator.effective_balance == P::MAX_EFFECTIVE_BALANCE;
    let has_excess_balance = balance > P::MAX_EFFECTIVE_BALANCE;
    has_eth1_withdrawal_credential(validator) && has_max_effective_balance && has_excess_balance
}

#[cfg(test)]
mod tests {
    use dilithium::{SecretKey, SignatureBytes};
    use ssz_types::VariableList;
    use test_case::test_case;
    use types::{
        collections::Validators,
        phase0::{beacon_state::BeaconState as Phase0BeaconState, containers::Checkpoint},
        preset::Minimal,
    };

    use crate::{
        signing::SignForSingleFork,
        verifier::{NullVerifier, SingleVerifier},
    };

    use super::*;

    fn data(source_epoch: Epoch, target_epoch: Epoch, root_byte: u8) -> AttestationData {
        AttestationData {
            beacon_block_root: H256::repeat_byte(root_byte),
            source: Checkpoint {
                epoch: source_epoch,
                root: H256::ZERO,
            },
            target: Checkpoint {
                epoch: target_epoch,
                root: H256::ZERO,
            },
            ..AttestationData::default()
        }
    }

    fn indexed_attestation(
        indices: Vec<u64>,
        signatures: Vec<SignatureBytes>,
    ) -> Result<IndexedAttestation<Minimal>> {
        Ok(IndexedAttestation {
            attesting_indices: VariableList::new(indices)
                .map_err(|error| anyhow::anyhow!("{error:?}"))?,
            data: data(0, 0, 0),
            signatures: VariableList::new(signatures)
                .map_err(|error| anyhow::anyhow!("{error:?}"))?,
        })
    }

    #[test_case(data(0, 2, 1), data(0, 2, 2) => true; "double vote")]
    #[test_case(data(0, 2, 1), data(0, 2, 1) => false; "identical votes")]
    #[test_case(data(0, 5, 0), data(1, 4, 0) => true; "first surrounds second")]
    #[test_case(data(1, 4, 0), data(0, 5, 0) => false; "second surrounds first")]
    #[test_case(data(0, 3, 0), data(1, 4, 0) => false; "consecutive votes")]
    fn slashable_attestation_data(data_1: AttestationData, data_2: AttestationData) -> bool {
        is_slashable_attestation_data(data_1, data_2)
    }

    #[test]
    fn slashable_validator_bounds() {
        let validator = Validator {
            activation_epoch: 2,
            withdrawable_epoch: 5,
            ..Validator::default()
        };

        assert!(!is_slashable_validator(&validator, 1));
        assert!(is_slashable_validator(&validator, 2));
        assert!(is_slashable_validator(&validator, 4));
        assert!(!is_slashable_validator(&validator, 5));

        let slashed = Validator {
            slashed: true,
            ..validator
        };

        assert!(!is_slashable_validator(&slashed, 3));
    }

    #[test]
    fn merkle_branch_of_four_leaves() {
        let leaves = [1, 2, 3, 4].map(H256::repeat_byte);
        let left = hashing::hash_256_256(leaves[0], leaves[1]);
        let right = hashing::hash_256_256(leaves[2], leaves[3]);
        let root = hashing::hash_256_256(left, right);

        assert!(is_valid_merkle_branch(leaves[2], [leaves[3], left], 2, root));
        assert!(is_valid_merkle_branch(leaves[1], [leaves[0], right], 1, root));
        assert!(!is_valid_merkle_branch(leaves[1], [leaves[0], right], 0, root));
    }

    #[test]
    fn eth1_credentials_make_validators_withdrawable() {
        let mut withdrawal_credentials = H256::ZERO;
        withdrawal_credentials[0] = ETH1_ADDRESS_WITHDRAWAL_PREFIX;

        let validator = Validator {
            withdrawal_credentials,
            effective_balance: Minimal::MAX_EFFECTIVE_BALANCE,
            withdrawable_epoch: 3,
            ..Validator::default()
        };

        assert!(is_fully_withdrawable_validator(&validator, 1, 3));
        assert!(!is_fully_withdrawable_validator(&validator, 0, 3));
        assert!(!is_fully_withdrawable_validator(&validator, 1, 2));
        assert!(is_partially_withdrawable_validator::<Minimal>(
            &validator,
            Minimal::MAX_EFFECTIVE_BALANCE + 1,
        ));

        let dilithium_validator = Validator {
            withdrawal_credentials: H256::ZERO,
            ..validator
        };

        assert!(!is_fully_withdrawable_validator(&dilithium_validator, 1, 3));
    }

    #[test]
    fn empty_indexed_attestation_is_rejected() -> Result<()> {
        let state = Phase0BeaconState::<Minimal>::default();
        let attestation = indexed_attestation(vec![], vec![])?;

        let error = validate_constructed_indexed_attestation(
            &Config::minimal(),
            &state,
            &attestation,
            NullVerifier,
        )
        .expect_err("an attestation must have attesters");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::AttestationHasNoAttestingIndices),
        ));

        Ok(())
    }

    #[test_case(vec![2, 1]; "descending")]
    #[test_case(vec![1, 1]; "duplicate")]
    fn unsorted_indices_are_rejected(indices: Vec<u64>) -> Result<()> {
        let state = Phase0BeaconState::<Minimal>::default();
        let signatures = vec![SignatureBytes::empty(); indices.len()];
        let attestation = indexed_attestation(indices, signatures)?;

        let error = validate_constructed_indexed_attestation(
            &Config::minimal(),
            &state,
            &attestation,
            NullVerifier,
        )
        .expect_err("indices must be strictly increasing");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::AttestingIndicesNotSortedAndUnique),
        ));

        Ok(())
    }

    #[test]
    fn missing_signature_is_rejected() -> Result<()> {
        let state = Phase0BeaconState::<Minimal>::default();
        let attestation = indexed_attestation(vec![0, 1], vec![SignatureBytes::empty()])?;

        let error = validate_constructed_indexed_attestation(
            &Config::minimal(),
            &state,
            &attestation,
            NullVerifier,
        )
        .expect_err("every attester must sign");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::SignatureCountMismatch {
                signature_count: 1,
                attesting_index_count: 2,
            }),
        ));

        Ok(())
    }

    #[test]
    fn every_attester_signature_is_verified() -> Result<()> {
        let config = Config::minimal();
        let secret_keys = [SecretKey::random(), SecretKey::random()];

        let validators = secret_keys.iter().map(|secret_key| Validator {
            pubkey: secret_key.to_public_key().to_bytes(),
            ..Validator::default()
        });

        let state = Phase0BeaconState::<Minimal> {
            validators: Validators::<Minimal>::try_from_iter(validators)?,
            ..Phase0BeaconState::default()
        };

        let message = data(0, 0, 0);

        let signatures = secret_keys
            .iter()
            .map(|secret_key| message.sign(&config, &state, secret_key).to_bytes())
            .collect::<Vec<_>>();

        let attestation = indexed_attestation(vec![0, 1], signatures.clone())?;

        validate_constructed_indexed_attestation(&config, &state, &attestation, SingleVerifier)?;

        let swapped = indexed_attestation(vec![0, 1], signatures.into_iter().rev().collect())?;

        let error =
            validate_constructed_indexed_attestation(&config, &state, &swapped, SingleVerifier)
                .expect_err("signatures must be paired with their signers");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::SignatureInvalid(SignatureKind::Attestation)),
        ));

        Ok(())
    }
}
