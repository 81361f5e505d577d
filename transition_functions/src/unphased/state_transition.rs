use anyhow::{ensure, Result};
use helper_functions::{
    accessors::{get_indexed_attestation, initialize_shuffled_indices, public_key},
    error::SignatureKind,
    misc::compute_epoch_at_slot,
    predicates::validate_constructed_indexed_attestation,
    signing::{RandaoEpoch, SignForAllForksWithGenesis, SignForSingleFork as _},
    verifier::{MultiVerifier, Verifier, VerifierOption},
};
use itertools::Itertools as _;
use rayon::iter::{
    IndexedParallelIterator as _, IntoParallelRefIterator as _, ParallelIterator as _,
};
use types::{
    config::Config,
    preset::Preset,
    traits::{BeaconBlock, BeaconBlockBody as _, BeaconState, SignedBeaconBlock},
};

use crate::unphased::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StateRootPolicy {
    Verify,
    Trust,
}

impl StateRootPolicy {
    pub fn verify<P: Preset>(
        self,
        state: &(impl BeaconState<P> + ?Sized),
        block: &(impl BeaconBlock<P> + ?Sized),
    ) -> Result<()> {
        match self {
            Self::Verify => {
                let computed = state.hash_tree_root();
                let in_block = block.state_root();

                ensure!(
                    computed == in_block,
                    Error::StateRootMismatch { computed, in_block },
                );
            }
            Self::Trust => {}
        }

        Ok(())
    }
}

/// Passes the signatures of the block and its operations to `verifier`.
///
/// Sync aggregate signatures are handled separately.
///
/// This does not call [`Verifier::finish`].
pub fn verify_base_signatures<P: Preset>(
    config: &Config,
    state: &(impl BeaconState<P> + ?Sized),
    block: &(impl SignedBeaconBlock<P> + ?Sized),
    mut verifier: impl Verifier,
) -> Result<()> {
    if verifier.has_option(VerifierOption::SkipBlockBaseSignatures) {
        return Ok(());
    }

    let message = block.message();
    let body = message.body();
    let proposer_public_key = public_key(state, message.proposer_index())?;

    verifier.reserve(count_base_signatures(message));

    // Block signature

    verifier.verify_singular(
        message.to_header().signing_root(config, state),
        block.signature(),
        proposer_public_key,
        SignatureKind::Block,
    )?;

    // RANDAO reveal

    if !verifier.has_option(VerifierOption::SkipRandaoVerification) {
        verifier.verify_singular(
            RandaoEpoch::from(compute_epoch_at_slot::<P>(message.slot()))
                .signing_root(config, state),
            body.randao_reveal(),
            proposer_public_key,
            SignatureKind::Randao,
        )?;
    }

    // Proposer slashings

    for proposer_slashing in body.proposer_slashings().iter() {
        for signed_header in [
            proposer_slashing.signed_header_1,
            proposer_slashing.signed_header_2,
        ] {
            verifier.verify_singular(
                signed_header.message.signing_root(config, state),
                signed_header.signature,
                public_key(state, signed_header.message.proposer_index)?,
                SignatureKind::Block,
            )?;
        }
    }

    // Attester slashings

    for attester_slashing in body.attester_slashings().iter() {
        for attestation in [
            &attester_slashing.attestation_1,
            &attester_slashing.attestation_2,
        ] {
            let signers = attestation
                .attesting_indices
                .iter()
                .copied()
                .map(|validator_index| Ok((validator_index, public_key(state, validator_index)?)))
                .collect::<Result<Vec<_>>>()?;

            verifier.verify_multiple(
                attestation.data.signing_root(config, state),
                &attestation.signatures,
                signers,
                SignatureKind::Attestation,
            )?;
        }
    }

    // Attestations

    let attestations = body.attestations();

    initialize_shuffled_indices(state, attestations.iter())?;

    let triples = attestations
        .par_iter()
        .enumerate()
        .map(|(position, attestation)| {
            let indexed_attestation = get_indexed_attestation(state, attestation)?;
            let mut attestation_verifier = MultiVerifier::default();

            validate_constructed_indexed_attestation(
                config,
                state,
                &indexed_attestation,
                &mut attestation_verifier,
            )?;

            let triples = attestation_verifier
                .into_triples()
                .into_iter()
                .map(|triple| triple.with_description_prefix(format!("attestation {position}")))
                .collect_vec();

            Ok(triples)
        })
        .collect::<Result<Vec<_>>>()?;

    verifier.extend(triples.into_iter().flatten(), SignatureKind::Attestation)?;

    // Voluntary exits

    for voluntary_exit in body.voluntary_exits().iter() {
        verifier.verify_singular(
            voluntary_exit.message.signing_root(config, state),
            voluntary_exit.signature,
            public_key(state, voluntary_exit.message.validator_index)?,
            SignatureKind::VoluntaryExit,
        )?;
    }

    // Dilithium to execution changes

    if let Some(body) = body.post_capella() {
        for signed_change in body.dilithium_to_execution_changes().iter() {
            let change = &signed_change.message;

            verifier.verify_singular(
                SignForAllForksWithGenesis::<P>::signing_root(change, config, state),
                signed_change.signature,
                &change.from_dilithium_pubkey,
                SignatureKind::DilithiumToExecutionChange,
            )?;
        }
    }

    Ok(())
}

/// Counts the signatures in `block` that [`verify_base_signatures`] checks, including the block
/// signature itself.
pub fn count_base_signatures<P: Preset>(block: &(impl BeaconBlock<P> + ?Sized)) -> usize {
    let body = block.body();

    let attester_slashing_signatures = body
        .attester_slashings()
        .iter()
        .map(|attester_slashing| {
            attester_slashing.attestation_1.signatures.len()
                + attester_slashing.attestation_2.signatures.len()
        })
        .sum::<usize>();

    let attestation_signatures = body
        .attestations()
        .iter()
        .map(|attestation| attestation.signatures.len())
        .sum::<usize>();

    let dilithium_to_execution_changes = body
        .post_capella()
        .map_or(0, |body| body.dilithium_to_execution_changes().len());

    2 + 2 * body.proposer_slashings().len()
        + attester_slashing_signatures
        + attestation_signatures
        + body.voluntary_exits().len()
        + dilithium_to_execution_changes
}
