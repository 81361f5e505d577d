use core::ops::Not as _;

use anyhow::Result;
use helper_functions::verifier::{NullVerifier, Verifier, VerifierOption};
use types::{
    altair::{beacon_state::BeaconState, containers::SignedBeaconBlock},
    config::Config,
    phase0::primitives::Slot,
    preset::Preset,
    traits::{self, BeaconBlock as _, PostAltairBeaconState, SignedBeaconBlock as _},
};

use super::{block_processing, epoch_processing};
use crate::unphased::{self, ProcessSlots, StateRootPolicy};

pub fn process_slots<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    slot: Slot,
) -> Result<()> {
    unphased::process_slots(config, state, slot, epoch_processing::process_epoch)
}

pub fn state_transition<P: Preset, V: Verifier + Send>(
    config: &Config,
    state: &mut BeaconState<P>,
    signed_block: &SignedBeaconBlock<P>,
    process_slots: ProcessSlots,
    state_root_policy: StateRootPolicy,
    verifier: V,
) -> Result<()> {
    let block = &signed_block.message;

    // > Process slots (including those with no blocks) since block
    if process_slots.should_process(state, block) {
        self::process_slots(config, state, block.slot)?;
    }

    let verify_signatures = V::IS_NULL.not().then(|| {
        let state = state.clone();

        // > Verify signature
        move || {
            let mut verifier = verifier;
            verify_signatures(config, &state, signed_block, &mut verifier)?;
            verifier.finish()
        }
    });

    let mut process_block = || {
        // > Process block
        block_processing::custom_process_block(config, state, block, NullVerifier)?;

        // > Verify state root
        state_root_policy.verify(state, block)
    };

    if let Some(verify_signatures) = verify_signatures {
        let (signature_result, block_result) = rayon::join(verify_signatures, process_block);
        signature_result.and(block_result)
    } else {
        process_block()
    }
}

/// Passes every signature in a post-Altair block to `verifier` without calling
/// [`Verifier::finish`].
pub fn verify_signatures<P: Preset, V: Verifier>(
    config: &Config,
    state: &impl PostAltairBeaconState<P>,
    block: &(impl traits::SignedBeaconBlock<P> + ?Sized),
    mut verifier: V,
) -> Result<()> {
    unphased::verify_base_signatures(config, state, block, &mut verifier)?;

    if V::IS_NULL || verifier.has_option(VerifierOption::SkipBlockSyncAggregateSignature) {
        return Ok(());
    }

    if let Some(body) = block.message().body().post_altair() {
        let committee_indices = block_processing::current_sync_committee_indices(state)?;

        block_processing::verify_sync_aggregate_signature(
            config,
            state,
            &committee_indices,
            body.sync_aggregate(),
            verifier,
        )?;
    }

    Ok(())
}
