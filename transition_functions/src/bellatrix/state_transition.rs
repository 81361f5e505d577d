use core::ops::Not as _;

use anyhow::Result;
use execution_engine::ExecutionEngine;
use helper_functions::verifier::{NullVerifier, Verifier};
use types::{
    bellatrix::{beacon_state::BeaconState, containers::SignedBeaconBlock},
    config::Config,
    phase0::primitives::Slot,
    preset::Preset,
};

use super::block_processing;
use crate::{
    altair,
    unphased::{self, ProcessSlots, StateRootPolicy},
};

pub fn process_slots<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    slot: Slot,
) -> Result<()> {
    unphased::process_slots(config, state, slot, altair::process_epoch)
}

pub fn state_transition<P: Preset, V: Verifier + Send>(
    config: &Config,
    state: &mut BeaconState<P>,
    signed_block: &SignedBeaconBlock<P>,
    process_slots: ProcessSlots,
    state_root_policy: StateRootPolicy,
    execution_engine: impl ExecutionEngine<P> + Send,
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
            altair::verify_signatures(config, &state, signed_block, &mut verifier)?;
            verifier.finish()
        }
    });

    let process_block = move || {
        // > Process block
        block_processing::custom_process_block(
            config,
            state,
            block,
            execution_engine,
            NullVerifier,
        )?;

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
