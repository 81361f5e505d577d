use anyhow::{ensure, Result};
use execution_engine::{ExecutionEngine, NullExecutionEngine};
use helper_functions::{
    accessors::{get_current_epoch, get_randao_mix},
    misc::compute_timestamp_at_slot,
    predicates::{is_execution_enabled, is_merge_transition_complete},
    verifier::Verifier,
};
use tree_hash::TreeHash as _;
use types::{
    bellatrix::{
        beacon_state::BeaconState,
        containers::{BeaconBlock, ExecutionPayload, ExecutionPayloadHeader},
    },
    config::Config,
    phase0::primitives::H256,
    preset::Preset,
    traits::{self, PostBellatrixBeaconState},
};

use crate::{
    altair,
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

    altair::process_operations(config, state, &block.body, &mut verifier)?;
    altair::process_sync_aggregate(config, state, &block.body.sync_aggregate, verifier)
}

fn process_execution_payload<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    block_root: H256,
    payload: &ExecutionPayload<P>,
    execution_engine: impl ExecutionEngine<P>,
) -> Result<()> {
    validate_execution_payload(config, state, payload)?;

    // > Verify the execution payload is valid
    execution_engine.notify_new_payload(block_root, payload, None)?;

    // > Cache execution payload header
    state.latest_execution_payload_header = ExecutionPayloadHeader::from(payload);

    Ok(())
}

/// Checks the fields of `payload` that must agree with the consensus state.
///
/// This is shared by every phase with execution payloads.
pub fn validate_execution_payload<P: Preset>(
    config: &Config,
    state: &(impl PostBellatrixBeaconState<P> + ?Sized),
    payload: &(impl traits::ExecutionPayload<P> + ?Sized),
) -> Result<()> {
    // > Verify consistency of the parent hash with respect to the previous execution payload header
    if is_merge_transition_complete(state) {
        let in_state = state.latest_execution_payload_header().block_hash();
        let in_block = payload.parent_hash();

        ensure!(
            in_state == in_block,
            Error::ExecutionPayloadParentHashMismatch { in_state, in_block },
        );
    }

    // > Verify prev_randao
    let in_state = get_randao_mix(state, get_current_epoch(state));
    let in_block = payload.prev_randao();

    ensure!(
        in_state == in_block,
        Error::ExecutionPayloadPrevRandaoMismatch { in_state, in_block },
    );

    // > Verify timestamp
    let computed = compute_timestamp_at_slot(config, state, state.slot());
    let in_block = payload.timestamp();

    ensure!(
        computed == in_block,
        Error::ExecutionPayloadTimestampMismatch { computed, in_block },
    );

    Ok(())
}
