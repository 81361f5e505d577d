use anyhow::{ensure, Result};
use helper_functions::misc;
use logging::{trace_with_progress, TRANSITION_LOG_METRICS};
use tree_hash::TreeHash as _;
use types::{
    config::Config,
    phase0::primitives::Slot,
    preset::Preset,
    traits::{BeaconBlock, BeaconState},
};

use crate::unphased::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProcessSlots {
    Always,
    IfNeeded,
    Never,
}

impl ProcessSlots {
    pub fn should_process<P: Preset>(
        self,
        state: &(impl BeaconState<P> + ?Sized),
        block: &(impl BeaconBlock<P> + ?Sized),
    ) -> bool {
        match self {
            Self::Always => true,
            // The test for equality is intentional. It ensures that blocks attempting to "rewind"
            // the state are rejected early by `process_slots`.
            // `state.slot < block.slot` would also work, but the block would be rejected as invalid
            // later, while verifying the state root.
            Self::IfNeeded => state.slot() != block.slot(),
            Self::Never => false,
        }
    }
}

pub fn process_slot<P: Preset>(state: &mut (impl BeaconState<P> + ?Sized)) {
    let slot = state.slot();

    // > Cache state root
    let previous_state_root = state.hash_tree_root();
    *state.state_roots_mut().mod_index_mut(slot) = previous_state_root;

    // > Cache latest block header state root
    if state.latest_block_header().state_root.is_zero() {
        state.latest_block_header_mut().state_root = previous_state_root;
    }

    // > Cache block root
    let previous_block_root = state.latest_block_header().tree_hash_root();
    *state.block_roots_mut().mod_index_mut(slot) = previous_block_root;

    state.cache_mut().advance_slot();
}

/// Advances `state` to `slot` without crossing into another fork.
///
/// `process_epoch` runs on the last slot of every epoch, before the slot number is incremented.
pub fn process_slots<P: Preset, S: BeaconState<P>>(
    config: &Config,
    state: &mut S,
    slot: Slot,
    process_epoch: impl Fn(&Config, &mut S) -> Result<()>,
) -> Result<()> {
    ensure!(
        state.slot() < slot,
        Error::SlotNotLater {
            current: state.slot(),
            target: slot,
        },
    );

    while state.slot() < slot {
        process_slot(state);

        // > Process epoch on the start slot of the next epoch
        if misc::is_epoch_start::<P>(state.slot() + 1) {
            process_epoch(config, state)?;
        }

        *state.slot_mut() += 1;

        TRANSITION_LOG_METRICS.record_slot();
        trace_with_progress!("processed slot {}", state.slot());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use types::{
        phase0::{beacon_state::BeaconState as Phase0BeaconState, primitives::H256},
        preset::Minimal,
    };

    use super::*;

    #[test]
    fn process_slot_fills_in_latest_block_header_state_root() {
        let mut state = Phase0BeaconState::<Minimal>::default();
        let state_root = state.hash_tree_root();

        process_slot(&mut state);

        assert_eq!(state.latest_block_header.state_root, state_root);
        assert_eq!(*state.state_roots.mod_index(0), state_root);
        assert_eq!(
            *state.block_roots.mod_index(0),
            state.latest_block_header.tree_hash_root(),
        );
    }

    #[test]
    fn process_slot_keeps_existing_header_state_root() {
        let mut state = Phase0BeaconState::<Minimal>::default();
        state.latest_block_header.state_root = H256::repeat_byte(1);

        process_slot(&mut state);

        assert_eq!(state.latest_block_header.state_root, H256::repeat_byte(1));
    }

    #[test]
    fn process_slots_runs_epoch_processing_at_epoch_ends() -> Result<()> {
        let mut state = Phase0BeaconState::<Minimal>::default();
        let epochs = core::cell::Cell::new(0);

        process_slots(&Config::minimal(), &mut state, 17, |_, state| {
            assert!(misc::is_epoch_start::<Minimal>(state.slot + 1));
            epochs.set(epochs.get() + 1);
            Ok(())
        })?;

        assert_eq!(state.slot, 17);
        assert_eq!(epochs.get(), 2);

        Ok(())
    }

    #[test]
    fn process_slots_rejects_earlier_slot() {
        let mut state = Phase0BeaconState::<Minimal> {
            slot: 5,
            ..Phase0BeaconState::default()
        };

        let error = process_slots(&Config::minimal(), &mut state, 5, |_, _| Ok(()))
            .expect_err("state is already at slot 5");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::SlotNotLater {
                current: 5,
                target: 5,
            }),
        ));
    }
}
