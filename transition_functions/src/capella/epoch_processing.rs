use anyhow::Result;
use tree_hash::TreeHash as _;
use types::{
    capella::containers::HistoricalSummary, config::Config, preset::Preset,
    traits::PostCapellaBeaconState,
};

use crate::{altair, unphased};

/// Epoch processing for Capella and Deneb.
pub fn process_epoch<P: Preset>(
    config: &Config,
    state: &mut impl PostCapellaBeaconState<P>,
) -> Result<()> {
    // > [Modified in Capella]
    altair::process_epoch_with(config, state, process_historical_summaries_update)
}

pub fn process_historical_summaries_update<P: Preset>(
    state: &mut impl PostCapellaBeaconState<P>,
) -> Result<()> {
    // > Set historical block root accumulator.
    if unphased::is_historical_accumulator_boundary(state) {
        let historical_summary = HistoricalSummary {
            block_summary_root: state.block_roots().tree_hash_root(),
            state_summary_root: state.state_roots().tree_hash_root(),
        };

        state.historical_summaries_mut().push(historical_summary)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use types::{capella::beacon_state::BeaconState, phase0::primitives::H256, preset::Minimal};

    use super::*;

    #[test]
    fn summary_is_appended_at_accumulator_boundary() -> Result<()> {
        let mut state = BeaconState::<Minimal> {
            slot: 63,
            ..BeaconState::default()
        };

        *state.block_roots.mod_index_mut(5) = H256::repeat_byte(1);

        process_historical_summaries_update(&mut state)?;

        assert_eq!(state.historical_summaries.len_u64(), 1);

        let summary = state.historical_summaries.get(0)?;

        assert_eq!(summary.block_summary_root, state.block_roots.tree_hash_root());
        assert_eq!(summary.state_summary_root, state.state_roots.tree_hash_root());

        // Phase 0 style accumulation is frozen from Capella onward.
        assert_eq!(state.historical_roots.len_u64(), 0);

        Ok(())
    }

    #[test]
    fn no_summary_between_boundaries() -> Result<()> {
        let mut state = BeaconState::<Minimal> {
            slot: 55,
            ..BeaconState::default()
        };

        process_historical_summaries_update(&mut state)?;

        assert_eq!(state.historical_summaries.len_u64(), 0);

        Ok(())
    }
}
