use types::phase0::primitives::Gwei;

pub trait EpochDeltas: Copy {
    fn combined_reward(self) -> Gwei;
    fn combined_penalty(self) -> Gwei;
}

/// Rewards and penalties with the components already added up.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct CombinedDeltas {
    pub reward: Gwei,
    pub penalty: Gwei,
}

impl EpochDeltas for CombinedDeltas {
    fn combined_reward(self) -> Gwei {
        self.reward
    }

    fn combined_penalty(self) -> Gwei {
        self.penalty
    }
}
