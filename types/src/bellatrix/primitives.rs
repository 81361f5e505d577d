use ssz_types::VariableList;

use crate::{phase0::primitives::Uint256, preset::Preset};

pub type Gas = u64;
pub type Transaction<P> = VariableList<u8, <P as Preset>::MaxBytesPerTransaction>;
pub type Wei = Uint256;
