use ssz_types::{typenum::U48, FixedVector};

use crate::phase0::primitives::H256;

pub type KzgCommitment = FixedVector<u8, U48>;
pub type VersionedHash = H256;
