use core::num::NonZeroU64;

use hex_literal::hex;
use nonzero_ext::nonzero;
use typenum::{U33, U4};

use crate::phase0::primitives::{DomainType, Epoch, Slot};

pub const BASE_REWARDS_PER_EPOCH: NonZeroU64 = nonzero!(4_u64);
pub const DEPOSIT_CONTRACT_TREE_DEPTH: usize = 32;
pub const DILITHIUM_WITHDRAWAL_PREFIX: u8 = 0x00;
pub const DOMAIN_BEACON_ATTESTER: DomainType = hex!("01000000");
pub const DOMAIN_BEACON_PROPOSER: DomainType = hex!("00000000");
pub const DOMAIN_DEPOSIT: DomainType = hex!("03000000");
pub const DOMAIN_RANDAO: DomainType = hex!("02000000");
pub const DOMAIN_VOLUNTARY_EXIT: DomainType = hex!("04000000");
pub const ETH1_ADDRESS_WITHDRAWAL_PREFIX: u8 = 0x01;
pub const FAR_FUTURE_EPOCH: Epoch = Epoch::MAX;
pub const GENESIS_EPOCH: Epoch = 0;
pub const GENESIS_SLOT: Slot = 0;

/// Depth of the deposit contract tree plus one node for the mixed in length.
pub type DepositProofLength = U33;
pub type JustificationBitsLength = U4;
