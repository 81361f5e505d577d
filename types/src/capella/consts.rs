use hex_literal::hex;

use crate::phase0::primitives::DomainType;

pub const DOMAIN_DILITHIUM_TO_EXECUTION_CHANGE: DomainType = hex!("0a000000");
