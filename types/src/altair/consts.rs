use core::num::NonZeroU64;

use hex_literal::hex;
use nonzero_ext::nonzero;
use static_assertions::const_assert_eq;

use crate::phase0::primitives::DomainType;

pub const DOMAIN_SYNC_COMMITTEE: DomainType = hex!("07000000");

pub const TIMELY_SOURCE_FLAG_INDEX: usize = 0;
pub const TIMELY_TARGET_FLAG_INDEX: usize = 1;
pub const TIMELY_HEAD_FLAG_INDEX: usize = 2;

pub const TIMELY_SOURCE_WEIGHT: u64 = 14;
pub const TIMELY_TARGET_WEIGHT: u64 = 26;
pub const TIMELY_HEAD_WEIGHT: u64 = 14;

pub const PARTICIPATION_FLAG_WEIGHTS: [(usize, u64); 3] = [
    (TIMELY_SOURCE_FLAG_INDEX, TIMELY_SOURCE_WEIGHT),
    (TIMELY_TARGET_FLAG_INDEX, TIMELY_TARGET_WEIGHT),
    (TIMELY_HEAD_FLAG_INDEX, TIMELY_HEAD_WEIGHT),
];

pub const SYNC_REWARD_WEIGHT: u64 = 2;
pub const PROPOSER_WEIGHT: u64 = 8;
pub const WEIGHT_DENOMINATOR: NonZeroU64 = nonzero!(64_u64);

const_assert_eq!(
    WEIGHT_DENOMINATOR.get(),
    TIMELY_SOURCE_WEIGHT
        + TIMELY_TARGET_WEIGHT
        + TIMELY_HEAD_WEIGHT
        + SYNC_REWARD_WEIGHT
        + PROPOSER_WEIGHT,
);
