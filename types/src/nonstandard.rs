use enum_iterator::Sequence;
use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
    altair::{
        consts::{TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX},
        primitives::ParticipationFlags,
    },
    phase0::primitives::Epoch,
};

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Sequence,
    AsRefStr,
    Display,
    EnumString,
    Deserialize,
    Serialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Phase0,
    Altair,
    Bellatrix,
    Capella,
    Deneb,
}

/// Like [`Option`], but with [`None`] greater than any [`Some`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Toption<T> {
    // The order of variants affects the derived `PartialOrd` and `Ord` impls.
    Some(T),
    None,
}

impl<T> Toption<T> {
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Some(value) => Some(value),
            Self::None => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Enum)]
pub enum RelativeEpoch {
    Previous,
    Current,
    Next,
}

impl From<AttestationEpoch> for RelativeEpoch {
    fn from(attestation_epoch: AttestationEpoch) -> Self {
        match attestation_epoch {
            AttestationEpoch::Previous => Self::Previous,
            AttestationEpoch::Current => Self::Current,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AttestationEpoch {
    Previous,
    Current,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SyncCommitteeEpoch {
    Current,
    Next,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Enum)]
pub enum SlashingKind {
    Proposer,
    Attester,
}

/// Result of [`initiate_validator_exit`].
///
/// An already exiting validator is not an error in every context, so callers decide what to do
/// with [`ExitOutcome::AlreadyExited`].
///
/// [`initiate_validator_exit`]: ../../helper_functions/mutators/fn.initiate_validator_exit.html
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExitOutcome {
    Initiated { exit_epoch: Epoch },
    AlreadyExited { exit_epoch: Epoch },
}

impl ExitOutcome {
    #[must_use]
    pub const fn exit_epoch(self) -> Epoch {
        match self {
            Self::Initiated { exit_epoch } | Self::AlreadyExited { exit_epoch } => exit_epoch,
        }
    }

    #[must_use]
    pub const fn is_initiated(self) -> bool {
        matches!(self, Self::Initiated { .. })
    }
}

/// Participation of a validator in an epoch, decoded from Altair participation flags.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Participation(ParticipationFlags);

impl From<ParticipationFlags> for Participation {
    fn from(flags: ParticipationFlags) -> Self {
        Self(flags)
    }
}

impl Participation {
    #[must_use]
    pub const fn flags(self) -> ParticipationFlags {
        self.0
    }

    #[must_use]
    pub const fn has_flag(self, flag_index: usize) -> bool {
        self.0 & (1 << flag_index) != 0
    }

    #[must_use]
    pub const fn with_flag(self, flag_index: usize) -> Self {
        Self(self.0 | (1 << flag_index))
    }

    #[must_use]
    pub const fn matching_source(self) -> bool {
        self.has_flag(TIMELY_SOURCE_FLAG_INDEX)
    }

    #[must_use]
    pub const fn matching_target(self) -> bool {
        self.has_flag(TIMELY_TARGET_FLAG_INDEX)
    }

    #[must_use]
    pub const fn matching_head(self) -> bool {
        self.has_flag(TIMELY_HEAD_FLAG_INDEX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_ordered_and_named() -> Result<(), strum::ParseError> {
        assert!(Phase::Phase0 < Phase::Deneb);
        assert_eq!("Capella".parse::<Phase>()?, Phase::Capella);
        assert_eq!(Phase::Bellatrix.as_ref(), "bellatrix");
        assert_eq!(enum_iterator::all::<Phase>().count(), Phase::CARDINALITY);
        Ok(())
    }

    #[test]
    fn toption_none_is_greater_than_some() {
        assert!(Toption::Some(u64::MAX) < Toption::None);
        assert_eq!(Toption::Some(3).into_option(), Some(3));
    }

    #[test]
    fn participation_flags_are_set_independently() {
        let participation = Participation::default().with_flag(TIMELY_TARGET_FLAG_INDEX);

        assert!(!participation.matching_source());
        assert!(participation.matching_target());
        assert!(!participation.matching_head());
        assert_eq!(participation.flags(), 0b010);
    }
}
