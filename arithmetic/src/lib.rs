//! Integer helpers shared by the state transition crates.
//!
//! Most preset values are `typenum` constants. These extension traits let call sites divide or
//! reduce by them without converting at every use.

#![expect(
    clippy::wrong_self_convention,
    reason = "This is needlessly strict. See <https://github.com/rust-lang/rust-clippy/issues/6727>."
)]

use core::num::{NonZeroU64, NonZeroUsize};

use easy_ext::ext;
use typenum::{NonZero, Unsigned};

#[ext(NonZeroExt)]
pub impl<N: Unsigned + NonZero> N {
    #[inline]
    #[must_use]
    fn non_zero() -> NonZeroU64 {
        Self::U64
            .try_into()
            .expect("the bound on N ensures that it is nonzero")
    }

    #[inline]
    #[must_use]
    fn non_zero_usize() -> NonZeroUsize {
        Self::USIZE
            .try_into()
            .expect("the bound on N ensures that it is nonzero")
    }
}

#[ext(UsizeExt)]
pub impl usize {
    #[inline]
    #[must_use]
    fn div_typenum<N: Unsigned + NonZero>(self) -> Self {
        self / N::USIZE
    }

    #[inline]
    #[must_use]
    fn mod_typenum<N: Unsigned + NonZero>(self) -> Self {
        self % N::USIZE
    }
}

#[ext(U64Ext)]
pub impl u64 {
    #[inline]
    #[must_use]
    fn prev_multiple_of(self, factor: NonZeroU64) -> Self {
        self - self % factor
    }

    #[inline]
    #[must_use]
    fn div_typenum<N: Unsigned + NonZero>(self) -> Self {
        self / N::U64
    }

    #[inline]
    #[must_use]
    fn mod_typenum<N: Unsigned + NonZero>(self) -> Self {
        self % N::U64
    }

    /// Multiplies and divides in `u128` so that the intermediate product cannot overflow.
    ///
    /// Returns `None` if `denominator` is zero or the quotient does not fit in `u64`.
    #[inline]
    #[must_use]
    fn mul_div(self, numerator: Self, denominator: Self) -> Option<u64> {
        let product = u128::from(self) * u128::from(numerator);
        let quotient = product.checked_div(denominator.into())?;
        quotient.try_into().ok()
    }
}

#[cfg(test)]
mod tests {
    use nonzero_ext::nonzero;
    use typenum::{U32, U8};

    use super::*;

    #[test]
    fn typenum_division_matches_plain_division() {
        assert_eq!(100_u64.div_typenum::<U32>(), 3);
        assert_eq!(100_u64.mod_typenum::<U32>(), 4);
        assert_eq!(17_usize.div_typenum::<U8>(), 2);
        assert_eq!(17_usize.mod_typenum::<U8>(), 1);
    }

    #[test]
    fn prev_multiple_of_rounds_down() {
        assert_eq!(17_u64.prev_multiple_of(nonzero!(8_u64)), 16);
        assert_eq!(16_u64.prev_multiple_of(nonzero!(8_u64)), 16);
        assert_eq!(7_u64.prev_multiple_of(nonzero!(8_u64)), 0);
    }

    #[test]
    fn mul_div_does_not_overflow_in_intermediate_product() {
        assert_eq!(u64::MAX.mul_div(3, 3), Some(u64::MAX));
        assert_eq!(u64::MAX.mul_div(2, 1), None);
        assert_eq!(5_u64.mul_div(1, 0), None);
    }

    #[test]
    fn non_zero_reflects_typenum_value() {
        assert_eq!(U32::non_zero().get(), 32);
        assert_eq!(U8::non_zero_usize().get(), 8);
    }
}
