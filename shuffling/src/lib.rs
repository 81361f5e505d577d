//! Swap-or-not shuffling.
//!
//! [`shuffle_slice`] permutes a whole list in `SHUFFLE_ROUND_COUNT` passes and is what committee
//! computation uses. [`shuffle_single`] follows one index through the same rounds, which is cheaper
//! when only a few positions are needed (proposer and sync committee selection).

use core::num::NonZeroU64;

use bit_field::BitArray as _;
use itertools::izip;
use thiserror::Error;
use types::{phase0::primitives::H256, preset::Preset};

const BITS_PER_HASH: usize = core::mem::size_of::<H256>() * 8;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("index {index} is out of range for {index_count} indices")]
    IndexOutOfRange { index: u64, index_count: u64 },
}

/// Shuffles `slice` in place so that `slice[i]` ends up holding the element that was at
/// `shuffle_single(i, len, seed)`.
///
/// Rounds are applied in reverse, mirroring each half around its midpoint so that one hash serves
/// 256 consecutive positions.
pub fn shuffle_slice<P: Preset, T>(slice: &mut [T], seed: H256) -> Result<(), Error> {
    let index_count = slice.len() as u64;

    let Some(length) = NonZeroU64::new(index_count) else {
        return Ok(());
    };

    for round in (0..P::SHUFFLE_ROUND_COUNT).rev() {
        let pivot = usize::try_from(compute_pivot(seed, round, length))
            .expect("remainder of division by slice length fits in usize");

        let midpoint = pivot + 1;
        let (low, high) = slice.split_at_mut(midpoint);

        swap_around_mirror(seed, round, low, 0);
        swap_around_mirror(seed, round, high, midpoint);
    }

    Ok(())
}

fn swap_around_mirror<T>(seed: H256, round: u8, slice: &mut [T], offset: usize) {
    let mirror = slice.len() / 2;
    let offset_mirror = offset + mirror;
    let offset_length = offset + slice.len();
    let trailing = mirror.min(offset_length % BITS_PER_HASH);
    let leading = (mirror - trailing) % BITS_PER_HASH;

    let (low, mut high) = slice.split_at_mut(mirror);

    // The middle element of an odd-length half is its own mirror image.
    if low.len() < high.len() {
        high = &mut high[1..];
    }

    if trailing > 0 {
        let source = compute_source(seed, round, (offset_length / BITS_PER_HASH) as u64);
        let bit_indices = (0..offset_length % BITS_PER_HASH).rev();
        let low_elements = low[..trailing].iter_mut();
        let high_elements = high[mirror - trailing..].iter_mut().rev();

        swap_using_source(source, bit_indices, low_elements, high_elements);
    }

    for (window, low_chunk, high_chunk) in izip!(
        (0..offset_length / BITS_PER_HASH).rev(),
        low[trailing..].chunks_exact_mut(BITS_PER_HASH),
        high[..mirror - trailing].rchunks_exact_mut(BITS_PER_HASH),
    ) {
        let source = compute_source(seed, round, window as u64);

        swap_using_source(
            source,
            0..BITS_PER_HASH,
            low_chunk.iter_mut().rev(),
            high_chunk,
        );
    }

    if leading > 0 {
        let source = compute_source(seed, round, (offset_mirror / BITS_PER_HASH) as u64);
        let bit_indices = (0..BITS_PER_HASH).rev();
        let low_elements = low[mirror - leading..].iter_mut();
        let high_elements = high[..leading].iter_mut().rev();

        swap_using_source(source, bit_indices, low_elements, high_elements);
    }
}

fn swap_using_source<'slice, T: 'slice>(
    source: H256,
    bit_indices: impl IntoIterator<Item = usize>,
    low: impl IntoIterator<Item = &'slice mut T>,
    high: impl IntoIterator<Item = &'slice mut T>,
) {
    for (bit_index, element, mirrored) in izip!(bit_indices, low, high) {
        if source.as_slice().get_bit(bit_index) {
            core::mem::swap(element, mirrored);
        }
    }
}

/// Returns the position `index` is moved to by the shuffle of `index_count` elements.
pub fn shuffle_single<P: Preset>(
    mut index: u64,
    index_count: u64,
    seed: H256,
) -> Result<u64, Error> {
    let count = NonZeroU64::new(index_count)
        .filter(|count| index < count.get())
        .ok_or(Error::IndexOutOfRange { index, index_count })?;

    for round in 0..P::SHUFFLE_ROUND_COUNT {
        let pivot = compute_pivot(seed, round, count);
        let flip = (pivot + index_count - index) % count;
        let position = index.max(flip);
        let source = compute_source(seed, round, position / BITS_PER_HASH as u64);
        let bit_index = usize::from(position.to_le_bytes()[0]);

        if source.as_slice().get_bit(bit_index) {
            index = flip;
        }
    }

    Ok(index)
}

fn compute_pivot(seed: H256, round: u8, index_count: NonZeroU64) -> u64 {
    let hash = hashing::hash_256_8(seed, round);
    let mut pivot_bytes = [0; core::mem::size_of::<u64>()];

    pivot_bytes.copy_from_slice(&hash[..core::mem::size_of::<u64>()]);

    u64::from_le_bytes(pivot_bytes) % index_count
}

fn compute_source(seed: H256, round: u8, position_window: u64) -> H256 {
    // Windows are hashed as `uint32`. Anything larger would need more than 2^40 validators.
    #[expect(clippy::cast_possible_truncation)]
    let position_window = position_window as u32;

    hashing::hash_256_8_32(seed, round, position_window)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use hex_literal::hex;
    use itertools::Itertools as _;
    use test_case::test_case;
    use types::preset::{Mainnet, Minimal};

    use super::*;

    const SEED: H256 = H256::new(hex!(
        "4fe91d85d2e4b2ffe4f1f8e9a8a6c5e3d3a6e2f1c0b9a8d7e6f5a4b3c2d1e0f0"
    ));

    #[test_case(1)]
    #[test_case(2)]
    #[test_case(33)]
    #[test_case(256)]
    #[test_case(300)]
    #[test_case(777)]
    fn slice_shuffle_agrees_with_single_index_shuffle(index_count: u64) -> Result<()> {
        let mut shuffled = (0..index_count).collect_vec();

        shuffle_slice::<Minimal, _>(&mut shuffled, SEED)?;

        for (position, index) in shuffled.into_iter().enumerate() {
            assert_eq!(
                shuffle_single::<Minimal>(position as u64, index_count, SEED)?,
                index,
            );
        }

        Ok(())
    }

    #[test]
    fn shuffle_is_a_permutation() -> Result<()> {
        let mut shuffled = (0..1000_u64).collect_vec();

        shuffle_slice::<Mainnet, _>(&mut shuffled, SEED)?;

        assert_ne!(shuffled, (0..1000).collect_vec());
        assert!(shuffled.iter().copied().sorted().eq(0..1000));

        Ok(())
    }

    #[test]
    fn empty_slice_is_left_alone() -> Result<()> {
        let mut empty: [u64; 0] = [];
        shuffle_slice::<Mainnet, _>(&mut empty, SEED)?;
        Ok(())
    }

    #[test_case(5, 5)]
    #[test_case(6, 5)]
    #[test_case(0, 0)]
    fn single_index_out_of_range_is_rejected(index: u64, index_count: u64) {
        assert_eq!(
            shuffle_single::<Mainnet>(index, index_count, SEED),
            Err(Error::IndexOutOfRange { index, index_count }),
        );
    }
}
