use alloy_primitives::B256 as H256;
use once_cell::sync::Lazy;
use sha2::{Digest as _, Sha256};

/// Depth of the deposit contract tree plus one level for the length mix-in.
pub const ZERO_HASHES_LENGTH: usize = 34;

/// `ZERO_HASHES[i]` is the root of a Merkle tree of depth `i` with all leaves zeroed.
pub static ZERO_HASHES: Lazy<[H256; ZERO_HASHES_LENGTH]> = Lazy::new(|| {
    let mut hashes = [H256::ZERO; ZERO_HASHES_LENGTH];

    for height in 1..ZERO_HASHES_LENGTH {
        hashes[height] = hash_256_256(hashes[height - 1], hashes[height - 1]);
    }

    hashes
});

#[inline]
#[must_use]
pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> H256 {
    H256::from(<[u8; 32]>::from(Sha256::digest(bytes)))
}

#[inline]
#[must_use]
pub fn hash_256(bytes: H256) -> H256 {
    hash_bytes(bytes)
}

#[inline]
#[must_use]
pub fn hash_256_8(a: H256, b: u8) -> H256 {
    finish(Sha256::new().chain_update(a).chain_update([b]))
}

#[inline]
#[must_use]
pub fn hash_256_8_32(a: H256, b: u8, c: u32) -> H256 {
    finish(
        Sha256::new()
            .chain_update(a)
            .chain_update([b])
            .chain_update(c.to_le_bytes()),
    )
}

#[inline]
#[must_use]
pub fn hash_256_64(a: H256, b: u64) -> H256 {
    finish(Sha256::new().chain_update(a).chain_update(b.to_le_bytes()))
}

#[inline]
#[must_use]
pub fn hash_32_64_256(a: [u8; 4], b: u64, c: H256) -> H256 {
    finish(
        Sha256::new()
            .chain_update(a)
            .chain_update(b.to_le_bytes())
            .chain_update(c),
    )
}

#[inline]
#[must_use]
pub fn hash_256_256(left: H256, right: H256) -> H256 {
    finish(Sha256::new().chain_update(left).chain_update(right))
}

fn finish(hasher: Sha256) -> H256 {
    H256::from(<[u8; 32]>::from(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn zero_hashes_match_known_values() {
        assert_eq!(ZERO_HASHES[0], H256::ZERO);
        assert_eq!(
            ZERO_HASHES[1],
            H256::from(hex!(
                "f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b"
            )),
        );
        assert_eq!(
            ZERO_HASHES[32],
            H256::from(hex!(
                "985e929f70af28d0bdd1a90a808f977f597c7c778c489e98d3bd8910d31ac0f7"
            )),
        );
    }

    #[test]
    fn fixed_shape_hashes_agree_with_hashing_concatenated_bytes() {
        let root = H256::repeat_byte(0xab);

        let mut expected = root.to_vec();
        expected.push(7);
        expected.extend_from_slice(&9_u32.to_le_bytes());

        assert_eq!(hash_256_8_32(root, 7, 9), hash_bytes(&expected));

        let mut expected = [0x01, 0, 0, 0].to_vec();
        expected.extend_from_slice(&5_u64.to_le_bytes());
        expected.extend_from_slice(root.as_slice());

        assert_eq!(hash_32_64_256([0x01, 0, 0, 0], 5, root), hash_bytes(&expected));
    }
}
