use hex_literal::hex;

pub const VERSIONED_HASH_VERSION_KZG: [u8; 1] = hex!("01");
