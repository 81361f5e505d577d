use crate::{consts::PUBLIC_KEY_SIZE, macros::fixed_bytes, public_key::PublicKey};

fixed_bytes! {
    /// Encoded public key as it appears in validator records and deposits.
    PublicKeyBytes, PUBLIC_KEY_SIZE
}

impl From<&PublicKey> for PublicKeyBytes {
    #[inline]
    fn from(public_key: &PublicKey) -> Self {
        public_key.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use ssz::{Decode as _, Encode as _};
    use tree_hash::TreeHash as _;

    use super::*;

    #[test]
    fn ssz_encoding_is_the_raw_bytes() -> Result<(), ssz::DecodeError> {
        let mut bytes = [0; PUBLIC_KEY_SIZE];
        bytes[0] = 1;
        bytes[PUBLIC_KEY_SIZE - 1] = 2;

        let public_key_bytes = PublicKeyBytes::from_array(bytes);
        let encoded = public_key_bytes.as_ssz_bytes();

        assert_eq!(encoded.as_slice(), bytes.as_slice());
        assert_eq!(PublicKeyBytes::from_ssz_bytes(&encoded)?, public_key_bytes);

        Ok(())
    }

    #[test]
    fn decoding_rejects_wrong_length() {
        assert!(PublicKeyBytes::from_ssz_bytes(&[0; 48]).is_err());
    }

    #[test]
    fn distinct_keys_have_distinct_roots() {
        let mut other = [0; PUBLIC_KEY_SIZE];
        other[PUBLIC_KEY_SIZE - 1] = 1;

        assert_ne!(
            PublicKeyBytes::default().tree_hash_root(),
            PublicKeyBytes::from_array(other).tree_hash_root(),
        );
    }

    #[test]
    fn serde_round_trips_through_hex() -> Result<(), serde_json::Error> {
        let public_key_bytes = PublicKeyBytes::from_array([0xab; PUBLIC_KEY_SIZE]);
        let json = serde_json::to_string(&public_key_bytes)?;

        assert!(json.starts_with("\"0xabab"));
        assert_eq!(
            serde_json::from_str::<PublicKeyBytes>(&json)?,
            public_key_bytes,
        );

        Ok(())
    }
}
