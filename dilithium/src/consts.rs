/// Length of an encoded ML-DSA-87 public key.
pub const PUBLIC_KEY_SIZE: usize = 2592;

/// Length of a detached ML-DSA-87 signature.
pub const SIGNATURE_SIZE: usize = 4627;

#[cfg(test)]
mod tests {
    use pqcrypto_mldsa::mldsa87;

    use super::*;

    #[test]
    fn sizes_match_backend() {
        assert_eq!(PUBLIC_KEY_SIZE, mldsa87::public_key_bytes());
        assert_eq!(SIGNATURE_SIZE, mldsa87::signature_bytes());
    }
}
