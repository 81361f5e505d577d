// Both key and signature bytes are too long for the array impls provided by `ssz`, `tree_hash` and
// `serde`, so the impls are generated here.
macro_rules! fixed_bytes {
    ($(#[$attribute:meta])* $name:ident, $size:expr) => {
        $(#[$attribute])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name([u8; $size]);

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self([0; $size])
            }
        }

        impl $name {
            #[inline]
            #[must_use]
            pub const fn from_array(bytes: [u8; $size]) -> Self {
                Self(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, crate::Error> {
                bytes
                    .try_into()
                    .map(Self)
                    .map_err(|_| crate::Error::InvalidLength {
                        expected: $size,
                        actual: bytes.len(),
                    })
            }

            #[inline]
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $size] {
                &self.0
            }

            #[inline]
            #[must_use]
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|byte| *byte == 0)
            }
        }

        impl AsRef<[u8]> for $name {
            #[inline]
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(
                    formatter,
                    "{}(0x{}..)",
                    stringify!($name),
                    hex::encode(&self.0[..8]),
                )
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                use serde::de::Error as _;

                let string = String::deserialize(deserializer)?;
                let digits = string.strip_prefix("0x").unwrap_or(&string);
                let bytes = hex::decode(digits).map_err(D::Error::custom)?;
                Self::from_slice(&bytes).map_err(D::Error::custom)
            }
        }

        impl ssz::Encode for $name {
            #[inline]
            fn is_ssz_fixed_len() -> bool {
                true
            }

            #[inline]
            fn ssz_fixed_len() -> usize {
                $size
            }

            #[inline]
            fn ssz_bytes_len(&self) -> usize {
                $size
            }

            #[inline]
            fn ssz_append(&self, buffer: &mut Vec<u8>) {
                buffer.extend_from_slice(&self.0);
            }
        }

        impl ssz::Decode for $name {
            #[inline]
            fn is_ssz_fixed_len() -> bool {
                true
            }

            #[inline]
            fn ssz_fixed_len() -> usize {
                $size
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, ssz::DecodeError> {
                Self::from_slice(bytes).map_err(|_| ssz::DecodeError::InvalidByteLength {
                    len: bytes.len(),
                    expected: $size,
                })
            }
        }

        impl tree_hash::TreeHash for $name {
            fn tree_hash_type() -> tree_hash::TreeHashType {
                tree_hash::TreeHashType::Vector
            }

            fn tree_hash_packed_encoding(&self) -> tree_hash::PackedEncoding {
                unreachable!("vectors are never packed")
            }

            fn tree_hash_packing_factor() -> usize {
                unreachable!("vectors are never packed")
            }

            fn tree_hash_root(&self) -> tree_hash::Hash256 {
                tree_hash::merkle_root(&self.0, 0)
            }
        }
    };
}

pub(crate) use fixed_bytes;
