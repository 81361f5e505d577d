//! Serde helpers for values that YAML configurations write as `0x`-prefixed hex.

pub mod prefixed_hex {
    use hex::FromHex;
    use serde::{de::Error as _, Deserialize as _, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: impl AsRef<[u8]>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: FromHex<Error: core::fmt::Display>,
    {
        let string = String::deserialize(deserializer)?;
        let digits = string.strip_prefix("0x").unwrap_or(&string);
        T::from_hex(digits).map_err(D::Error::custom)
    }
}
