//! Serde adapters: addresses as EIP-55 strings, integers as base-10 strings.

pub mod address {
    use ethers::types::Address;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::services::normalizer::{checksum, normalize_address};

    pub fn serialize<S: Serializer>(value: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&checksum(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let text = String::deserialize(deserializer)?;
        normalize_address(&text).map_err(serde::de::Error::custom)
    }
}

pub mod address_list {
    use ethers::types::Address;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::services::normalizer::{checksum, normalize_address};

    pub fn serialize<S: Serializer>(values: &[Address], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(checksum))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Address>, D::Error> {
        let texts = Vec::<String>::deserialize(deserializer)?;
        texts
            .iter()
            .map(|text| normalize_address(text).map_err(serde::de::Error::custom))
            .collect()
    }
}

pub mod uint {
    use ethers::types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::services::normalizer::to_big_int;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let text = String::deserialize(deserializer)?;
        to_big_int(text).map_err(serde::de::Error::custom)
    }
}

pub mod uint_list {
    use ethers::types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::services::normalizer::to_big_int;

    pub fn serialize<S: Serializer>(values: &[U256], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|value| value.to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<U256>, D::Error> {
        let texts = Vec::<String>::deserialize(deserializer)?;
        texts
            .into_iter()
            .map(|text| to_big_int(text).map_err(serde::de::Error::custom))
            .collect()
    }
}
