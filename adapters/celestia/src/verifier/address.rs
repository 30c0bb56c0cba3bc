use std::fmt::{Display, Formatter};
use std::str::FromStr;

use bech32::{FromBase32, ToBase32, Variant};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// The human readable part of every account address on the chain
pub const CELESTIA_HRP: &str = "celestia";

/// The length of an account address, in bytes
pub const ADDRESS_LEN: usize = 20;

/// The account which signs, and pays for, a transaction. Rendered as bech32 on the wire.
#[derive(
    Debug,
    PartialEq,
    Clone,
    Copy,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    BorshDeserialize,
    BorshSerialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct CelestiaAddress(pub [u8; ADDRESS_LEN]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid bech32 encoding: {0}")]
    Bech32(#[from] bech32::Error),
    #[error("wrong human readable part: expected {CELESTIA_HRP}, got {0}")]
    WrongHrp(String),
    #[error("address must be 20 bytes long, got {0}")]
    WrongLength(usize),
}

impl AsRef<[u8]> for CelestiaAddress {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<'a> TryFrom<&'a [u8]> for CelestiaAddress {
    type Error = AddressError;

    fn try_from(value: &'a [u8]) -> Result<Self, Self::Error> {
        let inner = value
            .try_into()
            .map_err(|_| AddressError::WrongLength(value.len()))?;
        Ok(Self(inner))
    }
}

impl From<[u8; ADDRESS_LEN]> for CelestiaAddress {
    fn from(value: [u8; ADDRESS_LEN]) -> Self {
        Self(value)
    }
}

impl FromStr for CelestiaAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hrp, data, _) = bech32::decode(s)?;
        if hrp != CELESTIA_HRP {
            return Err(AddressError::WrongHrp(hrp));
        }
        let bytes = Vec::<u8>::from_base32(&data)?;
        Self::try_from(bytes.as_slice())
    }
}

impl TryFrom<String> for CelestiaAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CelestiaAddress> for String {
    fn from(value: CelestiaAddress) -> Self {
        value.to_string()
    }
}

impl Display for CelestiaAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let encoded = bech32::encode(CELESTIA_HRP, self.0.to_base32(), Variant::Bech32)
            .map_err(|_| std::fmt::Error)?;
        f.write_str(&encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "celestia1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5wgawu3";

    fn bytes() -> [u8; ADDRESS_LEN] {
        let mut out = [0u8; ADDRESS_LEN];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = i as u8 + 1;
        }
        out
    }

    #[test]
    fn parses_and_displays_bech32() {
        let address: CelestiaAddress = ADDRESS.parse().unwrap();
        assert_eq!(address, CelestiaAddress(bytes()));
        assert_eq!(address.to_string(), ADDRESS);
    }

    #[test]
    fn rejects_other_chains() {
        let result = "cosmos1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7xu".parse::<CelestiaAddress>();
        assert_eq!(result, Err(AddressError::WrongHrp("cosmos".to_string())));
    }

    #[test]
    fn rejects_wrong_length() {
        let result = "celestia1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5z5tpwxqergd3c8g7rusqhv6mz5"
            .parse::<CelestiaAddress>();
        assert_eq!(result, Err(AddressError::WrongLength(32)));
    }

    #[test]
    fn rejects_bad_checksum() {
        let result = "celestia1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5wgawu4".parse::<CelestiaAddress>();
        assert!(matches!(result, Err(AddressError::Bech32(_))));
    }

    #[test]
    fn serde_uses_bech32() {
        let address = CelestiaAddress(bytes());
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", ADDRESS));
        let decoded: CelestiaAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, address);
    }
}
