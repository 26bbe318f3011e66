use std::fmt::Display;
use std::str::FromStr;

use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An Ethereum-style wallet address: `0x` followed by 40 hex characters.
///
/// Always stored and compared in lowercase, so the case-insensitive equality
/// the signature-recovery flow needs is just `==`.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid wallet address: expected 0x followed by 40 hex characters")]
pub struct InvalidAddress;

impl WalletAddress {
    /// Build an address from its 20 raw bytes.
    pub(crate) fn from_bytes(bytes: &[u8; 20]) -> Self {
        Self(format!(
            "0x{}",
            data_encoding::HEXLOWER.encode(bytes.as_slice())
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for WalletAddress {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix("0x").ok_or(InvalidAddress)?;
        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidAddress);
        }
        Ok(Self(s.to_lowercase()))
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = InvalidAddress;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<WalletAddress> for String {
    fn from(address: WalletAddress) -> Self {
        address.0
    }
}

impl Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'a> FromParam<'a> for WalletAddress {
    type Error = InvalidAddress;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

impl UriDisplay<Path> for WalletAddress {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(&self.0)
    }
}

impl_from_uri_param_identity!([Path] WalletAddress);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_and_lowercases_valid_addresses() {
        let address: WalletAddress = "0xAbCdEf0123456789abcdef0123456789ABCDEF01"
            .parse()
            .unwrap();
        assert_eq!(
            address.as_str(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "",
            "0x",
            "abcdef0123456789abcdef0123456789abcdef01",   // missing prefix
            "0xabcdef0123456789abcdef0123456789abcdef0",  // too short
            "0xabcdef0123456789abcdef0123456789abcdef012", // too long
            "0xabcdef0123456789abcdef0123456789abcdefgh", // not hex
        ] {
            assert_eq!(bad.parse::<WalletAddress>(), Err(InvalidAddress), "{bad}");
        }
    }
}
