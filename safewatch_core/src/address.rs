use std::str::FromStr;

use derive_more::{AsRef, Display};
use regex::Regex;
use serde_with::{DeserializeFromStr, SerializeDisplay};

/// Token address used for balances held in the chain's native currency.
pub const NATIVE_TOKEN_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Safe proxy factory, deployed at the same address on every supported chain.
pub const PROXY_FACTORY_ADDRESS: &str = "0x4e1dcf7ad4e460cfd30791ccc4f9c8a4f820ec67";

#[derive(thiserror::Error, Debug)]
pub enum AddressError {
    #[error("invalid address {0:?}")]
    Address(String),
    #[error("invalid transaction hash {0:?}")]
    TxHash(String),
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

/// A 20-byte EVM address, normalized to lower case with its `0x` prefix.
#[derive(
    Display,
    AsRef,
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    SerializeDisplay,
    DeserializeFromStr,
)]
pub struct Address(String);

impl Address {
    pub fn native() -> Address {
        Address(NATIVE_TOKEN_ADDRESS.into())
    }

    pub fn proxy_factory() -> Address {
        Address(PROXY_FACTORY_ADDRESS.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let r = Regex::new(r"\A0x[0-9a-fA-F]{40}\z")?;
        if r.is_match(s) {
            return Ok(Address(s.to_lowercase()));
        }

        Err(AddressError::Address(s.into()))
    }
}

#[derive(
    Display,
    AsRef,
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    SerializeDisplay,
    DeserializeFromStr,
)]
pub struct TxHash(String);

impl TxHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TxHash {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let r = Regex::new(r"\A0x[0-9a-fA-F]{64}\z")?;
        if r.is_match(s) {
            return Ok(TxHash(s.to_lowercase()));
        }

        Err(AddressError::TxHash(s.into()))
    }
}
