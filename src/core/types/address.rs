//! Snapshot address wrapper type with hex parsing and serde support

use super::error::VadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 64-bit address taken from a memory snapshot.
///
/// Addresses are opaque values read out of the image. They are compared and
/// hashed but never dereferenced directly; all reads go through an
/// [`AddressSpace`](crate::snapshot::AddressSpace).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "AddressRepr", into = "String")]
pub struct Address(pub u64);

impl Address {
    /// Creates a new address from a raw value
    pub const fn new(value: u64) -> Self {
        Address(value)
    }

    /// Creates a null address (0x0)
    pub const fn null() -> Self {
        Address(0)
    }

    /// Checks if the address is null
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns `None` for a null address, which is how the snapshot encodes
    /// an absent link.
    pub const fn non_null(self) -> Option<Self> {
        if self.0 == 0 {
            None
        } else {
            Some(self)
        }
    }

    /// Returns the raw value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Textual addresses are always hex; the `0x` prefix is optional.
impl FromStr for Address {
    type Err = VadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        u64::from_str_radix(digits, 16)
            .map(Address::new)
            .map_err(|_| VadError::InvalidAddress(s.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address::new(value)
    }
}

impl From<Address> for u64 {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// Accepted serialized forms: a plain (decimal) integer or a hex string.
#[derive(Deserialize)]
#[serde(untagged)]
enum AddressRepr {
    Number(u64),
    Text(String),
}

impl TryFrom<AddressRepr> for Address {
    type Error = VadError;

    fn try_from(repr: AddressRepr) -> Result<Self, Self::Error> {
        match repr {
            AddressRepr::Number(value) => Ok(Address::new(value)),
            AddressRepr::Text(text) => text.parse(),
        }
    }
}
