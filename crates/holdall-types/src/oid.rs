use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identity of a persisted object, assigned by the object database.
///
/// An `Oid` is stable for the lifetime of the persisted record. Its external
/// form is `0x` followed by sixteen hex digits, which is what appears under
/// the `OID` field of externalized objects.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Oid(u64);

impl Oid {
    /// Create an `Oid` from its raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw 64-bit value.
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Big-endian bytes of the identity.
    pub fn to_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Hex-encoded external token, e.g. `0x000000000000002a`.
    pub fn to_external(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Parse an external token produced by [`Oid::to_external`].
    pub fn from_external(s: &str) -> Result<Self, TypeError> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| TypeError::MalformedOid(s.to_string()))?;
        let bytes = hex::decode(digits).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 8 {
            return Err(TypeError::InvalidLength {
                expected: 8,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&bytes);
        Ok(Self(u64::from_be_bytes(arr)))
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.0)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_external())
    }
}

impl From<u64> for Oid {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
