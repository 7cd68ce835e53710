//! The content digest: the sole cross-component identifier for an image.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A 256-bit content hash, encoded as 64 lowercase hex characters.
///
/// Deliberately not a bare `String` — giving it a real type catches mixing a
/// digest up with a path or another identifier at compile time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Build a `Digest` from a raw 32-byte hash.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let mut hex = String::with_capacity(64);
        for b in bytes {
            hex.push_str(&format!("{b:02x}"));
        }
        Self(hex)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Construct without validation. Only for tests and internal callers that
    /// already know the value is well-formed.
    #[cfg(test)]
    pub(crate) fn unchecked(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

/// Canonical order for an unordered digest pair, so the same two images
/// always hash and compare the same way regardless of which slot each was
/// drawn into.
#[must_use]
pub fn unordered_pair(a: &Digest, b: &Digest) -> (Digest, Digest) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            Ok(Self(s.to_string()))
        } else {
            Err(CoreError::InvalidDigest)
        }
    }
}
