//! Secret values shared between native code and injected scripts.
//!
//! Everything here draws from the operating system CSPRNG through `getrandom`.
//! Tokens and nonces are hex encoded so they can be placed in script string
//! literals and header values without further escaping.

use crate::{Error, Result};
use std::fmt;
use subtle::ConstantTimeEq;

/// Number of random bytes behind every token and nonce (128 bits)
const SECRET_BYTES: usize = 16;

/// Produce `len` bytes from the OS random source, hex encoded.
pub fn random_hex(len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    getrandom::getrandom(&mut buf)
        .map_err(|e| Error::Other(format!("OS random source failed: {}", e)))?;
    Ok(hex::encode(buf))
}

/// Per-registration secret proving a message came from a script we installed.
///
/// `Debug` never prints the value; use [`SecurityToken::as_str`] only when
/// embedding the token into the wrapped script source.
#[derive(Clone)]
pub struct SecurityToken(String);

impl SecurityToken {
    pub fn generate() -> Result<Self> {
        Ok(Self(random_hex(SECRET_BYTES)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check a token presented by an inbound message. Timing does not depend
    /// on where the first differing byte is.
    pub fn verify(&self, presented: &str) -> bool {
        bool::from(self.0.as_bytes().ct_eq(presented.as_bytes()))
    }
}

impl PartialEq for SecurityToken {
    fn eq(&self, other: &Self) -> bool {
        self.verify(other.as_str())
    }
}

impl Eq for SecurityToken {}

impl fmt::Debug for SecurityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecurityToken(..)")
    }
}

/// Single-use Content-Security-Policy nonce. Never reused across responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspNonce(String);

impl CspNonce {
    pub fn generate() -> Result<Self> {
        Ok(Self(random_hex(SECRET_BYTES)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CspNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
