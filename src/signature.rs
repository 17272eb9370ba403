//! Platform handshake verification.
//!
//! The platform proves it holds the shared token by sending
//! `sha1(sort([token, timestamp, nonce]).concat())` as `signature`.

use serde::Deserialize;
use sha1::{Digest, Sha1};

/// Query parameters of a verification request. All fields are optional at the
/// wire level; [`HandshakeQuery::require`] enforces presence.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct HandshakeQuery {
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    pub echostr: Option<String>,
}

/// A handshake request with every parameter present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub signature: String,
    pub timestamp: String,
    pub nonce: String,
    pub echostr: String,
}

impl HandshakeQuery {
    /// Returns the complete handshake, or the name of the first missing key.
    pub fn require(self) -> Result<Handshake, &'static str> {
        Ok(Handshake {
            signature: self.signature.ok_or("signature")?,
            timestamp: self.timestamp.ok_or("timestamp")?,
            nonce: self.nonce.ok_or("nonce")?,
            echostr: self.echostr.ok_or("echostr")?,
        })
    }
}

/// Lowercase hex SHA-1 over the sorted concatenation of the three inputs.
pub fn compute_signature(token: &str, timestamp: &str, nonce: &str) -> String {
    let mut parts = [token, timestamp, nonce];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

impl Handshake {
    pub fn verify(&self, token: &str) -> bool {
        compute_signature(token, &self.timestamp, &self.nonce) == self.signature
    }
}
