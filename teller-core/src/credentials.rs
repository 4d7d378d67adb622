//! Password hashing and verification
//!
//! Passwords are stored as `"{salt}${digest}"` where both parts are
//! lowercase hex and the digest is SHA-256 over `salt || password`.
//! The original data format carried bare unsalted SHA-256 digests; those
//! still verify so existing data files keep working, but every newly
//! derived hash is salted.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// Stored password verifier
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Derive a salted hash from a plaintext password
    pub fn derive(password: &str) -> Self {
        let salt: [u8; SALT_LEN] = rand::random();
        let digest = salted_digest(&salt, password);
        Self(format!("{}${}", hex::encode(salt), hex::encode(digest)))
    }

    /// Wrap a hash string loaded from storage
    pub fn from_stored(stored: impl Into<String>) -> Self {
        Self(stored.into())
    }

    /// Recompute and compare; never panics on malformed stored values
    pub fn verify(&self, password: &str) -> bool {
        match self.0.split_once('$') {
            Some((salt_hex, digest_hex)) => {
                let Ok(salt) = hex::decode(salt_hex) else {
                    return false;
                };
                let Ok(expected) = hex::decode(digest_hex) else {
                    return false;
                };
                salted_digest(&salt, password)[..] == expected[..]
            }
            // Legacy unsalted digest: SHA-256(password) as bare hex
            None => hex::encode(Sha256::digest(password.as_bytes())) == self.0,
        }
    }

    /// Stored representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Never show hash material in logs
impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

fn salted_digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}
