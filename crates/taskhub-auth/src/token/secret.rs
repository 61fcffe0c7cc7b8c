//! Refresh-secret generation and digesting.
//!
//! A secret is 32 bytes of CSPRNG entropy, URL-safe base64 encoded for
//! transport. Only its SHA-256 digest (standard base64) is persisted;
//! the plaintext exists in memory exactly long enough to hand to the
//! client.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// Number of random bytes behind each refresh secret.
const SECRET_BYTES: usize = 32;

/// Generate a fresh high-entropy refresh secret.
pub fn generate_secret() -> String {
    let bytes: [u8; SECRET_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the stored digest of a presented secret.
pub fn hash_secret(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    STANDARD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_unique_and_urlsafe() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b);
        assert!(a.len() >= 40);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }

    #[test]
    fn digest_is_stable_and_distinct_from_secret() {
        let secret = generate_secret();
        let h1 = hash_secret(&secret);
        let h2 = hash_secret(&secret);
        assert_eq!(h1, h2);
        assert_ne!(h1, secret);
        // 32-byte digest → 44 chars of standard base64.
        assert_eq!(h1.len(), 44);
    }
}
