// ABOUTME: Salted SHA-256 password hashing and constant-time verification for shares.
// ABOUTME: Stored form is "sha256$<salt-hex>$<digest-hex>".

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::ShareError;

const SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;

/// Hash a plaintext share password with a fresh random salt.
pub fn hash_password(plain: &str) -> Result<String, ShareError> {
    let mut salt = [0u8; SALT_LEN];
    getrandom::getrandom(&mut salt)
        .map_err(|e| ShareError::internal(format!("failed to generate salt: {}", e)))?;
    let digest = salted_digest(&salt, plain);
    Ok(format!("{}${}${}", SCHEME, hex::encode(salt), hex::encode(digest)))
}

/// Check a candidate against a stored hash.
///
/// The candidate is always hashed before comparing, and the fixed-length
/// digests are compared with `ct_eq`, so neither the candidate's length nor
/// a matching prefix changes how long this takes. Malformed stored hashes
/// never match.
pub fn verify_password(stored: &str, candidate: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(SCHEME), Some(salt_hex), Some(digest_hex), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::warn!("stored share password hash has an unknown format");
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
        tracing::warn!("stored share password hash is not valid hex");
        return false;
    };

    let actual = salted_digest(&salt, candidate);
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

fn salted_digest(salt: &[u8], plain: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(plain.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_accepts_exact_password() {
        let stored = hash_password("open sesame").unwrap();
        assert!(stored.starts_with("sha256$"));
        assert!(verify_password(&stored, "open sesame"));
    }

    #[test]
    fn verify_rejects_prefixes_and_near_misses() {
        let stored = hash_password("open sesame").unwrap();
        for candidate in ["", "open", "open sesam", "open sesame ", "Open sesame"] {
            assert!(!verify_password(&stored, candidate), "{candidate:?} matched");
        }
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("pw").unwrap();
        let b = hash_password("pw").unwrap();
        assert_ne!(a, b);
        assert!(verify_password(&a, "pw"));
        assert!(verify_password(&b, "pw"));
    }

    #[test]
    fn malformed_hashes_never_match() {
        for stored in ["", "pw", "md5$00$00", "sha256$zz$00", "sha256$00$11$22"] {
            assert!(!verify_password(stored, "pw"));
        }
    }
}
