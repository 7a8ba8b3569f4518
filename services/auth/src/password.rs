//! Password hashing with argon2
//!
//! Hashes are PHC strings carrying their own salt and parameters.
//! Verification goes through `PasswordVerifier`, which compares digests in
//! constant time.

use std::sync::OnceLock;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use tracing::warn;

static DUMMY_HASH: OnceLock<String> = OnceLock::new();

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check a candidate password against a stored hash
///
/// A stored value that is not a valid PHC string never matches.
pub fn verify_password(password_hash: &str, candidate: &str) -> bool {
    let parsed_hash = match PasswordHash::new(password_hash) {
        Ok(hash) => hash,
        Err(e) => {
            warn!("Stored password hash is malformed: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed_hash)
        .is_ok()
}

fn dummy_hash() -> &'static str {
    DUMMY_HASH.get_or_init(|| hash_password("unknown-user-placeholder").unwrap_or_default())
}

/// Spend one argon2 verification on a fixed hash and report no match
///
/// Lets a login for an unknown username cost the same as a wrong password.
pub fn verify_against_dummy(candidate: &str) -> bool {
    std::hint::black_box(verify_password(dummy_hash(), candidate));
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("admin123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert_ne!(hash, "admin123");
        assert!(verify_password(&hash, "admin123"));
        assert!(!verify_password(&hash, "admin124"));
    }

    #[test]
    fn test_salts_differ() {
        let first = hash_password("same-password").unwrap();
        let second = hash_password("same-password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_dummy_never_matches() {
        assert!(!verify_against_dummy("admin123"));
        assert!(!verify_against_dummy("unknown-user-placeholder"));
        assert!(!verify_against_dummy(""));
    }

    #[test]
    fn test_dummy_hash_costs_the_same_as_real_hashes() {
        let params = |hash: &str| hash.split('$').take(4).collect::<Vec<_>>().join("$");
        let real = hash_password("admin123").unwrap();

        assert!(PasswordHash::new(dummy_hash()).is_ok());
        assert_eq!(params(dummy_hash()), params(&real));
    }

    #[test]
    fn test_plaintext_is_never_a_valid_hash() {
        assert!(!verify_password("admin123", "admin123"));
    }
}
