//! Credential hashing for the `Password` record field
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::errors::LedgerErr;

const PHC_PREFIX: &str = "$argon2";

/// Hash `password` into argon2 PHC string with random salt
pub fn hash(password: &str) -> Result<String, LedgerErr> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|e| LedgerErr::PasswordHash(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| LedgerErr::PasswordHash(e.to_string()))
}

/// Check `candidate` against stored field. Records written before hashing keep plaintext
/// passwords, those are compared verbatim.
pub fn verify(stored: &str, candidate: &str) -> bool {
    if !stored.starts_with(PHC_PREFIX) {
        return stored == candidate;
    }

    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod test {
    use super::{hash, verify};

    #[test]
    fn hashed_password_verifies() {
        let stored = hash("pw1").unwrap();

        assert!(stored.starts_with("$argon2"));
        assert!(!stored.contains("pw1"));
        assert!(verify(&stored, "pw1"));
        assert!(!verify(&stored, "pw2"));
    }

    #[test]
    fn same_password_gets_different_salt() {
        assert_ne!(hash("pw1").unwrap(), hash("pw1").unwrap());
    }

    #[test]
    fn legacy_plaintext_is_compared_verbatim() {
        assert!(verify("pw1", "pw1"));
        assert!(!verify("pw1", "PW1"));
    }
}
