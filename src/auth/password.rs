//! Credential verifier.
//!
//! Hashes are argon2id PHC strings with a random salt per password. Logins
//! for unknown emails still run one verification against [`DUMMY_HASH`] so
//! both failure paths cost the same.

use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

/// Well-formed hash with the default argon2id parameters that no password matches.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$\
                          cmV0YWlsLW1lZGlhLXNhbHQ$\
                          AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("hash password: {}", e))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash cannot be parsed.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow!("parse password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Spends one verification on a login attempt for an email with no account.
pub fn verify_unknown_user(plain: &str) {
    if let Err(e) = verify_password(plain, DUMMY_HASH) {
        tracing::error!(error = %e, "dummy password hash is malformed");
    }
}
