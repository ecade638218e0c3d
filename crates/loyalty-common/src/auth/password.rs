//! Password hashing and strength rules
//!
//! Hashes are Argon2id PHC strings; the salt travels inside the hash.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 20;

/// Hash a password using Argon2id
///
/// # Errors
/// Returns an error if hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {e}")))
}

/// Verify a password against a stored hash
///
/// # Errors
/// Returns an error if the stored hash is malformed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Check a new password: 8-20 characters with at least one uppercase letter,
/// one lowercase letter, one digit and one special character.
///
/// # Errors
/// Returns `AppError::Validation` naming the first rule that fails
pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(AppError::Validation(format!(
            "Password must be {MIN_PASSWORD_LEN}-{MAX_PASSWORD_LEN} characters long"
        )));
    }

    if !password.chars().any(char::is_uppercase) {
        return Err(AppError::Validation(
            "Password must contain at least one uppercase letter".to_string(),
        ));
    }

    if !password.chars().any(char::is_lowercase) {
        return Err(AppError::Validation(
            "Password must contain at least one lowercase letter".to_string(),
        ));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "Password must contain at least one digit".to_string(),
        ));
    }

    if password.chars().all(char::is_alphanumeric) {
        return Err(AppError::Validation(
            "Password must contain at least one special character".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Ledger#2024").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert_ne!(hash, hash_password("Ledger#2024").unwrap());
        assert!(verify_password("Ledger#2024", &hash).unwrap());
        assert!(!verify_password("Ledger#2025", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash() {
        let result = verify_password("Ledger#2024", "not-a-hash");
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[test]
    fn test_strength_accepts_valid() {
        assert!(validate_password_strength("Abcdef1!").is_ok());
        assert!(validate_password_strength("Points&Perks2024").is_ok());
    }

    #[test]
    fn test_strength_rules() {
        let cases = [
            ("Ab1!", "8-20"),
            ("Abcdefghij1!klmnopqrs", "8-20"),
            ("abcdefg1!", "uppercase"),
            ("ABCDEFG1!", "lowercase"),
            ("Abcdefgh!", "digit"),
            ("Abcdefg12", "special"),
        ];
        for (password, rule) in cases {
            match validate_password_strength(password) {
                Err(AppError::Validation(msg)) => assert!(msg.contains(rule), "{password}: {msg}"),
                other => panic!("{password}: expected validation error, got {other:?}"),
            }
        }
    }
}
