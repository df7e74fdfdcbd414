use ring::rand::{SecureRandom, SystemRandom};
use ring::{digest, pbkdf2};
use std::num::NonZeroU32;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const CREDENTIAL_LEN: usize = digest::SHA256_OUTPUT_LEN;

/// Iteration count for newly hashed passwords. Stored hashes carry their own count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

#[derive(thiserror::Error, Debug)]
pub enum PasswordError {
    #[error("Failed to generate salt")]
    SaltGeneration,

    #[error("Iteration count must be non-zero")]
    ZeroIterations,

    #[error("Malformed password hash")]
    MalformedHash,
}

/// Hashes a password with PBKDF2-HMAC-SHA256 and a random salt.
///
/// Format: `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_iterations(password, DEFAULT_ITERATIONS)
}

pub fn hash_password_with_iterations(password: &str, iterations: u32) -> Result<String, PasswordError> {
    let iterations = NonZeroU32::new(iterations).ok_or(PasswordError::ZeroIterations)?;

    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| PasswordError::SaltGeneration)?;

    let mut credential = [0u8; CREDENTIAL_LEN];
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, iterations, &salt, password.as_bytes(), &mut credential);

    Ok(format!(
        "{}${}${}${}",
        SCHEME,
        iterations,
        hex::encode(salt),
        hex::encode(credential)
    ))
}

/// Checks a password against a stored hash in constant time.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(credential), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(PasswordError::MalformedHash);
    };

    if scheme != SCHEME {
        return Err(PasswordError::MalformedHash);
    }

    let iterations = iterations
        .parse::<u32>()
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or(PasswordError::MalformedHash)?;
    let salt = hex::decode(salt).map_err(|_| PasswordError::MalformedHash)?;
    let credential = hex::decode(credential).map_err(|_| PasswordError::MalformedHash)?;

    Ok(pbkdf2::verify(pbkdf2::PBKDF2_HMAC_SHA256, iterations, &salt, password.as_bytes(), &credential).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password_with_iterations("correct horse", 1_000).unwrap();

        assert!(hash.starts_with("pbkdf2-sha256$1000$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let first = hash_password_with_iterations("same", 1_000).unwrap();
        let second = hash_password_with_iterations("same", 1_000).unwrap();

        assert_ne!(first, second);
        assert!(verify_password("same", &first).unwrap());
        assert!(verify_password("same", &second).unwrap());
    }

    #[test]
    fn test_default_iterations() {
        let hash = hash_password("admin").unwrap();
        assert!(hash.starts_with(&format!("pbkdf2-sha256${}$", DEFAULT_ITERATIONS)));
        assert!(verify_password("admin", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash() {
        assert!(matches!(
            verify_password("x", "not-a-hash"),
            Err(PasswordError::MalformedHash)
        ));
        assert!(matches!(
            verify_password("x", "bcrypt$10$00$00"),
            Err(PasswordError::MalformedHash)
        ));
        assert!(matches!(
            verify_password("x", "pbkdf2-sha256$0$00$00"),
            Err(PasswordError::MalformedHash)
        ));
        assert!(matches!(
            hash_password_with_iterations("x", 0),
            Err(PasswordError::ZeroIterations)
        ));
    }
}
