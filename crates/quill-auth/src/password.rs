use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use anyhow::{Result, anyhow};

/// Hash a plaintext password with Argon2id and a fresh random salt.
/// Two identities with the same plaintext never share a hash.
pub fn hash_password(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// Check a plaintext password against a stored hash. Any parse or
/// verification failure reads as a wrong password.
pub fn verify_password(stored_hash: &str, plaintext: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let hash = hash_password("cat").unwrap();
        assert!(verify_password(&hash, "cat"));
        assert!(!verify_password(&hash, "dog"));
    }

    #[test]
    fn salts_are_random() {
        let a = hash_password("cat").unwrap();
        let b = hash_password("cat").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("not-a-phc-string", "cat"));
    }
}
