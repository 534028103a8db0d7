//! Password hashing with bcrypt.

/// Work factor for stored password hashes.
pub const BCRYPT_COST: u32 = 12;

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for password hash
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash a password with bcrypt at the fixed work factor.
///
/// Runs on the blocking thread pool; bcrypt at cost 12 takes long enough to
/// stall an async worker otherwise. Salt generation is handled by bcrypt.
pub async fn hash_password(password: Password) -> Result<PasswordHashString, anyhow::Error> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password.as_str(), BCRYPT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))?
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    Ok(PasswordHashString::new(hash))
}

/// Verify a password against a stored bcrypt hash.
///
/// Returns `Ok(false)` on mismatch; `Err` only when the stored hash is
/// malformed or the blocking task fails.
pub async fn verify_password(
    password: Password,
    password_hash: PasswordHashString,
) -> Result<bool, anyhow::Error> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password.as_str(), password_hash.as_str()))
        .await
        .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))?
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_password_produces_bcrypt_hash() {
        let password = Password::new("Str0ng!Passw0rd".to_string());
        let hash = hash_password(password).await.expect("Failed to hash password");

        assert!(!hash.as_str().is_empty());
        assert!(hash.as_str().starts_with("$2"));
    }

    #[tokio::test]
    async fn test_verify_password_correct() {
        let hash = hash_password(Password::new("Str0ng!Passw0rd".to_string()))
            .await
            .expect("Failed to hash password");

        let ok = verify_password(Password::new("Str0ng!Passw0rd".to_string()), hash)
            .await
            .expect("Verification failed");
        assert!(ok);
    }

    #[tokio::test]
    async fn test_verify_password_incorrect() {
        let hash = hash_password(Password::new("Str0ng!Passw0rd".to_string()))
            .await
            .expect("Failed to hash password");

        let ok = verify_password(Password::new("WrongPassword1!".to_string()), hash)
            .await
            .expect("Verification failed");
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_different_hashes_for_same_password() {
        let hash1 = hash_password(Password::new("Str0ng!Passw0rd".to_string()))
            .await
            .expect("Failed to hash password");
        let hash2 = hash_password(Password::new("Str0ng!Passw0rd".to_string()))
            .await
            .expect("Failed to hash password");

        // Random salts make the hashes differ.
        assert_ne!(hash1.as_str(), hash2.as_str());
    }

    #[test]
    fn test_password_debug_does_not_leak() {
        let password = Password::new("Str0ng!Passw0rd".to_string());
        assert_eq!(format!("{:?}", password), "Password(***)");
    }
}
