use crate::application_port::{AuthError, CredentialHasher};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

pub struct Argon2PasswordHasher;

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(password_hash)
            .map_err(|e| AuthError::InternalError(format!("invalid PHC hash: {e}")))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::InternalError(format!("verify error: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_verifies_only_the_original_password() {
        let hasher = Argon2PasswordHasher;
        let hash = hasher.hash_password("correct horse").await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(hasher.verify_password("correct horse", &hash).await.unwrap());
        assert!(!hasher.verify_password("battery staple", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_hash_is_an_internal_error() {
        let result = Argon2PasswordHasher
            .verify_password("pw", "not-a-phc-string")
            .await;
        assert!(matches!(result, Err(AuthError::InternalError(_))));
    }
}
