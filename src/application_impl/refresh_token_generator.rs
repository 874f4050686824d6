use crate::application_port::{AuthError, RefreshToken};
use crate::domain_model::RefreshDigest;
use hmac::{Hmac, KeyInit, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

const SECRET_BYTES: usize = 32;

/// Produces opaque refresh secrets and their keyed digests.
///
/// The digest is HMAC-SHA256 under the service secret, so a copy of the session
/// table alone is not enough to forge a matching secret.
pub struct RefreshTokenGenerator {
    key: Vec<u8>,
}

impl RefreshTokenGenerator {
    pub fn new(key: Vec<u8>) -> Self {
        RefreshTokenGenerator { key }
    }

    pub fn generate(&self) -> Result<(RefreshToken, RefreshDigest), AuthError> {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| AuthError::InternalError(format!("entropy source: {e}")))?;
        let token = RefreshToken(hex::encode(bytes));
        let digest = self.digest_of(&token)?;
        Ok((token, digest))
    }

    pub fn digest_of(&self, token: &RefreshToken) -> Result<RefreshDigest, AuthError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        mac.update(token.0.as_bytes());
        Ok(RefreshDigest(mac.finalize().into_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_url_safe_and_carries_256_bits() {
        let generator = RefreshTokenGenerator::new(b"k".to_vec());
        let (token, digest) = generator.generate().unwrap();
        assert_eq!(token.0.len(), SECRET_BYTES * 2);
        assert!(token.0.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest.as_bytes().len(), 32);
    }

    #[test]
    fn digest_is_deterministic_and_not_the_plaintext() {
        let generator = RefreshTokenGenerator::new(b"k".to_vec());
        let (token, digest) = generator.generate().unwrap();
        assert_eq!(generator.digest_of(&token).unwrap(), digest);
        assert_ne!(digest.as_bytes(), token.0.as_bytes());
    }

    #[test]
    fn digest_depends_on_key() {
        let token = RefreshToken("same-secret".to_string());
        let a = RefreshTokenGenerator::new(b"key-a".to_vec());
        let b = RefreshTokenGenerator::new(b"key-b".to_vec());
        assert_ne!(a.digest_of(&token).unwrap(), b.digest_of(&token).unwrap());
    }

    #[test]
    fn successive_secrets_differ() {
        let generator = RefreshTokenGenerator::new(b"k".to_vec());
        let (first, _) = generator.generate().unwrap();
        let (second, _) = generator.generate().unwrap();
        assert_ne!(first, second);
    }
}
