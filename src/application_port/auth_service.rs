use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user already exists")]
    UserExists,
    #[error("token invalid")]
    TokenInvalid,
    #[error("token malformed")]
    TokenMalformed,
    #[error("could not allocate a refresh token")]
    TokenAllocationExhausted,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user_id: UserId,
    pub tokens: AuthTokens,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken(pub String);

/// Plaintext refresh secret. Handed to the client once and never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken(pub String);

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshToken(..)")
    }
}

#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub user_id: UserId,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Signs and verifies short-lived access credentials. No I/O.
pub trait TokenCodec: Send + Sync {
    /// Returns the token and its expiry. Expiry has whole-second precision and
    /// may fall up to one second before `now + access_ttl`.
    fn issue_access_token(&self, user: UserId) -> Result<(AccessToken, DateTime<Utc>), AuthError>;

    /// Any failure (signature, algorithm, expiry, payload) is `AuthError::TokenInvalid`.
    fn verify_access_token(&self, token: &AccessToken) -> Result<UserId, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError>;
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError>;
}
