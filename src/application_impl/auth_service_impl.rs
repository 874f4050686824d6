use super::SessionRotation;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::ops::RangeInclusive;
use std::sync::Arc;

const MAX_EMAIL_LEN: usize = 100;
const PASSWORD_LEN: RangeInclusive<usize> = 6..=64;
const NAME_LEN: RangeInclusive<usize> = 3..=30;

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    session_rotation: Arc<SessionRotation>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        session_rotation: Arc<SessionRotation>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_codec,
            session_rotation,
        }
    }

    fn validate_register(email: &str, password: &str, name: &str) -> Result<(), AuthError> {
        if email.len() > MAX_EMAIL_LEN || !valid_email(email) {
            return Err(AuthError::Validation("email is not valid".to_string()));
        }
        if !PASSWORD_LEN.contains(&password.chars().count()) {
            return Err(AuthError::Validation(
                "password must be 6 to 64 characters".to_string(),
            ));
        }
        if !NAME_LEN.contains(&name.trim().chars().count()) {
            return Err(AuthError::Validation(
                "name must be 3 to 30 characters".to_string(),
            ));
        }
        Ok(())
    }

    fn store_err(e: StoreError) -> AuthError {
        AuthError::Store(e.to_string())
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError> {
        let RegisterInput {
            email,
            password,
            name,
        } = request;
        let email = normalize_email(&email);

        Self::validate_register(&email, &password, &name)?;

        if self
            .user_repo
            .find_by_email(&email)
            .await
            .map_err(Self::store_err)?
            .is_some()
        {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let new_user = NewUser {
            email,
            name: name.trim().to_string(),
            password_hash,
        };

        // The unique index still decides when two registrations race past the pre-check.
        let user_id = match self.user_repo.create(&new_user).await {
            Ok(id) => id,
            Err(e) if e.is_conflict() => return Err(AuthError::UserExists),
            Err(e) => return Err(Self::store_err(e)),
        };

        info!(%user_id, "user registered");
        Ok(user_id)
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput { email, password } = request;
        let email = normalize_email(&email);

        let Some(rec) = self
            .user_repo
            .find_by_email(&email)
            .await
            .map_err(Self::store_err)?
        else {
            debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let ok = self
            .credential_hasher
            .verify_password(&password, &rec.password_hash)
            .await?;
        if !ok {
            debug!(user_id = %rec.user_id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.session_rotation.create(rec.user_id).await?;
        Ok(LoginResult {
            user_id: rec.user_id,
            tokens,
        })
    }

    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        if token.is_empty() {
            return Err(AuthError::TokenMalformed);
        }
        self.token_codec
            .verify_access_token(&AccessToken(token.to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::TokenInvalid);
        }
        self.session_rotation
            .rotate(&RefreshToken(refresh_token.to_string()))
            .await
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::TokenInvalid);
        }
        self.session_rotation
            .revoke(&RefreshToken(refresh_token.to_string()))
            .await
    }
}
