use super::RefreshTokenGenerator;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SessionRotationConfig {
    pub refresh_ttl: Duration,
    /// Attempts per create/rotate call before giving up on digest collisions.
    pub max_attempts: u32,
}

/// Refresh session lifecycle: create on login, rotate on refresh, revoke on logout.
///
/// Rotation is lock-then-compare-then-swap inside one store transaction. The
/// session row is the lock and the active predicate is the guard, so of any
/// number of callers presenting the same secret only the first to take the
/// row lock rotates; everyone after it finds no active row.
pub struct SessionRotation {
    session_repo: Arc<dyn SessionRepo>,
    generator: Arc<RefreshTokenGenerator>,
    token_codec: Arc<dyn TokenCodec>,
    cfg: SessionRotationConfig,
}

impl SessionRotation {
    pub fn new(
        session_repo: Arc<dyn SessionRepo>,
        generator: Arc<RefreshTokenGenerator>,
        token_codec: Arc<dyn TokenCodec>,
        cfg: SessionRotationConfig,
    ) -> Self {
        Self {
            session_repo,
            generator,
            token_codec,
            cfg,
        }
    }

    pub async fn create(&self, user_id: UserId) -> Result<AuthTokens, AuthError> {
        let now = Utc::now();
        let expires_at = now + self.cfg.refresh_ttl;

        let (session_id, refresh_token) =
            retry_on_conflict(self.cfg.max_attempts, &self.generator, |digest| {
                let session = SessionRecord {
                    session_id: SessionId::new(),
                    user_id,
                    refresh_digest: digest,
                    expires_at,
                    revoked_at: None,
                    created_at: now,
                };
                async move {
                    self.session_repo.insert(&session).await?;
                    Ok(session.session_id)
                }
            })
            .await?;

        info!(%user_id, %session_id, "session created");
        self.issue(user_id, refresh_token, expires_at)
    }

    pub async fn rotate(&self, token: &RefreshToken) -> Result<AuthTokens, AuthError> {
        let old_digest = self.generator.digest_of(token)?;
        let old_digest = &old_digest;

        let (rotated, refresh_token) =
            retry_on_conflict(self.cfg.max_attempts, &self.generator, |new_digest| async move {
                self.try_rotate(old_digest, new_digest).await
            })
            .await?;

        let Some((user_id, session_id, expires_at)) = rotated else {
            debug!("refresh token rejected");
            return Err(AuthError::TokenInvalid);
        };

        debug!(%user_id, %session_id, "session rotated");
        self.issue(user_id, refresh_token, expires_at)
    }

    pub async fn revoke(&self, token: &RefreshToken) -> Result<(), AuthError> {
        let digest = self.generator.digest_of(token)?;
        let revoked = self
            .session_repo
            .mark_revoked(&digest, Utc::now())
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        if !revoked {
            debug!("logout with inactive refresh token");
            return Err(AuthError::TokenInvalid);
        }
        Ok(())
    }

    /// One rotation attempt in its own transaction. `Ok(None)` when no active
    /// session holds `old_digest`.
    async fn try_rotate(
        &self,
        old_digest: &RefreshDigest,
        new_digest: RefreshDigest,
    ) -> Result<Option<(UserId, SessionId, DateTime<Utc>)>, StoreError> {
        let now = Utc::now();
        let mut tx = self.session_repo.begin().await?;

        let Some(session) = tx.find_and_lock_active_by_digest(old_digest, now).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        let new_expires_at = now + self.cfg.refresh_ttl;
        if let Err(e) = tx
            .update_digest_and_expiry(session.session_id, &new_digest, new_expires_at)
            .await
        {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("rollback after failed rotation: {}", rollback_err);
            }
            return Err(e);
        }

        tx.commit().await?;
        Ok(Some((session.user_id, session.session_id, new_expires_at)))
    }

    fn issue(
        &self,
        user_id: UserId,
        refresh_token: RefreshToken,
        refresh_expires_at: DateTime<Utc>,
    ) -> Result<AuthTokens, AuthError> {
        let (access_token, access_exp) = self.token_codec.issue_access_token(user_id)?;
        Ok(AuthTokens {
            user_id,
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_expires_at,
        })
    }
}

/// Run `attempt` with a freshly generated digest until it succeeds, fails with
/// anything other than a uniqueness conflict, or `max_attempts` is used up.
/// On success the plaintext belonging to the accepted digest is returned.
pub(crate) async fn retry_on_conflict<T, F, Fut>(
    max_attempts: u32,
    generator: &RefreshTokenGenerator,
    mut attempt: F,
) -> Result<(T, RefreshToken), AuthError>
where
    F: FnMut(RefreshDigest) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    for n in 1..=max_attempts {
        let (token, digest) = generator.generate()?;
        match attempt(digest).await {
            Ok(value) => return Ok((value, token)),
            Err(e) if e.is_conflict() => {
                warn!(attempt = n, "refresh digest collision, retrying with a fresh secret");
            }
            Err(e) => return Err(AuthError::Store(e.to_string())),
        }
    }

    error!(max_attempts, "refresh token allocation exhausted");
    Err(AuthError::TokenAllocationExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn generator() -> RefreshTokenGenerator {
        RefreshTokenGenerator::new(b"retry-test".to_vec())
    }

    #[tokio::test]
    async fn retries_conflicts_with_fresh_digests() {
        let generator = generator();
        let calls = AtomicU32::new(0);
        let seen = std::sync::Mutex::new(Vec::new());

        let (value, token) = retry_on_conflict(3, &generator, |digest| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push(digest.clone());
            async move {
                if n < 2 {
                    Err(StoreError::Conflict)
                } else {
                    Ok(digest)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let seen = seen.into_inner().unwrap();
        assert_ne!(seen[0], seen[1]);
        assert_ne!(seen[1], seen[2]);
        // The returned plaintext belongs to the digest that was accepted.
        assert_eq!(generator.digest_of(&token).unwrap(), value);
    }

    #[tokio::test]
    async fn exhausting_attempts_is_fatal() {
        let calls = AtomicU32::new(0);
        let result = retry_on_conflict(3, &generator(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(StoreError::Conflict) }
        })
        .await;

        assert!(matches!(result, Err(AuthError::TokenAllocationExhausted)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn backend_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result = retry_on_conflict(3, &generator(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(StoreError::Backend("connection reset".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(AuthError::Store(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
