use super::{StorageTx, StoreError};
use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait SessionRepo: Send + Sync {
    /// Insert a new session row. A digest already present yields `StoreError::Conflict`.
    async fn insert(&self, session: &SessionRecord) -> Result<(), StoreError>;

    async fn begin<'t>(&'t self) -> Result<Box<dyn SessionTx<'t> + 't>, StoreError>;

    /// Set `revoked_at = now` on the row matching `digest` if it is still active.
    /// Returns whether a row was revoked.
    async fn mark_revoked(
        &self,
        digest: &RefreshDigest,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

#[async_trait::async_trait]
pub trait SessionTx<'t>: StorageTx<'t> {
    /// Find the active row for `digest` and hold an exclusive lock on it until
    /// this transaction ends. A concurrent caller on the same row waits here.
    async fn find_and_lock_active_by_digest(
        &mut self,
        digest: &RefreshDigest,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError>;

    async fn update_digest_and_expiry(
        &mut self,
        session_id: SessionId,
        new_digest: &RefreshDigest,
        new_expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
