use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;

type RowLock = Arc<tokio::sync::Mutex<()>>;

#[derive(Default)]
struct Tables {
    rows: HashMap<SessionId, SessionRecord>,
    // Unique index on refresh_digest, kept in step with `rows`.
    by_digest: HashMap<RefreshDigest, SessionId>,
    locks: HashMap<SessionId, RowLock>,
}

impl Tables {
    fn digest_taken(&self, digest: &RefreshDigest, except: Option<SessionId>) -> bool {
        self.by_digest
            .get(digest)
            .is_some_and(|id| Some(*id) != except)
    }

    fn insert_row(&mut self, session: &SessionRecord) {
        self.by_digest
            .insert(session.refresh_digest.clone(), session.session_id);
        self.rows.insert(session.session_id, session.clone());
        self.locks.insert(session.session_id, RowLock::default());
    }

    fn swap_digest(
        &mut self,
        session_id: SessionId,
        digest: &RefreshDigest,
        expires_at: DateTime<Utc>,
    ) {
        let Some(row) = self.rows.get_mut(&session_id) else {
            return;
        };
        self.by_digest.remove(&row.refresh_digest);
        self.by_digest.insert(digest.clone(), session_id);
        row.refresh_digest = digest.clone();
        row.expires_at = expires_at;
    }
}

/// Session table held in process memory.
///
/// Behaves like a row-locking relational store: `find_and_lock_active_by_digest`
/// blocks while another transaction holds the row, writes stay invisible until
/// commit, and dropping a transaction rolls it back.
#[derive(Default)]
pub struct MemorySessionRepo {
    tables: Mutex<Tables>,
    forced_conflicts: AtomicU32,
}

impl MemorySessionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every committed row, as the store sees it.
    pub fn snapshot(&self) -> Vec<SessionRecord> {
        match self.tables.lock() {
            Ok(tables) => tables.rows.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Make the next `n` digest writes fail with a uniqueness conflict.
    pub fn force_conflicts(&self, n: u32) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    fn take_forced_conflict(&self) -> bool {
        self.forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("session table poisoned".to_string()))
    }

    /// Wait for the lock of the row currently holding `digest`.
    async fn lock_row_by_digest(
        &self,
        digest: &RefreshDigest,
    ) -> Result<Option<(SessionId, OwnedMutexGuard<()>)>, StoreError> {
        let (session_id, lock) = {
            let tables = self.tables()?;
            let Some(session_id) = tables.by_digest.get(digest).copied() else {
                return Ok(None);
            };
            let Some(lock) = tables.locks.get(&session_id) else {
                return Err(StoreError::Backend("row lock missing".to_string()));
            };
            (session_id, lock.clone())
        };
        let guard = lock.lock_owned().await;
        Ok(Some((session_id, guard)))
    }
}

#[async_trait::async_trait]
impl SessionRepo for MemorySessionRepo {
    async fn insert(&self, session: &SessionRecord) -> Result<(), StoreError> {
        if self.take_forced_conflict() {
            return Err(StoreError::Conflict);
        }
        let mut tables = self.tables()?;
        if tables.digest_taken(&session.refresh_digest, None)
            || tables.rows.contains_key(&session.session_id)
        {
            return Err(StoreError::Conflict);
        }
        tables.insert_row(session);
        Ok(())
    }

    async fn begin<'t>(&'t self) -> Result<Box<dyn SessionTx<'t> + 't>, StoreError> {
        Ok(Box::new(MemoryTx {
            repo: self,
            guards: Vec::new(),
            pending: Vec::new(),
        }))
    }

    async fn mark_revoked(
        &self,
        digest: &RefreshDigest,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let Some((session_id, _guard)) = self.lock_row_by_digest(digest).await? else {
            return Ok(false);
        };
        let mut tables = self.tables()?;
        match tables.rows.get_mut(&session_id) {
            Some(row) if row.refresh_digest == *digest && row.is_active_at(now) => {
                row.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

struct PendingUpdate {
    session_id: SessionId,
    digest: RefreshDigest,
    expires_at: DateTime<Utc>,
}

pub struct MemoryTx<'t> {
    repo: &'t MemorySessionRepo,
    guards: Vec<(SessionId, OwnedMutexGuard<()>)>,
    pending: Vec<PendingUpdate>,
}

impl MemoryTx<'_> {
    fn holds(&self, session_id: SessionId) -> bool {
        self.guards.iter().any(|(id, _)| *id == session_id)
    }
}

#[async_trait::async_trait]
impl<'t> StorageTx<'t> for MemoryTx<'t> {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tables = self.repo.tables()?;
        for update in &self.pending {
            if tables.digest_taken(&update.digest, Some(update.session_id)) {
                return Err(StoreError::Conflict);
            }
        }
        for update in &self.pending {
            tables.swap_digest(update.session_id, &update.digest, update.expires_at);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'t> SessionTx<'t> for MemoryTx<'t> {
    async fn find_and_lock_active_by_digest(
        &mut self,
        digest: &RefreshDigest,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let Some((session_id, guard)) = self.repo.lock_row_by_digest(digest).await? else {
            return Ok(None);
        };

        // Re-read under the lock: the previous holder may have rotated or revoked it.
        let row = {
            let tables = self.repo.tables()?;
            tables
                .rows
                .get(&session_id)
                .filter(|r| r.refresh_digest == *digest && r.is_active_at(now))
                .cloned()
        };
        if row.is_some() {
            self.guards.push((session_id, guard));
        }
        Ok(row)
    }

    async fn update_digest_and_expiry(
        &mut self,
        session_id: SessionId,
        new_digest: &RefreshDigest,
        new_expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if !self.holds(session_id) {
            return Err(StoreError::Backend(format!(
                "session {session_id} updated without holding its lock"
            )));
        }
        if self.repo.take_forced_conflict() {
            return Err(StoreError::Conflict);
        }
        if self.repo.tables()?.digest_taken(new_digest, Some(session_id)) {
            return Err(StoreError::Conflict);
        }
        self.pending.push(PendingUpdate {
            session_id,
            digest: new_digest.clone(),
            expires_at: new_expires_at,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(digest: u8, expires_in: Duration) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            session_id: SessionId::new(),
            user_id: UserId(1),
            refresh_digest: RefreshDigest(vec![digest; 32]),
            expires_at: now + expires_in,
            revoked_at: None,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_digest_is_a_conflict() {
        let repo = MemorySessionRepo::new();
        repo.insert(&session(1, Duration::hours(1))).await.unwrap();
        let err = repo.insert(&session(1, Duration::hours(1))).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn uncommitted_update_is_invisible_and_dropped_on_rollback() {
        let repo = MemorySessionRepo::new();
        let row = session(1, Duration::hours(1));
        repo.insert(&row).await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        let found = tx
            .find_and_lock_active_by_digest(&row.refresh_digest, Utc::now())
            .await
            .unwrap()
            .unwrap();
        tx.update_digest_and_expiry(found.session_id, &RefreshDigest(vec![2; 32]), row.expires_at)
            .await
            .unwrap();
        assert_eq!(repo.snapshot()[0].refresh_digest, row.refresh_digest);

        tx.rollback().await.unwrap();
        assert_eq!(repo.snapshot()[0].refresh_digest, row.refresh_digest);
    }

    #[tokio::test]
    async fn locked_row_blocks_a_second_reader_until_commit() {
        let repo = Arc::new(MemorySessionRepo::new());
        let row = session(1, Duration::hours(1));
        repo.insert(&row).await.unwrap();

        let mut first = repo.begin().await.unwrap();
        first
            .find_and_lock_active_by_digest(&row.refresh_digest, Utc::now())
            .await
            .unwrap()
            .unwrap();

        let contender = {
            let repo = repo.clone();
            let digest = row.refresh_digest.clone();
            tokio::spawn(async move {
                let mut tx = repo.begin().await.unwrap();
                tx.find_and_lock_active_by_digest(&digest, Utc::now())
                    .await
                    .unwrap()
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        first
            .update_digest_and_expiry(row.session_id, &RefreshDigest(vec![3; 32]), row.expires_at)
            .await
            .unwrap();
        first.commit().await.unwrap();

        assert!(contender.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_rotation_moves_the_digest_index() {
        let repo = MemorySessionRepo::new();
        let row = session(1, Duration::hours(1));
        repo.insert(&row).await.unwrap();

        let new_digest = RefreshDigest(vec![2; 32]);
        let mut tx = repo.begin().await.unwrap();
        tx.find_and_lock_active_by_digest(&row.refresh_digest, Utc::now())
            .await
            .unwrap()
            .unwrap();
        tx.update_digest_and_expiry(row.session_id, &new_digest, row.expires_at)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        assert!(
            tx.find_and_lock_active_by_digest(&row.refresh_digest, Utc::now())
                .await
                .unwrap()
                .is_none()
        );
        let found = tx
            .find_and_lock_active_by_digest(&new_digest, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.session_id, row.session_id);
        tx.rollback().await.unwrap();

        // The old digest is free again; the new one is taken.
        repo.insert(&session(1, Duration::hours(1))).await.unwrap();
        let err = repo.insert(&session(2, Duration::hours(1))).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn revoke_only_hits_active_rows() {
        let repo = MemorySessionRepo::new();
        let live = session(1, Duration::hours(1));
        let expired = session(2, Duration::seconds(-1));
        repo.insert(&live).await.unwrap();
        repo.insert(&expired).await.unwrap();

        let now = Utc::now();
        assert!(repo.mark_revoked(&live.refresh_digest, now).await.unwrap());
        assert!(!repo.mark_revoked(&live.refresh_digest, now).await.unwrap());
        assert!(!repo.mark_revoked(&expired.refresh_digest, now).await.unwrap());
        assert!(!repo.mark_revoked(&RefreshDigest(vec![9; 32]), now).await.unwrap());
    }
}
