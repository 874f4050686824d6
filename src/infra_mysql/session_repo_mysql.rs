use super::repo_tx_mysql::MySqlTx;
use super::util::store_error;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

const SESSION_COLUMNS: &str =
    "session_id, user_id, refresh_digest, expires_at, revoked_at, created_at";

pub struct MySqlSessionRepo {
    pool: MySqlPool,
}

impl MySqlSessionRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlSessionRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<SessionRecord, StoreError> {
        let get_err = |e: sqlx::Error| StoreError::Backend(e.to_string());

        let session_id: Vec<u8> = row.try_get("session_id").map_err(get_err)?;
        let session_id = SessionId(
            Uuid::from_slice(&session_id).map_err(|e| StoreError::Backend(e.to_string()))?,
        );

        Ok(SessionRecord {
            session_id,
            user_id: row.try_get("user_id").map_err(get_err)?,
            refresh_digest: RefreshDigest(row.try_get("refresh_digest").map_err(get_err)?),
            expires_at: row.try_get("expires_at").map_err(get_err)?,
            revoked_at: row.try_get("revoked_at").map_err(get_err)?,
            created_at: row.try_get("created_at").map_err(get_err)?,
        })
    }
}

#[async_trait::async_trait]
impl SessionRepo for MySqlSessionRepo {
    async fn insert(&self, session: &SessionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
INSERT INTO session (session_id, user_id, refresh_digest, expires_at, revoked_at, created_at)
VALUES (?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(session.session_id.0.as_bytes().as_slice())
        .bind(session.user_id)
        .bind(session.refresh_digest.as_bytes())
        .bind(session.expires_at)
        .bind(session.revoked_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn begin<'t>(&'t self) -> Result<Box<dyn SessionTx<'t> + 't>, StoreError> {
        let tx = self.pool.begin().await.map_err(store_error)?;
        Ok(Box::new(MySqlTx::new(tx)))
    }

    async fn mark_revoked(
        &self,
        digest: &RefreshDigest,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
UPDATE session
SET revoked_at = ?
WHERE refresh_digest = ?
  AND revoked_at IS NULL
  AND expires_at > ?
"#,
        )
        .bind(now)
        .bind(digest.as_bytes())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait::async_trait]
impl<'t> SessionTx<'t> for MySqlTx<'t> {
    async fn find_and_lock_active_by_digest(
        &mut self,
        digest: &RefreshDigest,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        // Locking read: a second transaction on the same row blocks here until
        // the first commits, then re-reads the committed digest and misses.
        let sql = format!(
            r#"
SELECT {SESSION_COLUMNS}
FROM session
WHERE refresh_digest = ?
  AND revoked_at IS NULL
  AND expires_at > ?
FOR UPDATE
"#
        );
        let row_opt: Option<MySqlRow> = sqlx::query(&sql)
            .bind(digest.as_bytes())
            .bind(now)
            .fetch_optional(self.conn())
            .await
            .map_err(store_error)?;

        row_opt.map(MySqlSessionRepo::row_to_record).transpose()
    }

    async fn update_digest_and_expiry(
        &mut self,
        session_id: SessionId,
        new_digest: &RefreshDigest,
        new_expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
UPDATE session
SET refresh_digest = ?, expires_at = ?
WHERE session_id = ?
"#,
        )
        .bind(new_digest.as_bytes())
        .bind(new_expires_at)
        .bind(session_id.0.as_bytes().as_slice())
        .execute(self.conn())
        .await
        .map_err(store_error)?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Backend(format!(
                "session {session_id} vanished while locked"
            )));
        }
        Ok(())
    }
}
