use super::util::store_error;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<UserRecord, StoreError> {
        let get_err = |e: sqlx::Error| StoreError::Backend(e.to_string());

        Ok(UserRecord {
            user_id: row.try_get("user_id").map_err(get_err)?,
            email: row.try_get("email").map_err(get_err)?,
            name: row.try_get("name").map_err(get_err)?,
            password_hash: row.try_get("password_hash").map_err(get_err)?,
            created_at: row.try_get("created_at").map_err(get_err)?,
        })
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn create(&self, user: &NewUser) -> Result<UserId, StoreError> {
        let result = sqlx::query(
            r#"
INSERT INTO user (email, name, password_hash)
VALUES (?, ?, ?)
"#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(UserId(result.last_insert_id() as i64))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, email, name, password_hash, created_at
FROM user
WHERE email = ?
"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row_opt.map(Self::row_to_record).transpose()
    }
}
