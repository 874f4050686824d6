use crate::domain_port::StoreError;
use sqlx::mysql::MySqlDatabaseError;

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return mysql_err.number() == 1062; // ER_DUP_ENTRY
        }
    }

    false
}

/// Classify a driver error for the core. Only duplicate keys are conflicts.
pub fn store_error(err: sqlx::Error) -> StoreError {
    if is_dup_key(&err) {
        StoreError::Conflict
    } else {
        StoreError::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_backend_errors() {
        let err = store_error(sqlx::Error::RowNotFound);
        assert!(!err.is_conflict());
        assert!(!is_dup_key(&sqlx::Error::PoolTimedOut));
    }
}
