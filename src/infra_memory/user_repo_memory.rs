use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Users {
    by_email: HashMap<String, UserRecord>,
    last_id: i64,
}

#[derive(Default)]
pub struct MemoryUserRepo {
    users: Mutex<Users>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, user: &NewUser) -> Result<UserId, StoreError> {
        let mut users = self
            .users
            .lock()
            .map_err(|_| StoreError::Backend("user table poisoned".to_string()))?;
        if users.by_email.contains_key(&user.email) {
            return Err(StoreError::Conflict);
        }
        users.last_id += 1;
        let user_id = UserId(users.last_id);
        users.by_email.insert(
            user.email.clone(),
            UserRecord {
                user_id,
                email: user.email.clone(),
                name: user.name.clone(),
                password_hash: user.password_hash.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(user_id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self
            .users
            .lock()
            .map_err(|_| StoreError::Backend("user table poisoned".to_string()))?;
        Ok(users.by_email.get(email).cloned())
    }
}
