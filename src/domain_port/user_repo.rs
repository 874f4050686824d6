use super::StoreError;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a user. A taken email yields `StoreError::Conflict`.
    async fn create(&self, user: &NewUser) -> Result<UserId, StoreError>;

    /// Fetch by normalized email (for login and duplicate checks).
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
}
