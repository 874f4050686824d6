/// Failure reported by a store adapter. Adapters classify their native errors
/// into exactly one bit the core cares about: was it a uniqueness conflict.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint conflict")]
    Conflict,
    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict)
    }
}

/// A unit of work against a store. Dropping it without `commit` rolls it back.
#[async_trait::async_trait]
pub trait StorageTx<'t>: Send {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
