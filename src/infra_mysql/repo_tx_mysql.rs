use super::util::store_error;
use crate::domain_port::{StorageTx, StoreError};
use sqlx::{MySql, MySqlConnection, Transaction};

pub struct MySqlTx<'t> {
    inner: Transaction<'t, MySql>,
}

impl<'t> MySqlTx<'t> {
    pub fn new(inner: Transaction<'t, MySql>) -> Self {
        MySqlTx { inner }
    }

    pub fn conn(&mut self) -> &mut MySqlConnection {
        &mut self.inner
    }
}

#[async_trait::async_trait]
impl<'t> StorageTx<'t> for MySqlTx<'t> {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit().await.map_err(store_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await.map_err(store_error)
    }
}
