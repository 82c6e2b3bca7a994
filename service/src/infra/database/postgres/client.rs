//! Postgres database clients.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{self, connection, Connection},
};

/// Non-transactional Postgres database client.
///
/// Every statement runs on a connection checked out of the
/// [`connection::Pool`] for that statement only.
#[derive(Clone, Debug)]
pub struct NonTx {
    /// [`connection::Pool`] to check connections out of.
    pub(crate) pool: connection::Pool,
}

impl NonTx {
    /// Creates a new [`NonTx`] client from the provided [`connection::Pool`].
    #[must_use]
    pub(crate) fn from_pool(pool: connection::Pool) -> Self {
        Self { pool }
    }

    /// Checks a [`connection::NonTx`] out of the [`connection::Pool`].
    async fn checkout(
        &self,
    ) -> Result<connection::NonTx, Traced<database::Error>> {
        self.pool
            .get()
            .await
            .map_err(tracerr::from_and_wrap!(=> postgres::Error))
            .map_err(tracerr::map_from)
    }

    /// Begins a new transaction on a dedicated connection.
    ///
    /// # Errors
    ///
    /// If failed to check out a connection or to begin a transaction on it.
    pub async fn begin(&self) -> Result<Tx, Traced<database::Error>> {
        let conn = self.checkout().await.map_err(tracerr::wrap!())?;
        let tx = connection::Tx::begin(conn)
            .await
            .map_err(tracerr::wrap!())?;
        Ok(Tx {
            inner: Arc::new(Mutex::new(Some(tx))),
        })
    }
}

impl Connection for NonTx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.checkout()
            .await
            .map_err(tracerr::wrap!())?
            .query(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn query_opt<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.checkout()
            .await
            .map_err(tracerr::wrap!())?
            .query_opt(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.checkout()
            .await
            .map_err(tracerr::wrap!())?
            .exec(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }
}

/// Transactional Postgres database client.
///
/// All the clones share the same transaction, which is rolled back if the
/// last clone is dropped without [`Tx::commit()`].
#[derive(Clone, Debug)]
pub struct Tx {
    /// Open [`connection::Tx`], or [`None`] once committed.
    inner: Arc<Mutex<Option<connection::Tx>>>,
}

impl Tx {
    /// Commits this [`Tx`] client.
    ///
    /// # Errors
    ///
    /// If this [`Tx`] is already committed, or failed to commit it.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        self.inner
            .lock()
            .await
            .take()
            .ok_or_else(|| tracerr::new!(postgres::Error::TxFinished))
            .map_err(tracerr::map_from)?
            .commit()
            .await
            .map_err(tracerr::wrap!())
    }
}

/// Returns the open [`connection::Tx`] out of the provided slot.
fn open(
    slot: Option<&connection::Tx>,
) -> Result<&connection::Tx, Traced<database::Error>> {
    slot.ok_or_else(|| tracerr::new!(postgres::Error::TxFinished))
        .map_err(tracerr::map_from)
}

impl Connection for Tx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        let slot = self.inner.lock().await;
        open(slot.as_ref())
            .map_err(tracerr::wrap!())?
            .query(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn query_opt<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        let slot = self.inner.lock().await;
        open(slot.as_ref())
            .map_err(tracerr::wrap!())?
            .query_opt(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        let slot = self.inner.lock().await;
        open(slot.as_ref())
            .map_err(tracerr::wrap!())?
            .exec(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }
}
