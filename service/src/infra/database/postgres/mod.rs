//! Postgres [`Database`] implementation.

pub mod client;
pub mod connection;
mod impls;

use deadpool_postgres::Runtime;
use derive_more::{Deref, Display, Error as StdError, From};
use tokio_postgres::{error::SqlState, NoTls};
use tracerr::Traced;

use crate::infra::database;
#[cfg(doc)]
use crate::infra::Database;

pub use refinery::embed_migrations;

pub use self::{
    client::{NonTx, Tx},
    connection::Connection,
};

pub use deadpool_postgres::Config;

/// Postgres [`Database`] client.
#[derive(Clone, Debug, Deref)]
pub struct Postgres<T = NonTx>(T);

impl Postgres {
    /// Creates a new [`Postgres`] client with the provided [`Config`].
    ///
    /// # Errors
    ///
    /// If failed to create a new [`Postgres`] client.
    pub fn new(conf: &Config) -> Result<Self, Traced<database::Error>> {
        let pool = conf
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;
        Ok(Self(NonTx::from_pool(pool)))
    }
}

/// Postgres database [`Error`].
#[derive(Debug, Display, StdError, From)]
pub enum Error {
    /// [`Connection`] error.
    #[display("`Connection` error: {_0}")]
    Connection(connection::Error),

    /// Error of creating a new [`connection::Pool`] client.
    #[display("Failed to create a new `connection::Pool`: {_0}")]
    PoolCreationError(connection::PoolCreationError),

    /// [`connection::Pool`] error.
    #[display("`connection::Pool` error: {_0}")]
    PoolError(connection::PoolError),

    /// [`Tx`] is used after being committed.
    #[display("`Tx` is already committed")]
    #[from(ignore)]
    TxFinished,

    /// Stored row doesn't pass domain validation.
    #[display("{_0}")]
    Corrupted(CorruptedRow),
}

impl Error {
    /// Checks if the error is a unique violation of the specified constraint.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::Connection(e) => {
                e.code() == Some(&SqlState::UNIQUE_VIOLATION)
                    && constraint.map_or(true, |c| {
                        e.as_db_error().and_then(|e| e.constraint()) == Some(c)
                    })
            }
            Self::PoolError(..)
            | Self::PoolCreationError(..)
            | Self::TxFinished
            | Self::Corrupted(..) => false,
        }
    }
}

/// Row failed to decode into a domain entity.
///
/// Such a row is rejected rather than trusted.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, StdError)]
#[display("corrupted `{table}` row: {reason}")]
pub struct CorruptedRow {
    /// Table the row belongs to.
    pub table: &'static str,

    /// Reason of the row being rejected.
    pub reason: &'static str,
}

impl CorruptedRow {
    /// Wraps this [`CorruptedRow`] into a [`Traced`] [`database::Error`].
    #[must_use]
    pub(crate) fn into_traced(self) -> Traced<database::Error> {
        tracerr::map_from(tracerr::new!(Error::Corrupted(self)))
    }
}
