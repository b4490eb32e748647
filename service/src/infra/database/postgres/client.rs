//! Lazily connected Postgres clients.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{self, connection, Connection},
};

/// Non-transactional Postgres client.
///
/// Acquires a pooled [`connection::NonTx`] on the first use only.
#[derive(Clone, Debug)]
pub struct NonTx {
    /// [`connection::Pool`] to acquire connections from.
    pub(crate) pool: connection::Pool,

    /// Acquired [`connection::NonTx`], if any.
    conn: Arc<RwLock<Option<connection::NonTx>>>,
}

/// Transactional Postgres client.
///
/// Starts its [`connection::Tx`] on the first use only, reusing the
/// connection of the [`NonTx`] client it was created from, if acquired.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`connection::Pool`] to acquire connections from.
    pool: connection::Pool,

    /// [`NonTx`] client to take the connection from.
    origin: Arc<RwLock<Option<NonTx>>>,

    /// Started [`connection::Tx`], if any.
    conn: Arc<RwLock<Option<connection::Tx>>>,
}

impl NonTx {
    /// Creates a new [`NonTx`] client over the provided [`connection::Pool`].
    #[must_use]
    pub(crate) fn from_pool(pool: connection::Pool) -> Self {
        Self {
            pool,
            conn: Arc::default(),
        }
    }

    /// Returns the [`connection::NonTx`] of this client, acquiring it if
    /// necessary.
    async fn conn(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::NonTx>, Traced<database::Error>>
    {
        let pool = &self.pool;
        let guard = init_once(&self.conn, || async move {
            pool.get()
                .await
                .map_err(tracerr::from_and_wrap!(=> postgres::Error))
                .map_err(tracerr::map_from)
        })
        .await?;
        Ok(guard)
    }

    /// Detaches the acquired [`connection::NonTx`] from this client, if any.
    async fn detach(&self) -> Option<connection::NonTx> {
        self.conn.write().await.take()
    }
}

impl Tx {
    /// Creates a new [`Tx`] client from the provided [`NonTx`] one.
    #[must_use]
    pub fn from_non_tx(client: NonTx) -> Self {
        Self {
            pool: client.pool.clone(),
            origin: Arc::new(RwLock::new(Some(client))),
            conn: Arc::default(),
        }
    }

    /// Returns the [`connection::Tx`] of this client, starting it if
    /// necessary.
    async fn conn(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::Tx>, Traced<database::Error>>
    {
        init_once(&self.conn, || async {
            let reused = match self.origin.write().await.take() {
                Some(origin) => origin.detach().await,
                None => None,
            };
            let conn = match reused {
                Some(c) => c,
                None => self
                    .pool
                    .get()
                    .await
                    .map_err(tracerr::from_and_wrap!(=> postgres::Error))
                    .map_err(tracerr::map_from)?,
            };
            connection::Tx::begin(conn).await.map_err(tracerr::wrap!())
        })
        .await
    }

    /// Commits the transaction of this client.
    ///
    /// Nothing happens if the transaction has never been started.
    ///
    /// # Errors
    ///
    /// If the `COMMIT` statement fails.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        let Some(tx) = self.conn.write().await.take() else {
            return Ok(());
        };
        tx.commit().await.map_err(tracerr::wrap!())
    }
}

/// Initializes the value behind the provided `slot` with the `init` function,
/// unless already initialized, and returns a read guard to it.
async fn init_once<'s, T, F, Fut>(
    slot: &'s RwLock<Option<T>>,
    init: F,
) -> Result<RwLockReadGuard<'s, T>, Traced<database::Error>>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, Traced<database::Error>>>,
{
    let read = slot.read().await;
    let guard = if read.is_some() {
        read
    } else {
        drop(read);
        let mut write = slot.write().await;
        if write.is_none() {
            *write = Some(init().await.map_err(tracerr::wrap!())?);
        }
        write.downgrade()
    };
    Ok(RwLockReadGuard::map(guard, |v| {
        v.as_ref().expect("initialized above and never taken while guarded")
    }))
}

/// Implements [`Connection`] for a client by forwarding to its raw
/// connection.
macro_rules! forward_connection {
    ($($client:ty),*) => {$(
        impl Connection for $client {
            async fn query<T>(
                &self,
                stmt: &T,
                params: &[&(dyn ToSql + Sync)],
            ) -> Result<Vec<Row>, Traced<database::Error>>
            where
                T: ToStatement + ?Sized,
            {
                let conn = self.conn().await.map_err(tracerr::wrap!())?;
                conn.query(stmt, params).await.map_err(tracerr::wrap!())
            }

            async fn query_opt<T>(
                &self,
                stmt: &T,
                params: &[&(dyn ToSql + Sync)],
            ) -> Result<Option<Row>, Traced<database::Error>>
            where
                T: ToStatement + ?Sized,
            {
                let conn = self.conn().await.map_err(tracerr::wrap!())?;
                conn.query_opt(stmt, params).await.map_err(tracerr::wrap!())
            }

            async fn exec<T>(
                &self,
                stmt: &T,
                params: &[&(dyn ToSql + Sync)],
            ) -> Result<u64, Traced<database::Error>>
            where
                T: ToStatement + ?Sized,
            {
                let conn = self.conn().await.map_err(tracerr::wrap!())?;
                conn.exec(stmt, params).await.map_err(tracerr::wrap!())
            }

            async fn batch_exec(
                &self,
                stmts: &str,
            ) -> Result<(), Traced<database::Error>> {
                let conn = self.conn().await.map_err(tracerr::wrap!())?;
                conn.batch_exec(stmts).await.map_err(tracerr::wrap!())
            }
        }
    )*};
}

forward_connection!(NonTx, Tx);
