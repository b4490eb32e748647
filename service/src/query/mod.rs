//! [`Query`] definition.

pub mod calculation;
pub mod offer;
pub mod reference;

use std::{fmt, hash::Hash};

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    infra::{
        cache::{self, Cached},
        database, Database,
    },
    Service,
};

/// [`Query`] of the [`Service`].
pub use common::Handler as Query;

/// [`Query`] [`Select`]ing a `T`ype from a [`Database`].
#[derive(Clone, Copy, Debug)]
#[expect(clippy::module_name_repetitions, reason = "more readable")]
pub struct DatabaseQuery<T>(T);

impl<W, B> DatabaseQuery<By<W, B>> {
    /// Creates a new [`DatabaseQuery`] selecting a `W` by the provided `B`.
    #[must_use]
    pub fn by(by: B) -> Self {
        Self(By::new(by))
    }
}

impl<Db, Ntf, W, B> Query<DatabaseQuery<By<W, B>>> for Service<Db, Ntf>
where
    Db: Database<Select<By<W, B>>, Ok = W, Err = Traced<database::Error>>,
{
    type Ok = W;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        DatabaseQuery(by): DatabaseQuery<By<W, B>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.database()
            .execute(Select(by))
            .await
            .map_err(tracerr::wrap!())
    }
}

/// [`Query`] [`Select`]ing a `T`ype of reference data, served from the
/// [`cache::Reference`] once loaded.
#[derive(Clone, Copy, Debug)]
#[expect(clippy::module_name_repetitions, reason = "more readable")]
pub struct CachedQuery<T>(T);

impl<W, B> CachedQuery<By<W, B>> {
    /// Creates a new [`CachedQuery`] selecting a `W` by the provided `B`.
    #[must_use]
    pub fn by(by: B) -> Self {
        Self(By::new(by))
    }
}

impl<Db, Ntf, W, B> Query<CachedQuery<By<W, B>>> for Service<Db, Ntf>
where
    Db: Database<Select<By<W, B>>, Ok = W, Err = Traced<database::Error>>,
    cache::Reference: Cached<W, B>,
    B: Clone + Eq + Hash + fmt::Debug,
    W: Clone,
{
    type Ok = W;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        CachedQuery(by): CachedQuery<By<W, B>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.cached(by.into_inner())
            .await
            .map_err(tracerr::wrap!())
    }
}
