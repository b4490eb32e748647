//! [`Query`] collection related to a single [`Calculation`].

use common::operations::By;

use crate::domain::{calculation, Calculation};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`Calculation`] by its [`calculation::PublicRef`].
pub type ByPublicRef =
    DatabaseQuery<By<Option<Calculation>, calculation::PublicRef>>;

/// Queries a [`Calculation`] by its [`calculation::Id`].
pub type ById = DatabaseQuery<By<Option<Calculation>, calculation::Id>>;
