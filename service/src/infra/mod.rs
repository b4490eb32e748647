//! Infrastructure layer.

pub mod cache;
pub mod database;
pub mod notifier;

#[cfg(any(test, feature = "memory"))]
pub use self::database::Memory;
pub use self::{
    cache::Cache,
    database::Database,
    notifier::{Log as LogNotifier, Notifier},
};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
