//! [`Handler`] abstractions.
//!
//! Everything the service does is expressed as a [`Handler`] executed with
//! an operation argument: commands and queries are handled by the service,
//! [`Select`]s and [`Commit`]s are handled by a database, and [`Dispatch`]es
//! are handled by a notifier. This keeps every collaborator swappable by
//! just implementing the required operations.
//!
//! [`Commit`]: crate::operations::Commit
//! [`Dispatch`]: crate::operations::Dispatch
//! [`Select`]: crate::operations::Select

use std::future::Future;

/// Executable handler of `Args`.
pub trait Handler<Args = ()> {
    /// Type of successful [`Handler`] result.
    type Ok;

    /// Type of this [`Handler`] error.
    type Err;

    /// Executes this [`Handler`] with the provided arguments.
    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}
