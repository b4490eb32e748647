//! Environment the [`Task`]s of a [`Service`] run in.
//!
//! [`Service`]: crate::Service

use std::{
    error::Error,
    future::{Future, IntoFuture},
};

use derive_more::Display;
use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _, TryFutureExt as _,
};
use tokio::task;
use tracing as log;

#[cfg(doc)]
use crate::Task;

/// Boxed error of a failed [`Task`].
type BoxedError = Box<dyn Error + 'static>;

/// Environment running spawned [`Task`]s on the current thread until the
/// first of them fails.
#[derive(Debug, Default)]
pub struct Background {
    /// Local set the [`Task`]s are driven by.
    set: task::LocalSet,

    /// Names and handles of the spawned [`Task`]s.
    tasks: Vec<(&'static str, task::JoinHandle<Result<(), BoxedError>>)>,
}

impl Background {
    /// Spawns the provided [`Task`] `future` under the provided `name`.
    pub fn spawn<F, E>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Error + 'static,
    {
        log::debug!(task = name, "spawning background `Task`");
        let handle = self
            .set
            .spawn_local(future.map_err(|e| BoxedError::from(Box::new(e))));
        self.tasks.push((name, handle));
    }

    /// Returns the number of spawned [`Task`]s.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Indicates whether no [`Task`]s were spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// [`Task`] of a [`Background`] that stopped with an error or panicked.
#[derive(Debug, Display)]
#[display("`{task}` background `Task` failed: {source}")]
pub struct TaskFailed {
    /// Name of the failed [`Task`].
    pub task: &'static str,

    /// Error the [`Task`] failed with.
    pub source: BoxedError,
}

impl Error for TaskFailed {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.source)
    }
}

impl IntoFuture for Background {
    type Output = Result<(), TaskFailed>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { set, tasks } = self;

        let handles = tasks.into_iter().map(|(task, handle)| {
            handle
                .map(move |res| {
                    res.map_err(BoxedError::from)
                        .and_then(|r| r)
                        .map_err(|source| TaskFailed { task, source })
                })
                .boxed_local()
        });

        future::try_join_all(
            handles.chain([set.map(Ok::<_, TaskFailed>).boxed_local()]),
        )
        .map_ok(drop)
        .inspect_err(|e| log::error!("{e}"))
        .boxed_local()
    }
}

#[cfg(test)]
mod spec {
    use std::{future::IntoFuture as _, io};

    use super::Background;

    #[tokio::test]
    async fn completes_when_all_tasks_complete() {
        let mut bg = Background::default();
        assert!(bg.is_empty());

        bg.spawn("first", async { Ok::<_, io::Error>(()) });
        bg.spawn("second", async { Ok::<_, io::Error>(()) });
        assert_eq!(bg.len(), 2);

        bg.into_future().await.unwrap();
    }

    #[tokio::test]
    async fn names_failed_task() {
        let mut bg = Background::default();
        bg.spawn("healthy", async { Ok::<_, io::Error>(()) });
        bg.spawn("broken", async {
            Err(io::Error::other("boom"))
        });

        let err = bg.into_future().await.unwrap_err();

        assert_eq!(err.task, "broken");
        assert_eq!(err.to_string(), "`broken` background `Task` failed: boom");
    }
}
