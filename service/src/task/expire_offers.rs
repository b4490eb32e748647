//! [`ExpireOffers`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Perform, Start, Update};
use smart_default::SmartDefault;
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::offer,
    infra::{database, Database},
    Service,
};

#[cfg(doc)]
use crate::domain::Offer;

use super::Task;

/// Configuration for [`ExpireOffers`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between checks for expired [`Offer`]s.
    #[default(time::Duration::from_secs(60 * 60))]
    pub interval: time::Duration,
}

/// [`Task`] marking open [`Offer`]s as expired once their expiration
/// [`DateTime`] has passed.
///
/// [`DateTime`]: common::DateTime
#[derive(Clone, Copy, Debug)]
pub struct ExpireOffers<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Ntf> Task<Start<By<ExpireOffers<Self>, Config>>> for Service<Db, Ntf>
where
    ExpireOffers<Self>:
        Task<Perform<()>, Ok = u64, Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<ExpireOffers<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = ExpireOffers {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            match task.execute(Perform(())).await {
                Ok(0) => {}
                Ok(n) => log::info!("`task::ExpireOffers` expired {n} offers"),
                Err(e) => log::error!("`task::ExpireOffers` failed: {e}"),
            }
        }
    }
}

impl<Db, Ntf> Task<Perform<()>> for ExpireOffers<Service<Db, Ntf>>
where
    Db: Database<
        Update<By<offer::Status, offer::ExpirationDateTime>>,
        Ok = u64,
        Err = Traced<database::Error>,
    >,
{
    type Ok = u64;
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        self.service
            .database()
            .execute(Update(By::new(offer::ExpirationDateTime::now())))
            .await
            .map_err(tracerr::map_from_and_wrap!())
    }
}

/// Error of [`ExpireOffers`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        operations::{By, Perform, Select},
        DateTime,
    };

    use crate::{
        domain::offer::{self, spec::draft, Status},
        infra::{database::memory::State, notifier, Database, Memory},
        Config, Service, Task as _,
    };

    use super::ExpireOffers;

    #[tokio::test]
    async fn expires_only_open_overdue_offers() {
        let past = DateTime::now() - Duration::from_secs(60);
        let future = DateTime::now() + Duration::from_secs(3600);

        let mut overdue = draft(Some(1000));
        overdue.expires_at = Some(past.coerce());
        let mut sent = draft(Some(1000));
        sent.status = Status::Sent;
        sent.expires_at = Some(past.coerce());
        let mut accepted = draft(Some(1000));
        accepted.status = Status::Accepted;
        accepted.accepted_at = Some(past.coerce());
        accepted.expires_at = Some(past.coerce());
        let mut fresh = draft(Some(1000));
        fresh.expires_at = Some(future.coerce());
        let unbounded = draft(Some(1000));

        let offers = [&overdue, &sent, &accepted, &fresh, &unbounded]
            .into_iter()
            .map(|o| (o.id, o.clone()))
            .collect();
        let db = Memory::new(State {
            offers,
            ..State::default()
        });
        let task = ExpireOffers {
            config: super::Config::default(),
            service: Service::without_tasks(
                Config::default(),
                db.clone(),
                notifier::Memory::default(),
            ),
        };

        assert_eq!(task.execute(Perform(())).await.unwrap(), 2);
        assert_eq!(task.execute(Perform(())).await.unwrap(), 0);

        let status = |id: offer::Id| {
            let db = db.clone();
            async move {
                db.execute(Select(By::<Option<offer::Offer>, _>::new(id)))
                    .await
                    .unwrap()
                    .unwrap()
                    .status
            }
        };
        assert_eq!(status(overdue.id).await, Status::Expired);
        assert_eq!(status(sent.id).await, Status::Expired);
        assert_eq!(status(accepted.id).await, Status::Accepted);
        assert_eq!(status(fresh.id).await, Status::Draft);
        assert_eq!(status(unbounded.id).await, Status::Draft);
    }
}
