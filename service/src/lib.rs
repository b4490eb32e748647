//! Remaining useful life assessment service.
//!
//! Scores renovation histories, estimates remaining useful lives of
//! properties and manages the priced offers made for them.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod task;

use std::{fmt, hash::Hash, sync::Arc, time};

use common::{
    operations::{By, Dispatch, Select, Start},
    Percent,
};
use derive_more::{Debug, Display, Error};
use rust_decimal::Decimal;
use smart_default::SmartDefault;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{customer, Notification},
    infra::{
        cache::{self, Cached},
        database, Database, Notifier,
    },
};

pub use self::{command::Command, query::Query, task::Task};

/// [`Service`] configuration.
#[derive(Clone, Debug, SmartDefault)]
pub struct Config {
    /// VAT rate applied to offers.
    #[default(Percent::clamped(Decimal::from(19)))]
    pub vat_percent: Percent,

    /// Period an [`Offer`] stays open after its creation.
    ///
    /// [`Offer`]: domain::Offer
    #[default(time::Duration::from_secs(30 * 24 * 60 * 60))]
    pub offer_validity: time::Duration,

    /// [`customer::Email`] to notify about accepted offers, if any.
    pub admin_notification_email: Option<customer::Email>,

    /// [`task::ExpireOffers`] configuration.
    pub expire_offers: task::expire_offers::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Ntf> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Notifier`] of this [`Service`].
    notifier: Ntf,

    /// [`cache::Reference`] data of this [`Service`].
    #[debug(skip)]
    cache: Arc<cache::Reference>,
}

impl<Db, Ntf> Service<Db, Ntf> {
    /// Creates a new [`Service`] with the provided parameters, along with the
    /// [`task::Background`] its [`Task`]s run in.
    pub fn new(
        config: Config,
        database: Db,
        notifier: Ntf,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<By<task::ExpireOffers<Self>, task::expire_offers::Config>>,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let this = Self::without_tasks(config, database, notifier);

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn("expire_offers", async move {
            svc.execute(Start(By::new(svc.config().expire_offers))).await
        });

        (this, bg)
    }

    /// Creates a new [`Service`] with the provided parameters without
    /// spawning any of its [`Task`]s.
    #[must_use]
    pub fn without_tasks(config: Config, database: Db, notifier: Ntf) -> Self {
        Self {
            config,
            database,
            notifier,
            cache: Arc::default(),
        }
    }

    /// Returns [`Config`] of this [`Service`].
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`Notifier`] of this [`Service`].
    #[must_use]
    pub fn notifier(&self) -> &Ntf {
        &self.notifier
    }

    /// Returns [`cache::Reference`] data of this [`Service`].
    #[must_use]
    pub fn cache(&self) -> &cache::Reference {
        &self.cache
    }

    /// Selects a `W` by the provided `B` from the [`Database`], going through
    /// the [`cache::Reference`] data.
    async fn cached<W, B>(&self, by: B) -> Result<W, Traced<database::Error>>
    where
        Db: Database<Select<By<W, B>>, Ok = W, Err = Traced<database::Error>>,
        cache::Reference: Cached<W, B>,
        B: Clone + Eq + Hash + fmt::Debug,
        W: Clone,
    {
        self.cache
            .cache()
            .get_or_try_load(by.clone(), || {
                self.database.execute(Select(By::new(by)))
            })
            .await
            .map_err(tracerr::wrap!())
    }

    /// Dispatches the provided [`Notification`], logging a failure instead of
    /// propagating it.
    async fn notify(&self, notification: Notification)
    where
        Ntf: Notifier<Dispatch<Notification>, Err: fmt::Display>,
    {
        let (kind, recipient) =
            (notification.kind(), notification.recipient().clone());
        if let Err(e) = self.notifier.execute(Dispatch(notification)).await {
            log::warn!(
                kind,
                recipient = %recipient,
                "failed to deliver `Notification`: {e}",
            );
        }
    }
}

/// Shortcut for the error of starting a [`Task`].
type TaskStartError<Svc, T, Args> = <Svc as Task<Start<By<T, Args>>>>::Err;

/// Error of starting a [`Service`].
#[derive(Debug, Display, Error)]
pub enum StartupError<Svc>
where
    Svc: Task<Start<By<task::ExpireOffers<Svc>, task::expire_offers::Config>>>,
{
    /// [`task::ExpireOffers`] failed to start.
    ExpireOffersTask(
        TaskStartError<
            Svc,
            task::ExpireOffers<Svc>,
            task::expire_offers::Config,
        >,
    ),
}
