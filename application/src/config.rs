//! [`Config`]-related definitions.

use std::time;

use common::Percent;
use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use rust_decimal::Decimal;
use serde::Deserialize;
use service::domain::customer;
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service configuration.
    pub service: Service,

    /// Postgres configuration.
    pub postgres: Postgres,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Service configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Service {
    /// VAT rate applied to offers, in percents.
    #[default(Percent::clamped(Decimal::from(19)))]
    pub vat_percent: Percent,

    /// Period an offer stays open after its creation.
    #[default(time::Duration::from_secs(30 * 24 * 60 * 60))]
    #[serde(with = "humantime_serde")]
    pub offer_validity: time::Duration,

    /// Email to notify about confirmed offers, if any.
    pub admin_notification_email: Option<customer::Email>,

    /// Service tasks configuration.
    pub tasks: Tasks,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Service {
            vat_percent,
            offer_validity,
            admin_notification_email,
            tasks: Tasks { expire_offers },
        } = value;

        Self {
            vat_percent,
            offer_validity,
            admin_notification_email,
            expire_offers: service::task::expire_offers::Config {
                interval: expire_offers.interval,
            },
        }
    }
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Tasks {
    /// `ExpireOffers` task configuration.
    pub expire_offers: Task,
}

/// Service task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Task {
    /// Task execution interval.
    #[default(time::Duration::from_secs(60 * 60))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::{io::Write as _, time};

    use common::Percent;
    use rust_decimal::Decimal;

    use super::{Config, LogLevel};

    #[test]
    fn defaults_without_file() {
        let conf = Config::new("does-not-exist.toml").unwrap();

        assert_eq!(
            conf.service.vat_percent,
            Percent::new(Decimal::from(19)).unwrap(),
        );
        assert_eq!(
            conf.service.offer_validity,
            time::Duration::from_secs(30 * 24 * 60 * 60),
        );
        assert_eq!(conf.service.admin_notification_email, None);
        assert_eq!(
            conf.service.tasks.expire_offers.interval,
            time::Duration::from_secs(60 * 60),
        );
        assert!(matches!(conf.log.level, LogLevel::Info));
    }

    #[test]
    fn reads_toml_file() {
        let path = std::env::temp_dir()
            .join(format!("rnd-config-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
            [service]
            vat_percent = 7
            offer_validity = "14days"
            admin_notification_email = "Office@Example.com"

            [service.tasks.expire_offers]
            interval = "5m"

            [log]
            level = "DEBUG"
            "#,
        )
        .unwrap();
        drop(file);

        let conf = Config::new(path.to_string_lossy()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            conf.service.vat_percent,
            Percent::new(Decimal::from(7)).unwrap(),
        );
        assert_eq!(
            conf.service.offer_validity,
            time::Duration::from_secs(14 * 24 * 60 * 60),
        );
        assert_eq!(
            conf.service
                .admin_notification_email
                .map(|e| e.to_string())
                .as_deref(),
            Some("office@example.com"),
        );
        assert_eq!(
            conf.service.tasks.expire_offers.interval,
            time::Duration::from_secs(5 * 60),
        );
        assert!(matches!(conf.log.level, LogLevel::Debug));
    }
}
