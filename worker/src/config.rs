//! [`Config`]-related definitions.

use std::time;

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;
use service::FeeSchedule;
use smart_default::SmartDefault;

/// Worker configuration.
#[derive(Clone, Debug, Default, Deserialize)]
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
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Service {
    /// Per-item rates every order is charged and distributed by.
    pub fee_schedule: FeeSchedule,

    /// Service tasks configuration.
    pub tasks: Tasks,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Service {
            fee_schedule,
            tasks:
                Tasks {
                    complete_settlements,
                    purge_orders,
                },
        } = value;
        Self {
            fee_schedule,
            complete_settlements:
                service::task::complete_settlements::Config {
                    interval: complete_settlements.interval,
                    batch: complete_settlements.batch,
                },
            purge_orders: service::task::purge_orders::Config {
                interval: purge_orders.interval,
                retention: purge_orders.retention,
            },
        }
    }
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Tasks {
    /// `CompleteSettlements` task configuration.
    pub complete_settlements: CompleteSettlements,

    /// `PurgeOrders` task configuration.
    pub purge_orders: PurgeOrders,
}

/// `CompleteSettlements` task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct CompleteSettlements {
    /// Task execution interval.
    #[default(time::Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,

    /// Maximum number of settlements completed per execution.
    #[default(100)]
    pub batch: u32,
}

/// `PurgeOrders` task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct PurgeOrders {
    /// Task execution interval.
    #[default(time::Duration::from_secs(60 * 60))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,

    /// Time a finished order is kept for after its last modification.
    #[default(time::Duration::from_secs(60 * 60 * 24 * 30))]
    #[serde(with = "humantime_serde")]
    pub retention: time::Duration,
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
    use std::time;

    use config::{builder::DefaultState, ConfigBuilder, FileFormat};

    use super::Config;

    fn parse(toml: &str) -> Config {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults_missing_sections() {
        let conf = parse("");
        let service = service::Config::from(conf.service);

        assert_eq!(
            service.fee_schedule,
            service::FeeSchedule::default(),
        );
        assert_eq!(
            service.complete_settlements.interval,
            time::Duration::from_secs(30),
        );
        assert_eq!(conf.postgres.port, 5432);
    }

    #[test]
    fn reads_human_durations_and_rates() {
        let conf = parse(
            r#"
            [service.fee_schedule]
            platform_rate_per_item = "1.25"

            [service.fee_schedule.app_fee]
            threshold = "30"
            per_item = "0.50"

            [service.tasks.purge_orders]
            retention = "7days"
            "#,
        );

        let fees = conf.service.fee_schedule;
        assert_eq!(fees.platform_rate_per_item, "1.25".parse().unwrap());
        assert!(fees.app_fee.is_some());
        assert_eq!(
            conf.service.tasks.purge_orders.retention,
            time::Duration::from_secs(7 * 24 * 60 * 60),
        );
    }
}
