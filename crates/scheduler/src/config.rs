use std::time::Duration;

use alerter_core::{IntervalSpec, Properties, DEFAULT_INTERVAL};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Per-connector tuning, typically resolved from properties at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Maximum number of query ticks executing at once across all triggers.
    #[serde(default = "default_thread_pool_size")]
    pub thread_pool_size: usize,
    /// Bound on waiting for in-flight ticks during `stop()`.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Interval for triggers that do not carry one.
    #[serde(default)]
    pub default_interval: IntervalSpec,
}

fn default_thread_pool_size() -> usize {
    20
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: default_thread_pool_size(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            default_interval: DEFAULT_INTERVAL,
        }
    }
}

impl ConnectorConfig {
    /// Resolve the config for connector `name`.
    ///
    /// Reads `{NAME}_THREAD_POOL_SIZE` / `alerts.{name}-thread-pool-size`,
    /// `{NAME}_SHUTDOWN_TIMEOUT` / `alerts.{name}-shutdown-timeout` and
    /// `{NAME}_DEFAULT_INTERVAL` / `alerts.{name}-default-interval`, falling
    /// back to the defaults on missing or invalid values.
    pub fn from_properties(props: &Properties, name: &str) -> Self {
        let defaults = Self::default();
        let env_prefix = name.to_ascii_uppercase().replace('-', "_");

        let thread_pool_size = parse_or(
            &props.get_property(
                &format!("alerts.{name}-thread-pool-size"),
                &format!("{env_prefix}_THREAD_POOL_SIZE"),
                &defaults.thread_pool_size.to_string(),
            ),
            defaults.thread_pool_size,
            name,
            "thread pool size",
        );
        let shutdown_timeout_secs = parse_or(
            &props.get_property(
                &format!("alerts.{name}-shutdown-timeout"),
                &format!("{env_prefix}_SHUTDOWN_TIMEOUT"),
                &defaults.shutdown_timeout_secs.to_string(),
            ),
            defaults.shutdown_timeout_secs,
            name,
            "shutdown timeout",
        );
        let default_interval = IntervalSpec::parse_or(
            Some(&props.get_property(
                &format!("alerts.{name}-default-interval"),
                &format!("{env_prefix}_DEFAULT_INTERVAL"),
                "",
            )),
            defaults.default_interval,
        );

        Self {
            thread_pool_size,
            shutdown_timeout_secs,
            default_interval,
        }
    }

    /// Pool size, never zero.
    pub fn resolved_pool_size(&self) -> usize {
        self.thread_pool_size.max(1)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn parse_or<T>(raw: &str, default: T, connector: &str, what: &str) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    raw.trim().parse().unwrap_or_else(|_| {
        warn!(connector = %connector, value = %raw, default = %default, "invalid {what}, using default");
        default
    })
}
