use std::ops::RangeInclusive;
use std::time::Duration;

use clap::{Args, Parser};
use tracing::warn;

use crate::db::is_memory_url;

pub const DEBOUNCE_RANGE_MS: RangeInclusive<u64> = 300..=500;

#[derive(Clone, Debug, Parser)]
#[command(name = "sitebook")]
pub struct Config {
    #[arg(long, env = "SITEBOOK_PORT", default_value_t = 7600)]
    pub port: u16,

    /// `sqlite://…`, `postgres://…`, or `memory://` for a throwaway store.
    #[arg(long, env = "SITEBOOK_DB_URL", default_value = "sqlite://./sitebook.db")]
    pub db_url: String,

    #[arg(long, env = "SITEBOOK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(
        long = "max-request-body-bytes",
        env = "SITEBOOK_MAX_REQUEST_BODY_BYTES",
        default_value_t = 12 * 1024 * 1024
    )]
    pub max_request_body_bytes: usize,

    #[command(flatten)]
    pub geocoder: GeocoderConfig,

    #[command(flatten)]
    pub gantt: GanttConfig,
}

#[derive(Clone, Debug, Args)]
pub struct GeocoderConfig {
    #[arg(
        long = "geocoder-url",
        env = "SITEBOOK_GEOCODER_URL",
        default_value = "https://nominatim.openstreetmap.org"
    )]
    pub url: String,

    #[arg(
        long = "geocoder-user-agent",
        env = "SITEBOOK_GEOCODER_USER_AGENT",
        default_value = concat!("sitebook/", env!("CARGO_PKG_VERSION"))
    )]
    pub user_agent: String,

    #[arg(
        long = "geocode-debounce-ms",
        env = "SITEBOOK_GEOCODE_DEBOUNCE_MS",
        default_value_t = 400
    )]
    pub debounce_ms: u64,

    #[arg(
        long = "geocoder-timeout-secs",
        env = "SITEBOOK_GEOCODER_TIMEOUT_SECS",
        default_value_t = 5
    )]
    pub timeout_secs: u64,
}

impl GeocoderConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("sitebook/", env!("CARGO_PKG_VERSION")).to_string(),
            debounce_ms: 400,
            timeout_secs: 5,
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct GanttConfig {
    #[arg(
        long = "gantt-column-width",
        env = "SITEBOOK_GANTT_COLUMN_WIDTH",
        default_value_t = 30.0
    )]
    pub column_width: f64,

    #[arg(
        long = "gantt-row-height",
        env = "SITEBOOK_GANTT_ROW_HEIGHT",
        default_value_t = 40.0
    )]
    pub row_height: f64,
}

impl Default for GanttConfig {
    fn default() -> Self {
        Self {
            column_width: 30.0,
            row_height: 40.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let config = <Self as Parser>::parse();
        config.validate();
        config
    }

    /// In-memory store, default geocoder settings. Used by tests.
    pub fn ephemeral() -> Self {
        Self {
            port: 0,
            db_url: "memory://".to_string(),
            log_level: "info".to_string(),
            max_request_body_bytes: 12 * 1024 * 1024,
            geocoder: GeocoderConfig::default(),
            gantt: GanttConfig::default(),
        }
    }

    pub fn log_startup_warnings(&self) {
        if is_memory_url(&self.db_url) {
            warn!("SITEBOOK_DB_URL is memory://, nothing will survive a restart");
        }
    }

    fn validate(&self) {
        assert!(
            DEBOUNCE_RANGE_MS.contains(&self.geocoder.debounce_ms),
            "SITEBOOK_GEOCODE_DEBOUNCE_MS must be within {}..={}",
            DEBOUNCE_RANGE_MS.start(),
            DEBOUNCE_RANGE_MS.end()
        );
        assert!(
            self.geocoder.timeout_secs > 0,
            "SITEBOOK_GEOCODER_TIMEOUT_SECS must be greater than 0"
        );
        assert!(
            self.max_request_body_bytes > 0,
            "SITEBOOK_MAX_REQUEST_BODY_BYTES must be greater than 0"
        );
        assert_positive("SITEBOOK_GANTT_COLUMN_WIDTH", self.gantt.column_width);
        assert_positive("SITEBOOK_GANTT_ROW_HEIGHT", self.gantt.row_height);
    }
}

fn assert_positive(key: &'static str, value: f64) {
    assert!(
        value.is_finite() && value > 0.0,
        "{key} must be a positive number"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_and_validate() {
        let config = Config::parse_from(["sitebook"]);
        config.validate();
        assert_eq!(config.port, 7600);
        assert_eq!(config.geocoder.debounce(), Duration::from_millis(400));
        assert_eq!(config.gantt.column_width, 30.0);
    }

    #[test]
    #[should_panic(expected = "SITEBOOK_GEOCODE_DEBOUNCE_MS")]
    fn debounce_outside_range_is_rejected() {
        Config::parse_from(["sitebook", "--geocode-debounce-ms", "50"]).validate();
    }
}
