use std::str::FromStr;
use std::time::Duration;

use fleetwatch_core::thresholds::ThresholdConfig;
use fleetwatch_db::DEFAULT_MAX_CONNECTIONS;
use fleetwatch_events::fanout::DEFAULT_NOTIFY_TIMEOUT;

/// Monitor configuration loaded from environment variables.
///
/// Every value has a default; an unparsable value logs a warning and falls
/// back to it rather than aborting startup.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// A machine whose last sample is older than this is offline.
    pub offline_after: Duration,
    /// Delay between polling cycles.
    pub check_interval: Duration,
    pub thresholds: ThresholdConfig,
    /// Per-channel bound on a single notification delivery.
    pub notify_timeout: Duration,
    /// Alert email recipients, parsed from comma-separated `ALERT_EMAIL_TO`.
    pub alert_email_to: Vec<String>,
    pub alert_webhook_url: Option<String>,
    pub db_max_connections: u32,
}

impl MonitorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default |
    /// |-----------------------|---------|
    /// | `OFFLINE_AFTER_SECS`  | `60`    |
    /// | `CHECK_INTERVAL_SECS` | `30`    |
    /// | `CPU_ALERT_THRESH`    | `90`    |
    /// | `RAM_ALERT_THRESH`    | `90`    |
    /// | `DISK_ALERT_THRESH`   | `90`    |
    /// | `TEMP_ALERT_THRESH`   | `85`    |
    /// | `ALERT_COOLDOWN_SECS` | `600`   |
    /// | `NOTIFY_TIMEOUT_SECS` | `15`    |
    /// | `ALERT_EMAIL_TO`      | empty   |
    /// | `ALERT_WEBHOOK_URL`   | unset   |
    /// | `DB_MAX_CONNECTIONS`  | `20`    |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ThresholdConfig::default();

        let thresholds = ThresholdConfig {
            cpu_percent: parse_or(&lookup, "CPU_ALERT_THRESH", defaults.cpu_percent),
            ram_percent: parse_or(&lookup, "RAM_ALERT_THRESH", defaults.ram_percent),
            temperature_c: parse_or(&lookup, "TEMP_ALERT_THRESH", defaults.temperature_c),
            disk_percent: parse_or(&lookup, "DISK_ALERT_THRESH", defaults.disk_percent),
            cooldown: Duration::from_secs(parse_or(
                &lookup,
                "ALERT_COOLDOWN_SECS",
                defaults.cooldown.as_secs(),
            )),
        };

        let alert_email_to: Vec<String> = lookup("ALERT_EMAIL_TO")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let alert_webhook_url = lookup("ALERT_WEBHOOK_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            offline_after: Duration::from_secs(parse_or(&lookup, "OFFLINE_AFTER_SECS", 60)),
            check_interval: Duration::from_secs(parse_or::<u64>(&lookup, "CHECK_INTERVAL_SECS", 30).max(1)),
            thresholds,
            notify_timeout: Duration::from_secs(parse_or(
                &lookup,
                "NOTIFY_TIMEOUT_SECS",
                DEFAULT_NOTIFY_TIMEOUT.as_secs(),
            )),
            alert_email_to,
            alert_webhook_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, %default, "Unparsable configuration value, using default");
                default
            }
        },
    }
}
