//! Service configuration.
//!
//! Everything tunable lives here and is read from the environment exactly
//! once at startup; components receive the pieces they need instead of
//! reaching for ambient globals.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `OPTOUT_PORT` | No | Listening port (default: 5001) |
//! | `OPTOUT_STORE_PATH` | No | Store file path (default: `unsubscribes.csv`) |
//! | `OPTOUT_SMTP_HOST` | Yes | Mail relay hostname |
//! | `OPTOUT_SMTP_PORT` | No | Relay port (default: 587) |
//! | `OPTOUT_SMTP_SENDER` | Yes | Sender address, also the relay login |
//! | `OPTOUT_SMTP_PASSWORD` | Yes | Relay password |
//! | `OPTOUT_REPORT_TO` | Yes | Comma-separated report recipient list |
//! | `OPTOUT_REPORT_WINDOW_HOURS` | No | Lookback for report contents (default: 2) |
//! | `OPTOUT_RETENTION_HOURS` | No | Max record age before pruning (default: 12) |
//! | `OPTOUT_REPORT_INTERVAL_HOURS` | No | Scheduler wake interval (default: 12) |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_PORT: u16 = 5001;
const DEFAULT_STORE_PATH: &str = "unsubscribes.csv";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_REPORT_WINDOW_HOURS: u32 = 2;
const DEFAULT_RETENTION_HOURS: u32 = 12;
const DEFAULT_REPORT_INTERVAL_HOURS: u64 = 12;

/// Errors while assembling configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is absent.
    #[error("missing required config: {0}")]
    MissingVar(&'static str),

    /// A variable is present but unparseable.
    #[error("invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP listener binds on.
    pub listen_port: u16,

    /// Path of the flat-file record store.
    pub store_path: PathBuf,

    /// Outbound mail relay settings.
    pub smtp: SmtpConfig,

    /// Report windows and recipients.
    pub report: ReportConfig,

    /// How often the background scheduler wakes to run a report cycle.
    pub report_interval: Duration,
}

/// Mail relay settings: STARTTLS with password authentication.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub relay_host: String,
    pub relay_port: u16,
    /// Sender address; also used as the relay login name.
    pub sender: String,
    pub password: String,
}

/// Report composition settings.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Recipients of the periodic report.
    pub recipients: Vec<String>,

    /// Records newer than this are included in the next report.
    pub report_window_hours: u32,

    /// Records older than this are pruned after a successful cycle.
    pub retention_hours: u32,
}

impl Config {
    /// Assembles configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_port = parsed_var("OPTOUT_PORT")?.unwrap_or(DEFAULT_PORT);
        let store_path = std::env::var("OPTOUT_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH));

        let smtp = SmtpConfig {
            relay_host: required_var("OPTOUT_SMTP_HOST")?,
            relay_port: parsed_var("OPTOUT_SMTP_PORT")?.unwrap_or(DEFAULT_SMTP_PORT),
            sender: required_var("OPTOUT_SMTP_SENDER")?,
            password: required_var("OPTOUT_SMTP_PASSWORD")?,
        };

        let recipients: Vec<String> = required_var("OPTOUT_REPORT_TO")?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if recipients.is_empty() {
            return Err(ConfigError::MissingVar("OPTOUT_REPORT_TO"));
        }

        let report = ReportConfig {
            recipients,
            report_window_hours: parsed_var("OPTOUT_REPORT_WINDOW_HOURS")?
                .unwrap_or(DEFAULT_REPORT_WINDOW_HOURS),
            retention_hours: parsed_var("OPTOUT_RETENTION_HOURS")?
                .unwrap_or(DEFAULT_RETENTION_HOURS),
        };

        let interval_hours: u64 = parsed_var("OPTOUT_REPORT_INTERVAL_HOURS")?
            .unwrap_or(DEFAULT_REPORT_INTERVAL_HOURS);

        Ok(Config {
            listen_port,
            store_path,
            smtp,
            report,
            report_interval: Duration::from_secs(interval_hours * 3600),
        })
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

fn parsed_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { name, value }),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_config_defaults_are_sane() {
        assert_eq!(DEFAULT_REPORT_WINDOW_HOURS, 2);
        assert_eq!(DEFAULT_RETENTION_HOURS, 12);
        // The report window must not exceed retention, or reported records
        // would already have been pruned.
        assert!(DEFAULT_REPORT_WINDOW_HOURS <= DEFAULT_RETENTION_HOURS);
    }

    // Env-var parsing is deliberately not tested through the process
    // environment: std::env::set_var is unsafe under parallel test threads.
    // The parse helpers are exercised indirectly via their FromStr targets.

    #[test]
    fn parsed_var_absent_is_none() {
        let value: Option<u16> = parsed_var("OPTOUT_TEST_VAR_THAT_DOES_NOT_EXIST").unwrap();
        assert_eq!(value, None);
    }
}
