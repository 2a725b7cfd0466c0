use std::{env, path::PathBuf, time::Duration};

use anyhow::Context;
use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::fs::canonicalize;

use crate::error::{EsdError, EsdResult};
use crate::util::backoff::RetryConfig;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl ObservabilityConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// The controller crates log at the configured level, the client stack
    /// stays at warn.
    pub fn filter_directive(&self) -> String {
        let level = &self.log_level;
        format!("warn,esdomain={level},esd_common={level},esd_operator={level},esd_cli={level}")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetrySettings {
    fn validate(&self, section: &str) -> EsdResult {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(invalid(format!(
                "{section}.multiplier must be a finite number >= 1, got {}",
                self.multiplier
            )));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(invalid(format!(
                "{section}.max_delay_ms ({}) is below initial_delay_ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }
        Ok(())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        RetryConfig {
            max_attempts: settings.max_attempts,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_multiplier: settings.multiplier,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OperatorSettings {
    /// Watch a single namespace instead of the whole cluster
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default = "default_concurrency")]
    pub concurrency: u16,

    /// How often a processing or deleting domain is polled
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Backoff for provider describe calls inside one reconcile pass
    #[serde(default)]
    pub retry: RetrySettings,

    /// Backoff between failed reconcile passes
    #[serde(default = "default_error_backoff")]
    pub error_backoff: RetrySettings,

    #[serde(default = "default_unknown_error_threshold")]
    pub unknown_error_threshold: u32,

    #[serde(default = "default_status_write_attempts")]
    pub status_write_attempts: u32,

    #[serde(default = "default_create_timeout_secs")]
    pub create_timeout_secs: u64,

    #[serde(default = "default_delete_timeout_secs")]
    pub delete_timeout_secs: u64,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            namespace: None,
            concurrency: default_concurrency(),
            poll_interval_secs: default_poll_interval_secs(),
            retry: RetrySettings::default(),
            error_backoff: default_error_backoff(),
            unknown_error_threshold: default_unknown_error_threshold(),
            status_write_attempts: default_status_write_attempts(),
            create_timeout_secs: default_create_timeout_secs(),
            delete_timeout_secs: default_delete_timeout_secs(),
        }
    }
}

impl OperatorSettings {
    pub fn validate(&self) -> EsdResult {
        if self.poll_interval_secs == 0 {
            return Err(invalid("operator.poll_interval_secs must be greater than 0"));
        }
        if self.concurrency == 0 {
            return Err(invalid("operator.concurrency must be greater than 0"));
        }
        if self.status_write_attempts == 0 {
            return Err(invalid("operator.status_write_attempts must be greater than 0"));
        }
        self.retry.validate("operator.retry")?;
        self.error_backoff.validate("operator.error_backoff")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.create_timeout_secs)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BootstrapSettings {
    #[serde(default = "default_bootstrap_path")]
    pub path: PathBuf,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            path: default_bootstrap_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct Settings {
    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub operator: OperatorSettings,

    #[serde(default)]
    pub bootstrap: BootstrapSettings,
}

impl Settings {
    /// Layered load: the root file (when it is a file), then optional
    /// `config`, `config/default` and `config.<RUN_MODE>` files, then
    /// `ESD__SECTION__KEY` environment variables.
    pub fn from_root(root: Option<PathBuf>) -> EsdResult<Self> {
        let curr_dir = env::current_dir().context("unable to get working directory")?;
        let root = root.unwrap_or(curr_dir);
        let root = canonicalize(root).context("unable to canonicalize root directory")?;

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let mut s = config::Config::builder();
        if root.is_file() {
            s = s.add_source(File::from(root.as_path()));
        } else {
            s = s.add_source(File::from(root.join("config")).required(false));
        }
        let s = s
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config.{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("ESD")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let cfg: Self = s.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> EsdResult {
        self.operator.validate()
    }
}

fn invalid(message: impl Into<String>) -> EsdError {
    EsdError::Config(config::ConfigError::Message(message.into()))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_concurrency() -> u16 {
    4
}

fn default_poll_interval_secs() -> u64 {
    20
}

fn default_error_backoff() -> RetrySettings {
    RetrySettings {
        max_attempts: 0,
        initial_delay_ms: 5_000,
        max_delay_ms: 300_000,
        multiplier: 2.0,
    }
}

fn default_unknown_error_threshold() -> u32 {
    3
}

fn default_status_write_attempts() -> u32 {
    5
}

fn default_create_timeout_secs() -> u64 {
    30 * 60
}

fn default_delete_timeout_secs() -> u64 {
    10 * 60
}

fn default_bootstrap_path() -> PathBuf {
    PathBuf::from("bootstrap.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_fill_missing_sections() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "operator:\n  concurrency: 8").unwrap();

        let settings = Settings::from_root(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(settings.operator.concurrency, 8);
        assert_eq!(settings.operator.poll_interval_secs, 20);
        assert_eq!(settings.operator.unknown_error_threshold, 3);
        assert_eq!(settings.observability, ObservabilityConfig::default());
        assert_eq!(settings.bootstrap.path, PathBuf::from("bootstrap.yaml"));
    }

    #[test]
    fn reads_nested_values() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "observability:\n  log_level: debug\n  format: compact\noperator:\n  poll_interval_secs: 3\n  retry:\n    max_attempts: 2"
        )
        .unwrap();

        let settings = Settings::from_root(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(settings.observability.log_level, "debug");
        assert_eq!(settings.observability.format, LogFormat::Compact);
        assert_eq!(settings.operator.poll_interval(), Duration::from_secs(3));
        assert_eq!(settings.operator.retry.max_attempts, 2);
        assert_eq!(settings.operator.retry.initial_delay_ms, 500);
    }

    #[test]
    fn retry_settings_convert() {
        let retry = RetryConfig::from(&default_error_backoff());
        assert_eq!(retry.max_attempts, 0);
        assert_eq!(retry.initial_delay, Duration::from_secs(5));
        assert_eq!(retry.max_delay, Duration::from_secs(300));
    }

    #[test]
    fn rejects_unusable_backoff() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "operator:\n  retry:\n    multiplier: -2.0").unwrap();

        let err = Settings::from_root(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, EsdError::Config(_)));
        assert!(err.to_string().contains("operator.retry.multiplier"));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let settings = OperatorSettings {
            poll_interval_secs: 0,
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn rejects_inverted_delays() {
        let settings = OperatorSettings {
            error_backoff: RetrySettings {
                initial_delay_ms: 1_000,
                max_delay_ms: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("operator.error_backoff.max_delay_ms"));
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn filter_directive_scopes_crates() {
        let config = ObservabilityConfig::default().with_level("debug");
        let directive = config.filter_directive();
        assert!(directive.starts_with("warn,"));
        assert!(directive.contains("esd_operator=debug"));
    }
}
