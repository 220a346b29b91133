use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::FieldRejection;
use crate::monitoring::runtime::{DEFAULT_DIAGNOSTIC_TARGET, DEFAULT_SAMPLE_INTERVAL_SECONDS, RuntimeConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    ReadFailed(#[source] io::Error),
    #[error("failed to write config: {0}")]
    WriteFailed(#[source] io::Error),
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config path available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
    #[error("invalid {section} settings: {}", format_rejections(.rejected))]
    Invalid { section: &'static str, rejected: Vec<FieldRejection> },
}

fn format_rejections(rejected: &[FieldRejection]) -> String {
    rejected.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub monitor: MonitorSection,
    pub probe: ProbeSection,
    pub diagnostics: DiagnosticsSection,
    pub retention: RetentionSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: String,
    pub pool_size: usize,
}

/// Initial runtime settings plus the fixed recovery cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub sample_interval_seconds: u64,
    pub diagnostic_target: String,
    pub test_mode: bool,
    pub recovery_backoff_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSection {
    pub latency_url: String,
    pub download_url: String,
    pub upload_url: String,
    pub download_bytes: u64,
    pub upload_bytes: u64,
    pub latency_samples: u32,
    pub timeout_seconds: u64,
    /// Share of simulated attempts that fail while test mode is on
    pub simulated_failure_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSection {
    pub ping_count: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSection {
    pub log_days: i64,
    pub sweep_interval_seconds: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 5000 }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self { path: "linkwatch.db".into(), pool_size: 8 }
    }
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            sample_interval_seconds: DEFAULT_SAMPLE_INTERVAL_SECONDS,
            diagnostic_target: DEFAULT_DIAGNOSTIC_TARGET.into(),
            test_mode: false,
            recovery_backoff_seconds: 60,
        }
    }
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            latency_url: "https://speed.cloudflare.com/__down".into(),
            download_url: "https://speed.cloudflare.com/__down".into(),
            upload_url: "https://speed.cloudflare.com/__up".into(),
            download_bytes: 25_000_000,
            upload_bytes: 10_000_000,
            latency_samples: 5,
            timeout_seconds: 60,
            simulated_failure_rate: 0.0,
        }
    }
}

impl Default for DiagnosticsSection {
    fn default() -> Self {
        Self { ping_count: 4, timeout_seconds: 60 }
    }
}

impl Default for RetentionSection {
    fn default() -> Self {
        Self { log_days: 30, sweep_interval_seconds: 3600 }
    }
}

impl MonitorSection {
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            sample_interval_seconds: self.sample_interval_seconds,
            diagnostic_target: self.diagnostic_target.clone(),
            test_mode: self.test_mode,
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/linkwatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("linkwatch/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Server")?;
        write_1(f, "Bind Address", &self.server.bind)?;
        write_1(f, "Port", &self.server.port)?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;
        write_1(f, "Pool Size", &self.database.pool_size)?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Sample Interval (s)", &self.monitor.sample_interval_seconds)?;
        write_1(f, "Diagnostic Target", &self.monitor.diagnostic_target)?;
        write_1(f, "Test Mode", &self.monitor.test_mode)?;
        write_1(f, "Recovery Backoff (s)", &self.monitor.recovery_backoff_seconds)?;
        write_title_1(f, "Probe")?;
        write_1(f, "Latency URL", &self.probe.latency_url)?;
        write_1(f, "Download URL", &self.probe.download_url)?;
        write_1(f, "Upload URL", &self.probe.upload_url)?;
        write_1(f, "Timeout (s)", &self.probe.timeout_seconds)?;
        write_title_1(f, "Retention")?;
        write_1(f, "Log Days", &self.retention.log_days)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/linkwatch/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,no_run
    /// # use linkwatch_service::config::Config;
    /// let cfg = Config::from_config(None::<&std::path::Path>)?;
    /// println!("{}", cfg);
    /// # Ok::<(), linkwatch_service::config::ConfigError>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config: Self = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(ConfigError::ReadFailed)?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        std::fs::write(path, config_str).map_err(ConfigError::WriteFailed)
    }

    /// Checks the settings that aren't covered by the runtime update rules
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut rejected = Vec::new();

        for (field, url) in [
            ("latency_url", &self.probe.latency_url),
            ("download_url", &self.probe.download_url),
            ("upload_url", &self.probe.upload_url),
        ] {
            if let Some(reason) = crate::validation::validate_probe_url(url).error {
                rejected.push(FieldRejection::new(field, reason));
            }
        }
        if self.probe.timeout_seconds == 0 {
            rejected.push(FieldRejection::new("timeout_seconds", "Timeout must be at least 1 second"));
        }
        for (field, bytes) in [("download_bytes", self.probe.download_bytes), ("upload_bytes", self.probe.upload_bytes)] {
            if bytes == 0 {
                rejected.push(FieldRejection::new(field, "Transfer size must be at least 1 byte"));
            }
        }
        if !rejected.is_empty() {
            return Err(ConfigError::Invalid { section: "probe", rejected });
        }

        if self.monitor.recovery_backoff_seconds == 0 {
            return Err(ConfigError::Invalid {
                section: "monitor",
                rejected: vec![FieldRejection::new(
                    "recovery_backoff_seconds",
                    "Backoff must be at least 1 second",
                )],
            });
        }

        if self.retention.log_days <= 0 {
            return Err(ConfigError::Invalid {
                section: "retention",
                rejected: vec![FieldRejection::new("log_days", "Log retention must be at least 1 day")],
            });
        }

        Ok(())
    }
}
