//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Shared configuration and tracing bootstrap."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use tracing_subscriber::filter::EnvFilter;

use crate::logging::{LogFormat, LogTimestamps};

fn default_platform() -> String {
    "aarch64".to_owned()
}

fn default_supported_manifest_version() -> String {
    "0.1".to_owned()
}

fn default_transaction_timeout() -> Option<Duration> {
    Some(Duration::from_secs(3600))
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("/var/log/edge-addons")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_file_logging() -> bool {
    true
}

/// Primary configuration object for the add-on lifecycle service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "EDGE_ADDON_CONFIG";

    /// Load configuration from disk, respecting the `EDGE_ADDON_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.lifecycle.validate()?;
        self.logging.validate()
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Settings consumed by the lifecycle core.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Platform identifier of this device, matched against manifest platform lists.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// The one manifest schema version accepted for installs and updates.
    #[serde(default = "default_supported_manifest_version")]
    pub supported_manifest_version: String,
    /// Upper bound on the lifetime of a single lifecycle transaction.
    #[serde(default = "default_transaction_timeout")]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub transaction_timeout: Option<Duration>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            supported_manifest_version: default_supported_manifest_version(),
            transaction_timeout: default_transaction_timeout(),
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.platform.trim().is_empty() {
            return Err(anyhow!("lifecycle.platform must not be empty"));
        }
        if self.supported_manifest_version.trim().is_empty() {
            return Err(anyhow!(
                "lifecycle.supported_manifest_version must not be empty"
            ));
        }
        if self.transaction_timeout == Some(Duration::ZERO) {
            return Err(anyhow!(
                "lifecycle.transaction_timeout must be positive when set"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Filter used when neither `EDGE_ADDON_LOG` nor `RUST_LOG` is set.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub timestamps: LogTimestamps,
    /// Keep the daily rolling file next to stdout.
    #[serde(default = "default_file_logging")]
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            level: default_log_level(),
            timestamps: LogTimestamps::default(),
            file: default_file_logging(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        EnvFilter::try_new(&self.level)
            .map_err(|err| anyhow!("logging.level {:?} is not a valid filter: {err}", self.level))?;
        Ok(())
    }
}
