//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Shared configuration and tracing bootstrap."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Tracing bootstrap for lifecycle hosts.
//!
//! Stdout always receives events. The daily rolling JSON file under
//! `logging.directory` can be switched off for devices whose log partition
//! sits on wear-sensitive flash. Before NTP sync the wall clock of a device
//! can be years off, so timestamps may use process uptime instead.
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::{UtcTime, Uptime};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

/// Filter override taking precedence over `RUST_LOG` and `logging.level`.
pub const LOG_ENV: &str = "EDGE_ADDON_LOG";

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static STDOUT_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Available log formats for the lifecycle service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Clock stamped on every event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogTimestamps {
    /// RFC 3339 wall clock in UTC.
    #[default]
    Utc,
    /// Time since the process started.
    Uptime,
    /// No timestamp, for journald and other collectors that add their own.
    None,
}

/// Resolve the event filter: `EDGE_ADDON_LOG`, then `RUST_LOG`, then
/// `level`. An unparsable override is reported on stderr and skipped.
pub fn resolve_filter(
    override_directive: Option<&str>,
    rust_log: Option<&str>,
    level: &str,
) -> EnvFilter {
    let configured = || EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    if let Some(directive) = override_directive {
        match EnvFilter::try_new(directive) {
            Ok(filter) => return filter,
            Err(err) => eprintln!("invalid {LOG_ENV} directive ({err}); using {level:?}"),
        }
    }
    rust_log
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(configured)
}

/// Name of the rolling log file, before the appender adds its date suffix.
pub fn log_file_name(service_name: &str, config: &LoggingConfig) -> String {
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    format!("{prefix}.log")
}

macro_rules! stamped {
    ($layer:expr, $timestamps:expr) => {
        match $timestamps {
            LogTimestamps::Utc => $layer.with_timer(UtcTime::rfc_3339()).boxed(),
            LogTimestamps::Uptime => $layer.with_timer(Uptime::default()).boxed(),
            LogTimestamps::None => $layer.without_time().boxed(),
        }
    };
}

fn file_writer(service_name: &str, config: &LoggingConfig) -> Result<NonBlocking> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "unable to create log directory {}",
            config.directory.display()
        )
    })?;
    let appender = daily(&config.directory, log_file_name(service_name, config));
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    Ok(writer)
}

/// Install the global subscriber described by `config`.
///
/// Calling this more than once keeps the first subscriber.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    let file_writer = if config.file {
        Some(file_writer(service_name, config)?)
    } else {
        None
    };
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let _ = STDOUT_GUARD.set(stdout_guard);

    let filter = resolve_filter(
        std::env::var(LOG_ENV).ok().as_deref(),
        std::env::var("RUST_LOG").ok().as_deref(),
        &config.level,
    );

    let stdout_layer = match config.format {
        LogFormat::StructuredJson => stamped!(
            fmt::layer()
                .with_target(false)
                .json()
                .with_writer(stdout_writer),
            config.timestamps
        ),
        LogFormat::Pretty => stamped!(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(stdout_writer),
            config.timestamps
        ),
    };

    let file_layer = file_writer.map(|writer| {
        stamped!(
            fmt::layer().with_target(true).json().with_writer(writer),
            config.timestamps
        )
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .ok();

    info!(
        service = %service_name,
        file = config.file,
        log_dir = %config.directory.display(),
        format = ?config.format,
        timestamps = ?config.timestamps,
        "tracing initialised"
    );
    Ok(())
}
