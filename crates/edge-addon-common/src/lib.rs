//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Shared configuration and tracing bootstrap."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Shared primitives for the add-on lifecycle workspace.
//! This crate exposes configuration loading and the tracing subscriber
//! bootstrap consumed by the lifecycle core and its hosts.

pub mod config;
pub mod logging;

pub use config::{AppConfig, LifecycleConfig, LoadedAppConfig, LoggingConfig};
pub use logging::{init_tracing, LogFormat, LogTimestamps};
