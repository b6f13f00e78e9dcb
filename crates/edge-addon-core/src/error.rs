//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on lifecycle transactions and orchestration."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use thiserror::Error;

use crate::context::ContextError;

/// Result alias used throughout the lifecycle core.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Errors produced by transactions, precondition gates and collaborators.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Operation attempted on a committed or rolled back transaction.
    #[error("transaction has already been committed or rolled back")]
    TxDone,
    /// A second transaction was requested while one is still open.
    #[error("a lifecycle transaction is already open")]
    TxAlreadyOpen,
    /// A transaction was opened outside of a Tokio runtime.
    #[error("no async runtime available to supervise the transaction")]
    NoRuntime,
    /// The transaction context was cancelled.
    #[error("transaction context cancelled")]
    Cancelled,
    /// The transaction outlived its deadline.
    #[error("transaction deadline exceeded")]
    DeadlineExceeded,
    /// Install requested for an add-on the catalogue already holds.
    #[error("add-on {0} is already installed")]
    AddOnAlreadyInstalled(String),
    /// Catalogue lookup for an unknown add-on.
    #[error("add-on {0} not found")]
    AddOnNotFound(String),
    /// Manifest schema version differs from the supported one.
    #[error("manifest version {found} is not supported (expected {supported})")]
    ManifestVersionUnsupported { found: String, supported: String },
    /// Not enough free space for the estimated install size.
    #[error("insufficient disk space: {available} bytes available, {required} bytes required")]
    InsufficientDiskSpace { available: u64, required: u64 },
    /// Host platform missing from the manifest platform list.
    #[error("platform {platform} is not supported by add-on (supported: {supported})")]
    PlatformUnsupported { platform: String, supported: String },
    /// A required host feature is not available.
    #[error("required feature {0} is not available on this device")]
    FeatureUnavailable(String),
    /// Lifecycle changes to platform-owned add-ons are refused.
    #[error("lifecycle changes to add-on {0} are not supported")]
    ProtectedAddOn(String),
    /// Compose document could not be rendered.
    #[error("failed to render compose specification: {0}")]
    Render(#[from] serde_yaml::Error),
    /// Error returned verbatim by a collaborator.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

/// Transport-facing classification of a [`LifecycleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Permanent platform policy; retrying will never succeed.
    Unimplemented,
    /// Left for the transport layer to classify.
    Unclassified,
}

impl LifecycleError {
    /// Classification used by transport adapters.
    pub fn code(&self) -> ErrorCode {
        match self {
            LifecycleError::ProtectedAddOn(_) => ErrorCode::Unimplemented,
            _ => ErrorCode::Unclassified,
        }
    }

    /// Whether this is the "already finished" transaction error.
    pub fn is_tx_done(&self) -> bool {
        matches!(self, LifecycleError::TxDone)
    }
}

impl From<ContextError> for LifecycleError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => LifecycleError::Cancelled,
            ContextError::DeadlineExceeded => LifecycleError::DeadlineExceeded,
        }
    }
}
