//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on lifecycle transactions and orchestration."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Transactional add-on lifecycle management for the device.
//!
//! A caller takes a [`Tx`] from the [`TransactionScheduler`], runs exactly one
//! routine on it and then commits or rolls back. Cancelling the transaction
//! context rolls back as well.

pub mod checks;
pub mod compose;
pub mod context;
pub mod error;
pub mod manifest;
pub mod ports;
pub mod scheduler;
pub mod service;
pub mod tx;

pub use context::{ContextError, TxContext};
pub use error::{ErrorCode, LifecycleError, Result};
pub use manifest::{Manifest, Settings};
pub use ports::{
    Catalogue, Collaborators, ContainerRuntime, DockerImage, EnvironmentResolver, HostFacts,
    HostUser, HttpSpec, InstalledAddOn, ManifestValidator, MapSpec, Permission, PermissionStore,
    PulledAddOn, ReverseProxy,
};
pub use scheduler::TransactionScheduler;
pub use service::Service;
pub use tx::{rollback_hook, AffectedAddOn, Operation, RollbackHook, Tx};
