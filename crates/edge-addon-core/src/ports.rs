//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on lifecycle transactions and orchestration."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Backends the lifecycle routines drive. None of them takes part in a shared
//! transaction; compensation is the routine's job.
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::manifest::{Manifest, PublishSpec};

/// Image archive delivered with a pulled add-on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerImage {
    pub reference: String,
    pub path: PathBuf,
}

/// Result of pulling an add-on into the local catalogue.
#[derive(Debug, Clone)]
pub struct PulledAddOn {
    pub manifest: Manifest,
    pub docker_images: Vec<DockerImage>,
    /// Bytes the install is expected to occupy once images are imported.
    pub estimated_install_size: u64,
}

/// Catalogue entry of an installed add-on.
#[derive(Debug, Clone)]
pub struct InstalledAddOn {
    pub name: String,
    pub title: String,
    pub version: String,
    pub manifest: Manifest,
}

/// Reverse proxy location mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSpec {
    pub from: String,
    pub to: String,
}

/// Reverse proxy HTTP behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HttpSpec {
    pub websocket: bool,
}

impl From<&PublishSpec> for MapSpec {
    fn from(spec: &PublishSpec) -> Self {
        Self {
            from: spec.from.clone(),
            to: spec.to.clone(),
        }
    }
}

impl From<&PublishSpec> for HttpSpec {
    fn from(spec: &PublishSpec) -> Self {
        Self {
            websocket: spec.websocket,
        }
    }
}

/// Permission store entry owned by one add-on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    pub title: String,
    pub scopes: Vec<String>,
}

impl Permission {
    pub fn for_manifest(manifest: &Manifest) -> Self {
        Self {
            id: manifest.name.clone(),
            title: manifest.title.clone(),
            scopes: manifest.permissions.clone(),
        }
    }
}

/// Device administrator account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostUser {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
}

impl fmt::Display for HostUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

/// Local record of installed add-ons and the registry behind it.
#[async_trait]
pub trait Catalogue: Send + Sync {
    /// Pull manifest and images of `name@version` into the catalogue.
    async fn pull_add_on(&self, name: &str, version: &str) -> Result<PulledAddOn>;

    async fn delete_add_on(&self, name: &str) -> Result<()>;

    /// Fails with [`crate::LifecycleError::AddOnNotFound`] when absent.
    async fn get_add_on(&self, name: &str) -> Result<InstalledAddOn>;

    async fn get_add_ons(&self) -> Result<Vec<InstalledAddOn>>;

    /// Manifest of `name@version` without pulling images.
    async fn fetch_manifest(&self, name: &str, version: &str) -> Result<Manifest>;

    /// Versions published for `name`.
    async fn list_versions(&self, name: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn import_docker_image(&self, image: &DockerImage) -> Result<()>;

    async fn create_stack_with_docker_compose(&self, name: &str, compose: &str) -> Result<()>;

    async fn delete_add_on_stack(&self, name: &str) -> Result<()>;

    async fn delete_docker_images(&self, references: &[String]) -> Result<()>;

    /// Remove the listed volumes of stack `name` that no container uses.
    async fn remove_unused_volumes(&self, name: &str, volumes: &[String]) -> Result<()>;
}

#[async_trait]
pub trait ReverseProxy: Send + Sync {
    async fn create(&self, route_id: &str, map: &MapSpec, http: &HttpSpec) -> Result<()>;

    async fn delete(&self, route_id: &str) -> Result<()>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn create(&self, permission: &Permission) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Facts about the device the add-on is installed on.
#[async_trait]
pub trait HostFacts: Send + Sync {
    async fn is_ssh_root_access_enabled(&self) -> Result<bool>;

    async fn lookup_admin_user(&self) -> Result<HostUser>;

    async fn available_space_in_bytes(&self) -> Result<u64>;
}

/// Schema validation of manifests.
#[async_trait]
pub trait ManifestValidator: Send + Sync {
    async fn validate(&self, manifest: &Manifest) -> Result<()>;
}

/// Environment an installed add-on currently runs with.
#[async_trait]
pub trait EnvironmentResolver: Send + Sync {
    async fn get_add_on_environment(&self, name: &str) -> Result<HashMap<String, String>>;
}

/// Every backend a [`crate::Service`] needs.
#[derive(Clone)]
pub struct Collaborators {
    pub catalogue: Arc<dyn Catalogue>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub proxy: Arc<dyn ReverseProxy>,
    pub permissions: Arc<dyn PermissionStore>,
    pub host: Arc<dyn HostFacts>,
    pub validator: Arc<dyn ManifestValidator>,
    pub environment: Arc<dyn EnvironmentResolver>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Proxy route identifier of publish entry `key` of add-on `name`.
pub fn route_id(name: &str, key: &str) -> String {
    format!("{name}-{key}")
}
