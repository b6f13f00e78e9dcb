//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on lifecycle transactions and orchestration."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Volume driver that marks a volume as shared with the device administrator.
pub const LOCAL_PUBLIC_DRIVER: &str = "local-public";

/// Declarative description of an add-on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Schema version of this document.
    pub manifest_version: String,
    pub name: String,
    pub title: String,
    /// Add-on version (`<partner>-<revision>`).
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Platforms the add-on can run on.
    #[serde(default)]
    pub platform: Vec<String>,
    #[serde(default)]
    pub features: Vec<FeatureRequirement>,
    #[serde(default)]
    pub services: IndexMap<String, ServiceSpec>,
    #[serde(default)]
    pub volumes: IndexMap<String, VolumeSpec>,
    /// Routes exposed through the device reverse proxy, keyed by route name.
    #[serde(default)]
    pub publish: IndexMap<String, PublishSpec>,
    /// Permission scopes registered for the add-on.
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub settings: Settings,
}

impl Manifest {
    /// Distinct image references of all services, in declaration order.
    pub fn image_references(&self) -> Vec<String> {
        let mut images: Vec<String> = Vec::with_capacity(self.services.len());
        for service in self.services.values() {
            if !images.contains(&service.image) {
                images.push(service.image.clone());
            }
        }
        images
    }

    /// Names of the declared named volumes.
    pub fn volume_names(&self) -> Vec<String> {
        self.volumes.keys().cloned().collect()
    }

    /// Whether any declared volume uses the `local-public` driver.
    pub fn uses_local_public_volume(&self) -> bool {
        self.volumes.values().any(VolumeSpec::is_local_public)
    }
}

/// Host feature an add-on depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRequirement {
    pub name: String,
    /// Absent means required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl FeatureRequirement {
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    /// Compose style mounts (`name:/path[:mode]` or bind mounts).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub environment: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ServiceSpec {
    /// Named volumes mounted by this service. Bind mounts are skipped.
    pub fn mounted_volumes(&self) -> impl Iterator<Item = &str> {
        self.volumes.iter().filter_map(|mount| {
            let source = mount.split(':').next().unwrap_or_default();
            let is_bind = source.starts_with('/') || source.starts_with('.') || source.starts_with('~');
            (!source.is_empty() && !is_bind).then_some(source)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub driver_opts: IndexMap<String, String>,
}

impl VolumeSpec {
    pub fn is_local_public(&self) -> bool {
        self.driver.as_deref() == Some(LOCAL_PUBLIC_DRIVER)
    }
}

/// One reverse proxy route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishSpec {
    /// Public path on the device, e.g. `/node-red`.
    pub from: String,
    /// Upstream address inside the stack, e.g. `http://node-red:1880`.
    pub to: String,
    #[serde(default)]
    pub websocket: bool,
}

/// User adjustable settings of an add-on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub environment_variables: Vec<EnvironmentVariable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Settings {
    /// Name/value pairs in declaration order.
    pub fn as_environment(&self) -> IndexMap<String, String> {
        self.environment_variables
            .iter()
            .map(|var| (var.name.clone(), var.value.clone()))
            .collect()
    }

    /// Take these settings as defaults and replace each value the add-on
    /// currently runs with. Variables unknown to the defaults are dropped.
    pub fn merged_with_deployed(&self, deployed: &HashMap<String, String>) -> Settings {
        let environment_variables = self
            .environment_variables
            .iter()
            .map(|var| match deployed.get(&var.name) {
                Some(value) => EnvironmentVariable {
                    value: value.clone(),
                    ..var.clone()
                },
                None => var.clone(),
            })
            .collect();
        Settings {
            environment_variables,
        }
    }
}
