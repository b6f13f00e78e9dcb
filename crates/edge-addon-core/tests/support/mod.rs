//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "integration-tests"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "In-memory recording backends for lifecycle tests."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use edge_addon_common::LifecycleConfig;
use edge_addon_core::{
    Catalogue, Collaborators, ContainerRuntime, DockerImage, EnvironmentResolver, HostFacts,
    HostUser, HttpSpec, InstalledAddOn, LifecycleError, Manifest, ManifestValidator, MapSpec,
    Permission, PermissionStore, PulledAddOn, Result, ReverseProxy, Service,
};
use parking_lot::Mutex;
use serde_json::json;

/// Call journal shared by every fake, plus the set of operations told to fail.
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl Recorder {
    fn record(&self, op: &str, detail: impl Into<String>) -> Result<()> {
        self.calls.lock().push(format!("{op}:{}", detail.into()));
        if self.failing.lock().contains(op) {
            return Err(anyhow!("{op} failed").into());
        }
        Ok(())
    }
}

/// Manifest of a small single service add-on.
///
/// Volumes whose name starts with `public` use the `local-public` driver.
pub fn manifest(name: &str, version: &str, volumes: &[&str]) -> Manifest {
    let mounts: Vec<String> = volumes.iter().map(|v| format!("{v}:/data/{v}")).collect();
    let declared: serde_json::Map<String, serde_json::Value> = volumes
        .iter()
        .map(|v| {
            let spec = if v.starts_with("public") {
                json!({"driver": "local-public"})
            } else {
                json!({})
            };
            (v.to_string(), spec)
        })
        .collect();
    serde_json::from_value(json!({
        "manifestVersion": "0.1",
        "name": name,
        "title": format!("{name} title"),
        "version": version,
        "platform": ["aarch64"],
        "services": {
            "app": {
                "image": format!("registry.local/{name}:{version}"),
                "volumes": mounts
            }
        },
        "volumes": declared,
        "publish": {
            "ui": {"from": format!("/{name}"), "to": "http://app:8080"}
        },
        "permissions": [format!("{name}.rw")],
        "settings": {
            "environmentVariables": [
                {"name": "LOG_LEVEL", "value": "info"},
                {"name": "THEME", "value": "light"}
            ]
        }
    }))
    .unwrap()
}

#[derive(Default)]
pub struct FakeCatalogue {
    recorder: Arc<Recorder>,
    installed: Mutex<HashMap<String, InstalledAddOn>>,
    registry: Mutex<HashMap<(String, String), Manifest>>,
    install_size: Mutex<u64>,
}

impl FakeCatalogue {
    pub fn publish(&self, manifest: Manifest) {
        self.registry
            .lock()
            .insert((manifest.name.clone(), manifest.version.clone()), manifest);
    }

    pub fn install(&self, manifest: Manifest) {
        self.installed.lock().insert(
            manifest.name.clone(),
            InstalledAddOn {
                name: manifest.name.clone(),
                title: manifest.title.clone(),
                version: manifest.version.clone(),
                manifest,
            },
        );
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.lock().contains_key(name)
    }

    pub fn installed_version(&self, name: &str) -> Option<String> {
        self.installed.lock().get(name).map(|a| a.version.clone())
    }

    fn published(&self, name: &str, version: &str) -> Result<Manifest> {
        self.registry
            .lock()
            .get(&(name.to_owned(), version.to_owned()))
            .cloned()
            .ok_or_else(|| anyhow!("{name}@{version} is not published").into())
    }
}

#[async_trait]
impl Catalogue for FakeCatalogue {
    async fn pull_add_on(&self, name: &str, version: &str) -> Result<PulledAddOn> {
        self.recorder.record("catalogue.pull", format!("{name}@{version}"))?;
        let manifest = self.published(name, version)?;
        self.install(manifest.clone());
        let docker_images = manifest
            .image_references()
            .into_iter()
            .map(|reference| DockerImage {
                path: PathBuf::from(format!("/var/cache/addons/{name}.tar")),
                reference,
            })
            .collect();
        Ok(PulledAddOn {
            manifest,
            docker_images,
            estimated_install_size: *self.install_size.lock(),
        })
    }

    async fn delete_add_on(&self, name: &str) -> Result<()> {
        self.recorder.record("catalogue.delete", name)?;
        self.installed.lock().remove(name);
        Ok(())
    }

    async fn get_add_on(&self, name: &str) -> Result<InstalledAddOn> {
        self.installed
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| LifecycleError::AddOnNotFound(name.to_owned()))
    }

    async fn get_add_ons(&self) -> Result<Vec<InstalledAddOn>> {
        let mut all: Vec<InstalledAddOn> = self.installed.lock().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn fetch_manifest(&self, name: &str, version: &str) -> Result<Manifest> {
        self.recorder.record("catalogue.fetch", format!("{name}@{version}"))?;
        self.published(name, version)
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .registry
            .lock()
            .keys()
            .filter(|(candidate, _)| candidate == name)
            .map(|(_, version)| version.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct FakeRuntime {
    recorder: Arc<Recorder>,
    last_compose: Mutex<Option<String>>,
}

impl FakeRuntime {
    pub fn last_compose(&self) -> Option<String> {
        self.last_compose.lock().clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn import_docker_image(&self, image: &DockerImage) -> Result<()> {
        self.recorder.record("runtime.import", image.reference.as_str())
    }

    async fn create_stack_with_docker_compose(&self, name: &str, compose: &str) -> Result<()> {
        self.recorder.record("runtime.create_stack", name)?;
        *self.last_compose.lock() = Some(compose.to_owned());
        Ok(())
    }

    async fn delete_add_on_stack(&self, name: &str) -> Result<()> {
        self.recorder.record("runtime.delete_stack", name)
    }

    async fn delete_docker_images(&self, references: &[String]) -> Result<()> {
        self.recorder.record("runtime.delete_images", references.join(","))
    }

    async fn remove_unused_volumes(&self, name: &str, volumes: &[String]) -> Result<()> {
        self.recorder
            .record("runtime.remove_volumes", format!("{name}:{}", volumes.join(",")))
    }
}

#[derive(Default)]
pub struct FakeProxy {
    recorder: Arc<Recorder>,
    routes: Mutex<HashMap<String, (MapSpec, HttpSpec)>>,
}

impl FakeProxy {
    pub fn route(&self, id: &str) -> Option<(MapSpec, HttpSpec)> {
        self.routes.lock().get(id).cloned()
    }
}

#[async_trait]
impl ReverseProxy for FakeProxy {
    async fn create(&self, route_id: &str, map: &MapSpec, http: &HttpSpec) -> Result<()> {
        self.recorder.record("proxy.create", route_id)?;
        self.routes
            .lock()
            .insert(route_id.to_owned(), (map.clone(), http.clone()));
        Ok(())
    }

    async fn delete(&self, route_id: &str) -> Result<()> {
        self.recorder.record("proxy.delete", route_id)?;
        self.routes.lock().remove(route_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePermissions {
    recorder: Arc<Recorder>,
    entries: Mutex<HashMap<String, Permission>>,
}

impl FakePermissions {
    pub fn entry(&self, id: &str) -> Option<Permission> {
        self.entries.lock().get(id).cloned()
    }
}

#[async_trait]
impl PermissionStore for FakePermissions {
    async fn create(&self, permission: &Permission) -> Result<()> {
        self.recorder.record("permissions.create", permission.id.as_str())?;
        self.entries
            .lock()
            .insert(permission.id.clone(), permission.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.recorder.record("permissions.delete", id)?;
        self.entries.lock().remove(id);
        Ok(())
    }
}

pub struct FakeHost {
    recorder: Arc<Recorder>,
    ssh_root_access: Mutex<bool>,
    available_space: Mutex<u64>,
}

#[async_trait]
impl HostFacts for FakeHost {
    async fn is_ssh_root_access_enabled(&self) -> Result<bool> {
        Ok(*self.ssh_root_access.lock())
    }

    async fn lookup_admin_user(&self) -> Result<HostUser> {
        self.recorder.record("host.admin_user", "")?;
        Ok(HostUser {
            name: "admin".into(),
            uid: 1000,
            gid: 1001,
        })
    }

    async fn available_space_in_bytes(&self) -> Result<u64> {
        Ok(*self.available_space.lock())
    }
}

#[derive(Default)]
pub struct FakeValidator {
    recorder: Arc<Recorder>,
}

#[async_trait]
impl ManifestValidator for FakeValidator {
    async fn validate(&self, manifest: &Manifest) -> Result<()> {
        self.recorder.record("validator.validate", manifest.name.as_str())
    }
}

#[derive(Default)]
pub struct FakeEnvironment {
    recorder: Arc<Recorder>,
    deployed: Mutex<HashMap<String, HashMap<String, String>>>,
}

#[async_trait]
impl EnvironmentResolver for FakeEnvironment {
    async fn get_add_on_environment(&self, name: &str) -> Result<HashMap<String, String>> {
        self.recorder.record("environment.get", name)?;
        Ok(self.deployed.lock().get(name).cloned().unwrap_or_default())
    }
}

/// One recording fake per port, all writing to the same journal.
pub struct Fakes {
    pub recorder: Arc<Recorder>,
    pub catalogue: Arc<FakeCatalogue>,
    pub runtime: Arc<FakeRuntime>,
    pub proxy: Arc<FakeProxy>,
    pub permissions: Arc<FakePermissions>,
    pub host: Arc<FakeHost>,
    pub validator: Arc<FakeValidator>,
    pub environment: Arc<FakeEnvironment>,
}

impl Fakes {
    pub fn new() -> Self {
        let recorder = Arc::new(Recorder::default());
        Self {
            catalogue: Arc::new(FakeCatalogue {
                recorder: recorder.clone(),
                install_size: Mutex::new(1024),
                ..Default::default()
            }),
            runtime: Arc::new(FakeRuntime {
                recorder: recorder.clone(),
                ..Default::default()
            }),
            proxy: Arc::new(FakeProxy {
                recorder: recorder.clone(),
                ..Default::default()
            }),
            permissions: Arc::new(FakePermissions {
                recorder: recorder.clone(),
                ..Default::default()
            }),
            host: Arc::new(FakeHost {
                recorder: recorder.clone(),
                ssh_root_access: Mutex::new(true),
                available_space: Mutex::new(1 << 30),
            }),
            validator: Arc::new(FakeValidator {
                recorder: recorder.clone(),
            }),
            environment: Arc::new(FakeEnvironment {
                recorder: recorder.clone(),
                ..Default::default()
            }),
            recorder,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            catalogue: self.catalogue.clone(),
            runtime: self.runtime.clone(),
            proxy: self.proxy.clone(),
            permissions: self.permissions.clone(),
            host: self.host.clone(),
            validator: self.validator.clone(),
            environment: self.environment.clone(),
        }
    }

    pub fn service(&self) -> Arc<Service> {
        Service::shared(&LifecycleConfig::default(), self.collaborators())
    }

    /// Journal entries in call order.
    pub fn calls(&self) -> Vec<String> {
        self.recorder.calls.lock().clone()
    }

    /// Journal entries whose operation starts with any of `prefixes`.
    pub fn calls_to(&self, prefixes: &[&str]) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| prefixes.iter().any(|prefix| call.starts_with(prefix)))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.recorder.calls.lock().clear();
    }

    pub fn fail_on(&self, op: &str) {
        self.recorder.failing.lock().insert(op.to_owned());
    }

    pub fn set_available_space(&self, bytes: u64) {
        *self.host.available_space.lock() = bytes;
    }

    pub fn set_install_size(&self, bytes: u64) {
        *self.catalogue.install_size.lock() = bytes;
    }

    pub fn set_ssh_root_access(&self, enabled: bool) {
        *self.host.ssh_root_access.lock() = enabled;
    }

    pub fn set_deployed_environment(&self, name: &str, values: &[(&str, &str)]) {
        self.environment.deployed.lock().insert(
            name.to_owned(),
            values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }
}
