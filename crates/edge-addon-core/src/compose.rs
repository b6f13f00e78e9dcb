//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on lifecycle transactions and orchestration."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Manifest to compose specification rendering, plus the host specific
//! adjustments applied beforehand.
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::manifest::Manifest;
use crate::ports::HostUser;

const RENDERED_LOCAL_DRIVER: &str = "local";

#[derive(Debug, Serialize)]
struct ComposeFile<'a> {
    services: IndexMap<&'a str, ComposeService<'a>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    volumes: IndexMap<&'a str, ComposeVolume<'a>>,
}

#[derive(Debug, Serialize)]
struct ComposeService<'a> {
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    restart: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    environment: IndexMap<String, String>,
}

#[derive(Debug, Serialize)]
struct ComposeVolume<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    driver: Option<&'a str>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    driver_opts: IndexMap<String, String>,
}

/// Let every service that mounts a `local-public` volume run as the device
/// administrator so files on the shared volume stay accessible to them.
pub fn adapt_for_host(manifest: &mut Manifest, admin: &HostUser) {
    let public: Vec<String> = manifest
        .volumes
        .iter()
        .filter(|(_, volume)| volume.is_local_public())
        .map(|(name, _)| name.clone())
        .collect();
    if public.is_empty() {
        return;
    }
    for (service_name, service) in manifest.services.iter_mut() {
        let mounts_public = service
            .mounted_volumes()
            .any(|volume| public.iter().any(|name| name == volume));
        if mounts_public {
            debug!(service = %service_name, user = %admin.name, "assigning admin ownership for local-public volume");
            service.user = Some(admin.to_string());
        }
    }
}

/// Render `manifest` into a compose document for the container runtime.
///
/// The manifest settings are exported into every service's environment and
/// take precedence over values the service declares itself.
pub fn render_compose(manifest: &Manifest) -> Result<String> {
    let settings = manifest.settings.as_environment();
    let services = manifest
        .services
        .iter()
        .map(|(name, service)| {
            let mut environment = service.environment.clone();
            environment.extend(settings.iter().map(|(k, v)| (k.clone(), v.clone())));
            let rendered = ComposeService {
                image: &service.image,
                restart: service.restart.as_deref(),
                user: service.user.as_deref(),
                volumes: service.volumes.clone(),
                ports: service.ports.clone(),
                environment,
            };
            (name.as_str(), rendered)
        })
        .collect();
    let volumes = manifest
        .volumes
        .iter()
        .map(|(name, volume)| {
            let driver = if volume.is_local_public() {
                Some(RENDERED_LOCAL_DRIVER)
            } else {
                volume.driver.as_deref()
            };
            let rendered = ComposeVolume {
                driver,
                driver_opts: volume.driver_opts.clone(),
            };
            (name.as_str(), rendered)
        })
        .collect();

    let document = serde_yaml::to_string(&ComposeFile { services, volumes })?;
    Ok(document)
}
