//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on lifecycle transactions and orchestration."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Lifecycle routines run through a [`Tx`](crate::Tx).
//!
//! Install registers one compensating hook right before each side effect, so
//! a rollback undoes exactly what happened, newest first. Delete and the
//! teardown half of an update register no hooks; a failure there leaves the
//! remaining resources in place.
use std::sync::Arc;

use edge_addon_common::LifecycleConfig;
use edge_addon_versioning::{is_upgrade, latest_version};
use tracing::debug;

use crate::compose::adapt_for_host;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::ports::{route_id, Collaborators, HttpSpec, InstalledAddOn, MapSpec};
use crate::tx::{rollback_hook, RollbackHook};

mod create;
mod delete;
mod replace;

/// Lifecycle orchestration over the device backends.
#[derive(Debug)]
pub struct Service {
    platform: String,
    supported_manifest_version: String,
    collaborators: Collaborators,
}

impl Service {
    pub fn new(config: &LifecycleConfig, collaborators: Collaborators) -> Self {
        Self {
            platform: config.platform.clone(),
            supported_manifest_version: config.supported_manifest_version.clone(),
            collaborators,
        }
    }

    /// Shared handle, as [`Tx::begin`](crate::Tx::begin) expects it.
    pub fn shared(config: &LifecycleConfig, collaborators: Collaborators) -> Arc<Self> {
        Arc::new(Self::new(config, collaborators))
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn supported_manifest_version(&self) -> &str {
        &self.supported_manifest_version
    }

    /// Every add-on recorded in the local catalogue.
    pub async fn installed_add_ons(&self) -> Result<Vec<InstalledAddOn>> {
        self.collaborators.catalogue.get_add_ons().await
    }

    /// Newest published version of `name` if it is an upgrade over the
    /// installed one.
    pub async fn available_update(&self, name: &str) -> Result<Option<String>> {
        let installed = self.collaborators.catalogue.get_add_on(name).await?;
        let versions = self.collaborators.catalogue.list_versions(name).await?;
        let candidate = latest_version(versions.as_slice())
            .filter(|latest| is_upgrade(&installed.version, latest))
            .map(str::to_owned);
        debug!(add_on = name, installed = %installed.version, candidate = ?candidate, "checked for update");
        Ok(candidate)
    }

    /// Run the admin lookup only when a service needs it.
    async fn adapt_manifest(&self, manifest: &mut Manifest) -> Result<()> {
        if manifest.uses_local_public_volume() {
            let admin = self.collaborators.host.lookup_admin_user().await?;
            adapt_for_host(manifest, &admin);
        }
        Ok(())
    }

    async fn create_routes(&self, name: &str, manifest: &Manifest) -> Result<()> {
        for (key, publish) in &manifest.publish {
            let id = route_id(name, key);
            self.collaborators
                .proxy
                .create(&id, &MapSpec::from(publish), &HttpSpec::from(publish))
                .await?;
        }
        Ok(())
    }

    async fn delete_routes(&self, name: &str, manifest: &Manifest) -> Result<()> {
        delete_routes(&self.collaborators, &route_ids(name, manifest)).await
    }

    /// Hook that tears the stack down and prunes every manifest volume.
    fn delete_stack_hook(&self, name: &str, manifest: &Manifest) -> RollbackHook {
        let collaborators = self.collaborators.clone();
        let name = name.to_owned();
        let volumes = manifest.volume_names();
        rollback_hook(move || async move {
            collaborators.runtime.delete_add_on_stack(&name).await?;
            collaborators
                .runtime
                .remove_unused_volumes(&name, &volumes)
                .await
        })
    }
}

fn route_ids(name: &str, manifest: &Manifest) -> Vec<String> {
    manifest
        .publish
        .keys()
        .map(|key| route_id(name, key))
        .collect()
}

async fn delete_routes(collaborators: &Collaborators, ids: &[String]) -> Result<()> {
    for id in ids {
        collaborators.proxy.delete(id).await?;
    }
    Ok(())
}
