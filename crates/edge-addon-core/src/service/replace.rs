//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on lifecycle transactions and orchestration."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use edge_addon_logging::{addon_info, LogContext};

use super::Service;
use crate::checks::{check_manifest_version, ensure_not_protected, validate_capabilities};
use crate::compose::render_compose;
use crate::error::Result;
use crate::manifest::Settings;
use crate::ports::InstalledAddOn;
use crate::tx::{Operation, Tx};

impl Service {
    /// Reconfigure `name` when `version` is already installed, otherwise move
    /// it to `version`. Lower versions are not refused here.
    pub(crate) async fn replace_add_on(
        &self,
        tx: &Tx,
        name: &str,
        version: &str,
        settings: Option<Settings>,
    ) -> Result<()> {
        ensure_not_protected(name)?;
        let installed = self.collaborators.catalogue.get_add_on(name).await?;
        if installed.version == version {
            self.configure(tx, name, installed, settings).await
        } else {
            self.update(tx, name, installed, version, settings).await
        }
    }

    async fn configure(
        &self,
        tx: &Tx,
        name: &str,
        installed: InstalledAddOn,
        settings: Option<Settings>,
    ) -> Result<()> {
        tx.set_affected(name, &installed.title, Operation::Configuring);
        let tx_id = tx.id().to_string();
        let log = LogContext::new()
            .with_add_on(name)
            .with_operation(Operation::Configuring.as_str())
            .with_tx(&tx_id);

        let mut manifest = installed.manifest;
        if let Some(settings) = settings {
            manifest.settings = settings;
        }
        self.adapt_manifest(&mut manifest).await?;
        let compose = render_compose(&manifest)?;

        tx.subscribe_rollback_hook(self.delete_stack_hook(name, &manifest))?;
        let runtime = &self.collaborators.runtime;
        runtime.delete_add_on_stack(name).await?;
        runtime.create_stack_with_docker_compose(name, &compose).await?;

        addon_info!(context = log, "recreated stack for version {}", installed.version);
        Ok(())
    }

    async fn update(
        &self,
        tx: &Tx,
        name: &str,
        installed: InstalledAddOn,
        version: &str,
        settings: Option<Settings>,
    ) -> Result<()> {
        tx.set_affected(name, &installed.title, Operation::Updating);
        let tx_id = tx.id().to_string();
        let log = LogContext::new()
            .with_add_on(name)
            .with_operation(Operation::Updating.as_str())
            .with_tx(&tx_id);
        let collab = &self.collaborators;

        let target = collab.catalogue.fetch_manifest(name, version).await?;
        check_manifest_version(&target, &self.supported_manifest_version)?;
        validate_capabilities(&self.platform, &target, collab.host.as_ref()).await?;
        let settings = match settings {
            Some(settings) => settings,
            None => {
                let deployed = collab.environment.get_add_on_environment(name).await?;
                target.settings.merged_with_deployed(&deployed)
            }
        };

        // Volumes stay so the reinstall picks up the existing data.
        let current = &installed.manifest;
        collab.runtime.delete_add_on_stack(name).await?;
        collab
            .runtime
            .delete_docker_images(&current.image_references())
            .await?;
        collab.permissions.delete(name).await?;
        self.delete_routes(name, current).await?;
        collab.catalogue.delete_add_on(name).await?;

        addon_info!(context = log, "moving from {} to {}", installed.version, version);
        self.create_add_on(tx, name, version, Some(settings)).await?;

        let stale: Vec<String> = current
            .volume_names()
            .into_iter()
            .filter(|volume| !target.volumes.contains_key(volume))
            .collect();
        if !stale.is_empty() {
            collab.runtime.remove_unused_volumes(name, &stale).await?;
        }
        Ok(())
    }
}
