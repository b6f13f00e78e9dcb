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
use crate::checks::ensure_not_protected;
use crate::error::Result;
use crate::tx::{Operation, Tx};

impl Service {
    /// Remove `name` with all of its resources, volumes included.
    ///
    /// No compensating hooks are registered.
    pub(crate) async fn delete_add_on(&self, tx: &Tx, name: &str) -> Result<()> {
        ensure_not_protected(name)?;
        let collab = &self.collaborators;
        let installed = collab.catalogue.get_add_on(name).await?;
        tx.set_affected(name, &installed.title, Operation::Deleting);

        let tx_id = tx.id().to_string();
        let log = LogContext::new()
            .with_add_on(name)
            .with_operation(Operation::Deleting.as_str())
            .with_tx(&tx_id);
        let manifest = &installed.manifest;

        collab.runtime.delete_add_on_stack(name).await?;
        collab
            .runtime
            .delete_docker_images(&manifest.image_references())
            .await?;
        collab
            .runtime
            .remove_unused_volumes(name, &manifest.volume_names())
            .await?;
        self.delete_routes(name, manifest).await?;
        collab.permissions.delete(name).await?;
        collab.catalogue.delete_add_on(name).await?;

        addon_info!(context = log, "removed version {}", installed.version);
        Ok(())
    }
}
