//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on lifecycle transactions and orchestration."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use std::sync::Arc;

use edge_addon_logging::{addon_debug, addon_info, LogContext};

use super::{delete_routes, route_ids, Service};
use crate::checks::{check_disk_space, check_manifest_version, validate_capabilities};
use crate::compose::render_compose;
use crate::error::{LifecycleError, Result};
use crate::manifest::Settings;
use crate::ports::Permission;
use crate::tx::{rollback_hook, Operation, Tx};

impl Service {
    /// Install `name` at `version`.
    ///
    /// Every side effect is preceded by its compensating hook. The routine
    /// stops at the first failing step and leaves rolling back to the caller.
    pub(crate) async fn create_add_on(
        &self,
        tx: &Tx,
        name: &str,
        version: &str,
        settings: Option<Settings>,
    ) -> Result<()> {
        let tx_id = tx.id().to_string();
        let log = LogContext::new()
            .with_add_on(name)
            .with_operation(Operation::Installing.as_str())
            .with_tx(&tx_id);
        let collab = &self.collaborators;

        match collab.catalogue.get_add_on(name).await {
            Ok(_) => return Err(LifecycleError::AddOnAlreadyInstalled(name.to_owned())),
            Err(LifecycleError::AddOnNotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let catalogue = Arc::clone(&collab.catalogue);
        let owned = name.to_owned();
        tx.subscribe_rollback_hook(rollback_hook(move || async move {
            catalogue.delete_add_on(&owned).await
        }))?;

        addon_info!(context = log, "pulling version {}", version);
        let pulled = collab.catalogue.pull_add_on(name, version).await?;
        let available = collab.host.available_space_in_bytes().await?;
        check_disk_space(available, pulled.estimated_install_size)?;

        let mut manifest = pulled.manifest;
        collab.validator.validate(&manifest).await?;
        check_manifest_version(&manifest, &self.supported_manifest_version)?;
        tx.set_affected(name, &manifest.title, Operation::Installing);
        validate_capabilities(&self.platform, &manifest, collab.host.as_ref()).await?;
        if let Some(settings) = settings {
            manifest.settings = settings;
        }

        let runtime = Arc::clone(&collab.runtime);
        let images = manifest.image_references();
        tx.subscribe_rollback_hook(rollback_hook(move || async move {
            runtime.delete_docker_images(&images).await
        }))?;
        for image in &pulled.docker_images {
            addon_debug!(context = log, "importing image {}", image.reference);
            collab.runtime.import_docker_image(image).await?;
        }

        self.adapt_manifest(&mut manifest).await?;
        let compose = render_compose(&manifest)?;
        tx.subscribe_rollback_hook(self.delete_stack_hook(name, &manifest))?;
        collab
            .runtime
            .create_stack_with_docker_compose(name, &compose)
            .await?;

        let permissions = Arc::clone(&collab.permissions);
        let permission_id = name.to_owned();
        tx.subscribe_rollback_hook(rollback_hook(move || async move {
            permissions.delete(&permission_id).await
        }))?;
        let mut permission = Permission::for_manifest(&manifest);
        permission.id = name.to_owned();
        collab.permissions.create(&permission).await?;

        let proxy_collab = collab.clone();
        let routes = route_ids(name, &manifest);
        tx.subscribe_rollback_hook(rollback_hook(move || async move {
            delete_routes(&proxy_collab, &routes).await
        }))?;
        self.create_routes(name, &manifest).await?;

        addon_info!(context = log, "installed version {}", manifest.version);
        Ok(())
    }
}
