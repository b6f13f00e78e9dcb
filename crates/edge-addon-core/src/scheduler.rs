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
use std::time::Duration;

use edge_addon_common::LifecycleConfig;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::context::TxContext;
use crate::error::{LifecycleError, Result};
use crate::service::Service;
use crate::tx::{AffectedAddOn, Tx};

/// Device wide gate allowing at most one open lifecycle transaction.
///
/// Contention is rejected with [`LifecycleError::TxAlreadyOpen`], never queued.
#[derive(Debug, Default)]
pub struct TransactionScheduler {
    slot: Mutex<Option<Tx>>,
    timeout: Option<Duration>,
}

impl TransactionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler whose transactions roll back on their own after `timeout`.
    pub fn with_transaction_timeout(timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            timeout: Some(timeout),
        }
    }

    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self {
            slot: Mutex::new(None),
            timeout: config.transaction_timeout,
        }
    }

    /// Open a new transaction unless one is still open.
    pub fn create_transaction(&self, ctx: &TxContext, service: Arc<Service>) -> Result<Tx> {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|tx| !tx.is_done()) {
            debug!("rejecting transaction, another one is still open");
            return Err(LifecycleError::TxAlreadyOpen);
        }
        let tx = match self.timeout {
            Some(timeout) => Tx::begin(&ctx.with_timeout(timeout), service)?,
            None => Tx::begin(ctx, service)?,
        };
        info!(tx = %tx.id(), "lifecycle transaction started");
        *slot = Some(tx.clone());
        Ok(tx)
    }

    pub fn is_transaction_open(&self) -> bool {
        self.slot.lock().as_ref().is_some_and(|tx| !tx.is_done())
    }

    /// Last transaction handed out, open or not.
    pub fn get_transaction(&self) -> Option<Tx> {
        self.slot.lock().clone()
    }

    /// What the open transaction is doing to `name`, if anything.
    pub fn affected_add_on(&self, name: &str) -> Option<AffectedAddOn> {
        self.slot
            .lock()
            .as_ref()
            .and_then(|tx| tx.affected_add_on(name))
    }
}
