//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on lifecycle transactions and orchestration."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Saga style lifecycle transaction.
//!
//! Forward steps register a compensating hook right before their side effect.
//! `commit` discards the hooks, `rollback` runs them last-in first-out. When
//! the transaction context ends while the transaction is still open, a
//! supervisory task performs the rollback instead. Whichever path flips the
//! `done` flag first wins; every later attempt observes [`LifecycleError::TxDone`].
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use edge_addon_logging::{addon_debug, addon_warn, log_lifecycle_event, LifecycleOutcome, LogContext};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::TxContext;
use crate::error::{LifecycleError, Result};
use crate::manifest::Settings;
use crate::service::Service;

/// Compensating action registered during forward execution.
pub type RollbackHook = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Box an async closure into a [`RollbackHook`].
pub fn rollback_hook<F, Fut>(action: F) -> RollbackHook
where
    F: FnOnce() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(move || action().boxed())
}

/// Lifecycle operation a transaction is performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    #[default]
    Unspecified,
    Installing,
    Deleting,
    Updating,
    Configuring,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Unspecified => "unspecified",
            Operation::Installing => "installing",
            Operation::Deleting => "deleting",
            Operation::Updating => "updating",
            Operation::Configuring => "configuring",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Add-on currently being changed by an open transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedAddOn {
    pub name: String,
    pub title: String,
    pub operation: Operation,
}

#[derive(Default)]
struct TxState {
    hooks: Vec<RollbackHook>,
    affected: Option<AffectedAddOn>,
}

struct TxInner {
    id: Uuid,
    started_at: DateTime<Utc>,
    done: AtomicBool,
    state: RwLock<TxState>,
    ctx: TxContext,
    service: Arc<Service>,
}

/// Handle on one lifecycle transaction. Clones share the same transaction.
#[derive(Clone)]
pub struct Tx {
    inner: Arc<TxInner>,
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Tx")
            .field("id", &self.inner.id)
            .field("started_at", &self.inner.started_at)
            .field("done", &self.is_done())
            .field("hooks", &state.hooks.len())
            .field("affected", &state.affected)
            .finish()
    }
}

impl Tx {
    /// Open a transaction whose context is a cancellable child of `parent`.
    ///
    /// Spawns the supervisory task on the current Tokio runtime and fails
    /// with [`LifecycleError::NoRuntime`] when there is none.
    pub fn begin(parent: &TxContext, service: Arc<Service>) -> Result<Tx> {
        let runtime = Handle::try_current().map_err(|_| LifecycleError::NoRuntime)?;
        let tx = Tx {
            inner: Arc::new(TxInner {
                id: Uuid::new_v4(),
                started_at: Utc::now(),
                done: AtomicBool::new(false),
                state: RwLock::new(TxState::default()),
                ctx: parent.with_cancel(),
                service,
            }),
        };
        debug!(tx = %tx.inner.id, "transaction opened");

        let supervised = tx.clone();
        runtime.spawn(async move {
            let reason = supervised.inner.ctx.done().await;
            if supervised.is_done() {
                return;
            }
            warn!(tx = %supervised.inner.id, %reason, "transaction context ended while open, rolling back");
            match supervised.rollback().await {
                Ok(()) | Err(LifecycleError::TxDone) => {}
                Err(err) => warn!(tx = %supervised.inner.id, error = %err, "automatic rollback failed"),
            }
        });
        Ok(tx)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Context bound to this transaction. Cancelling it rolls the
    /// transaction back.
    pub fn context(&self) -> &TxContext {
        &self.inner.ctx
    }

    /// Whether the transaction has been committed or rolled back.
    pub fn is_done(&self) -> bool {
        self.inner.done.load(Ordering::Acquire)
    }

    /// Fails with [`LifecycleError::TxDone`] once the transaction is closed.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_done() {
            return Err(LifecycleError::TxDone);
        }
        Ok(())
    }

    /// Register a compensating action. Fails once the transaction is closed.
    pub fn subscribe_rollback_hook(&self, hook: RollbackHook) -> Result<()> {
        let mut state = self.inner.state.write();
        if self.is_done() {
            return Err(LifecycleError::TxDone);
        }
        state.hooks.push(hook);
        Ok(())
    }

    /// Record the add-on this transaction changes. Only the first call counts.
    pub fn set_affected(&self, name: &str, title: &str, operation: Operation) {
        let mut state = self.inner.state.write();
        if self.is_done() || state.affected.is_some() {
            return;
        }
        state.affected = Some(AffectedAddOn {
            name: name.to_owned(),
            title: title.to_owned(),
            operation,
        });
    }

    /// The affected add-on if it is `name` and the transaction is still open.
    pub fn affected_add_on(&self, name: &str) -> Option<AffectedAddOn> {
        let state = self.inner.state.read();
        if self.is_done() {
            return None;
        }
        state
            .affected
            .as_ref()
            .filter(|affected| affected.name == name)
            .cloned()
    }

    // Flip `done` under the state lock so no hook can slip in afterwards.
    fn close(&self) -> Result<TxState> {
        let mut state = self.inner.state.write();
        self.inner
            .done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LifecycleError::TxDone)?;
        Ok(std::mem::take(&mut *state))
    }

    /// Close the transaction and keep every effect.
    pub fn commit(&self) -> Result<()> {
        if let Some(err) = self.inner.ctx.err() {
            if self.is_done() {
                return Err(LifecycleError::TxDone);
            }
            return Err(err.into());
        }
        let state = self.close()?;
        self.inner.ctx.cancel();

        let id = self.inner.id.to_string();
        let mut log = LogContext::new().with_tx(&id);
        if let Some(affected) = &state.affected {
            log = log
                .with_add_on(&affected.name)
                .with_operation(affected.operation.as_str());
        }
        log_lifecycle_event(
            Some(&log),
            "addon.tx.commit",
            "transaction committed",
            LifecycleOutcome::Success,
        );
        Ok(())
    }

    /// Close the transaction and undo every registered effect, newest first.
    ///
    /// A failing hook is logged and the remaining hooks still run.
    pub async fn rollback(&self) -> Result<()> {
        let TxState { hooks, affected } = self.close()?;
        let id = self.inner.id.to_string();
        let mut log = LogContext::new().with_tx(&id);
        if let Some(affected) = &affected {
            log = log
                .with_add_on(&affected.name)
                .with_operation(affected.operation.as_str());
        }
        addon_debug!(context = log, "running {} rollback hooks", hooks.len());

        let mut failures = 0usize;
        for (index, hook) in hooks.into_iter().enumerate().rev() {
            if let Err(err) = hook().await {
                failures += 1;
                addon_warn!(context = log, "rollback hook {} failed: {}", index, err);
            }
        }
        self.inner.ctx.cancel();

        let outcome = if failures == 0 {
            LifecycleOutcome::Success
        } else {
            LifecycleOutcome::Fault
        };
        log_lifecycle_event(
            Some(&log),
            "addon.tx.rollback",
            "transaction rolled back",
            outcome,
        );
        Ok(())
    }

    /// Commit when `outcome` is `Ok`, roll back otherwise, and hand `outcome`
    /// back to the caller.
    pub async fn finish<T>(&self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    info!(tx = %self.inner.id, error = %rollback_err, "rollback after failure skipped");
                }
                Err(err)
            }
        }
    }

    /// Install `name` at `version`. See [`Service`] for the step sequence.
    pub async fn create_add_on_routine(
        &self,
        name: &str,
        version: &str,
        settings: Option<Settings>,
    ) -> Result<()> {
        self.ensure_active()?;
        let service = Arc::clone(&self.inner.service);
        service.create_add_on(self, name, version, settings).await
    }

    /// Reconfigure `name` when `version` is installed, update it otherwise.
    pub async fn replace_add_on_routine(
        &self,
        name: &str,
        version: &str,
        settings: Option<Settings>,
    ) -> Result<()> {
        self.ensure_active()?;
        let service = Arc::clone(&self.inner.service);
        service.replace_add_on(self, name, version, settings).await
    }

    /// Remove `name` and everything it created.
    pub async fn delete_add_on_routine(&self, name: &str) -> Result<()> {
        self.ensure_active()?;
        let service = Arc::clone(&self.inner.service);
        service.delete_add_on(self, name).await
    }
}
