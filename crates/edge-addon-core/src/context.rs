//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on lifecycle transactions and orchestration."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
//! Cancellable lifetime shared by a lifecycle transaction and its caller.
//!
//! A context ends when it is cancelled, when its deadline passes, or when its
//! parent ends. Children never outlive their parent.
use std::fmt;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

/// Why a context ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// Explicitly cancelled.
    #[error("context cancelled")]
    Cancelled,
    /// Deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

struct ContextInner {
    signal: watch::Sender<Option<ContextError>>,
    deadline: Option<Instant>,
    parent: Option<TxContext>,
}

/// Cloneable handle on a cancellable lifetime.
#[derive(Clone)]
pub struct TxContext {
    inner: Arc<ContextInner>,
}

impl fmt::Debug for TxContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxContext")
            .field("deadline", &self.inner.deadline)
            .field("err", &self.err())
            .finish()
    }
}

impl Default for TxContext {
    fn default() -> Self {
        Self::background()
    }
}

impl TxContext {
    /// Root context that only ends when cancelled.
    pub fn background() -> Self {
        Self::build(None, None)
    }

    fn build(parent: Option<TxContext>, deadline: Option<Instant>) -> Self {
        let (signal, _) = watch::channel(None);
        Self {
            inner: Arc::new(ContextInner {
                signal,
                deadline,
                parent,
            }),
        }
    }

    /// Child context that can be cancelled independently of `self`.
    pub fn with_cancel(&self) -> Self {
        Self::build(Some(self.clone()), self.deadline())
    }

    /// Child context that also ends after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Child context that also ends at `deadline`, or earlier if the parent's
    /// deadline comes first.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline() {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self::build(Some(self.clone()), Some(deadline))
    }

    /// Effective deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// End this context and every context derived from it. Idempotent.
    pub fn cancel(&self) {
        self.inner.signal.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(ContextError::Cancelled);
            true
        });
    }

    /// Why the context ended, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if let Some(err) = *self.inner.signal.borrow() {
            return Some(err);
        }
        if let Some(err) = self.inner.parent.as_ref().and_then(TxContext::err) {
            return Some(err);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context has ended.
    pub fn done(&self) -> BoxFuture<'static, ContextError> {
        let ctx = self.clone();
        async move {
            let mut rx = ctx.inner.signal.subscribe();
            let own = async move {
                loop {
                    let state = *rx.borrow_and_update();
                    if let Some(err) = state {
                        return err;
                    }
                    if rx.changed().await.is_err() {
                        return pending().await;
                    }
                }
            };
            let parent = async {
                match &ctx.inner.parent {
                    Some(parent) => parent.done().await,
                    None => pending().await,
                }
            };
            let deadline = async {
                match ctx.inner.deadline {
                    Some(deadline) => {
                        sleep_until(deadline).await;
                        ContextError::DeadlineExceeded
                    }
                    None => pending().await,
                }
            };
            tokio::select! {
                err = own => err,
                err = parent => err,
                err = deadline => err,
            }
        }
        .boxed()
    }
}
