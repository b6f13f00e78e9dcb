//! ---
//! addon_section: "03-logging"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Structured lifecycle logging context and macros."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Log helpers that stamp every lifecycle event with the add-on, the
//! operation in flight, and the owning transaction.

use tracing::Level;

pub mod macros;

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Add-on the event is about.
    pub add_on: Option<&'a str>,
    /// Lifecycle operation (installing, deleting, ...).
    pub operation: Option<&'a str>,
    /// Identifier of the owning transaction.
    pub tx: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an add-on name.
    pub fn with_add_on(mut self, add_on: &'a str) -> Self {
        self.add_on = Some(add_on);
        self
    }

    /// Attach an operation descriptor.
    pub fn with_operation(mut self, operation: &'a str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Attach a transaction identifier.
    pub fn with_tx(mut self, tx: &'a str) -> Self {
        self.tx = Some(tx);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was compensated.
    Fault,
}

impl LifecycleOutcome {
    /// Stable lowercase label used as the `outcome` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOutcome::Success => "success",
            LifecycleOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with a success/fault outcome.
///
/// Successes are logged at INFO, faults at ERROR.
pub fn log_lifecycle_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: LifecycleOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    match outcome {
        LifecycleOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            add_on = ctx.add_on.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            tx = ctx.tx.unwrap_or(""),
            message = %message
        ),
        LifecycleOutcome::Fault => tracing::event!(
            Level::ERROR,
            event,
            outcome = outcome.as_str(),
            add_on = ctx.add_on.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            tx = ctx.tx.unwrap_or(""),
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `emit` under a JSON subscriber and return one line per event.
    fn capture(emit: impl FnOnce()) -> Vec<String> {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, emit);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn macros_stamp_lifecycle_context() {
        let lines = capture(|| {
            let ctx = LogContext::new()
                .with_add_on("node-red")
                .with_operation("installing");
            addon_info!(context = ctx.clone(), "pull finished");
            addon_debug!("debug message");
            addon_warn!(context = ctx.clone(), "hook failed: {}", "timeout");
            addon_error!(context = ctx, "error code: {}", 42);
        });

        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains(r#""add_on":"node-red""#));
        assert!(lines[0].contains(r#""operation":"installing""#));
        assert!(lines[0].contains("pull finished"));
        assert!(lines[1].contains(r#""add_on":"""#));
        assert!(lines[2].contains("hook failed: timeout"));
        assert!(lines[3].contains(r#""level":"ERROR""#));
        assert!(lines[3].contains("error code: 42"));
    }

    #[test]
    fn lifecycle_events_carry_outcome_and_level() {
        let lines = capture(|| {
            let ctx = LogContext::new().with_add_on("node-red").with_tx("tx-1");
            log_lifecycle_event(
                Some(&ctx),
                "addon.install",
                "install committed",
                LifecycleOutcome::Success,
            );
            log_lifecycle_event(
                None,
                "addon.install",
                "install rolled back",
                LifecycleOutcome::Fault,
            );
        });

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""level":"INFO""#));
        assert!(lines[0].contains(r#""outcome":"success""#));
        assert!(lines[0].contains(r#""tx":"tx-1""#));
        assert!(lines[0].contains(r#""event":"addon.install""#));
        assert!(lines[1].contains(r#""level":"ERROR""#));
        assert!(lines[1].contains(r#""outcome":"fault""#));
        assert!(lines[1].contains(r#""add_on":"""#));
    }

    #[test]
    fn outcome_labels_are_stable() {
        assert_eq!(LifecycleOutcome::Success.as_str(), "success");
        assert_eq!(LifecycleOutcome::Fault.as_str(), "fault");
    }
}
