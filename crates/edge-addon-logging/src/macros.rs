//! ---
//! addon_section: "03-logging"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Structured lifecycle logging context and macros."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
#[doc(hidden)]
#[macro_export]
macro_rules! __addon_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            add_on = ctx.add_on.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            tx = ctx.tx.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with lifecycle context.
#[macro_export]
macro_rules! addon_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__addon_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__addon_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with lifecycle context.
#[macro_export]
macro_rules! addon_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__addon_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__addon_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with lifecycle context.
#[macro_export]
macro_rules! addon_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__addon_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__addon_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with lifecycle context.
#[macro_export]
macro_rules! addon_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__addon_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__addon_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
