//! Tracing hooks for debugging lock waiters and wakeup decisions.
//!
//! Enable with `--features tracing`. Without the feature the macros expand to
//! nothing, so lock and unlock carry no logging cost.

/// Installs a `tracing` subscriber with thread ids and uptime timestamps.
///
/// Intended for tests and profiling binaries. Filtering follows `RUST_LOG`
/// and defaults to `turnstile_rwlock=trace`. Calling it again after a
/// subscriber is installed is harmless. Does nothing if the `tracing` feature
/// is not enabled.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("turnstile_rwlock=trace"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

/// Installs a `tracing` subscriber. No-op: the `tracing` feature is disabled.
#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, trace};

#[cfg(not(feature = "tracing"))]
macro_rules! trace_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use debug_noop as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use trace_noop as trace;
