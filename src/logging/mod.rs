//! Logging infrastructure - structured tracing for the binding core
//!
//! Design: `tracing` events with structured fields, split by target:
//! - `lnbind::ownership`: handle creation, anchoring, release decisions
//! - `lnbind::bridge`: trait registry traffic and trampoline failures
//! - `lnbind::ffi`: the C control surface
//!
//! All targets sit under `lnbind`, so one `lnbind=<level>` directive covers
//! them.
//!
//! The subscriber is installed once. Bridge diagnostics are additionally gated
//! by the runtime [`Severity`] threshold, which can be moved after init (the
//! C surface exposes it), unlike the subscriber's own filter.

use once_cell::sync::OnceCell;
use std::io;
use std::panic::Location;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::{self, LoggingConfig, Severity};
use crate::ownership::HandleId;

pub use tracing::{debug, error, info, trace, warn};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Keeps the file appender's worker thread alive for the process lifetime
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialize logging from the active configuration
pub fn init() {
    init_with_config(&config::current().logging);
}

/// Initialize logging with an explicit configuration. Idempotent.
pub fn init_with_config(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config));

        let layer = match &config.file {
            Some(path) => {
                let (writer, guard) = tracing_appender::non_blocking(file_appender(path));
                let _ = FILE_GUARD.set(guard);
                fmt_layer(config.json, writer, false)
            }
            None => fmt_layer(config.json, io::stdout, true),
        };

        // Ignore error if a global subscriber was set by the host
        tracing_subscriber::registry()
            .with(layer)
            .with(env_filter)
            .try_init()
            .ok();
    });
}

pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

/// Filter used when `RUST_LOG` is not set
fn default_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::new(format!("lnbind={}", config.level.as_filter()))
}

fn file_appender(path: &Path) -> tracing_appender::rolling::RollingFileAppender {
    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "lnbind.log".into());
    tracing_appender::rolling::never(directory, file_name)
}

fn fmt_layer<W>(json: bool, writer: W, ansi: bool) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_thread_ids(cfg!(debug_assertions))
        .with_line_number(cfg!(debug_assertions));

    if json {
        layer.json().boxed()
    } else {
        layer.compact().boxed()
    }
}

/// Whether diagnostics at `severity` pass the runtime threshold
#[inline]
pub fn enabled(severity: Severity) -> bool {
    severity >= config::log_threshold()
}

// ============================================================================
// Ownership diagnostics
// ============================================================================

pub fn log_handle_created(id: HandleId, type_name: &str, origin: &Location<'_>, dangling: bool) {
    if enabled(Severity::Debug) {
        trace!(
            target: "lnbind::ownership",
            handle = %id,
            type_name,
            origin = %origin,
            dangling,
            "Wrapped handle created"
        );
    }
}

pub fn log_release(id: HandleId, type_name: &str, origin: &Location<'_>) {
    if config::deinit_logging() && enabled(Severity::Debug) {
        debug!(
            target: "lnbind::ownership",
            handle = %id,
            type_name,
            origin = %origin,
            "Freeing native payload"
        );
    }
}

pub fn log_skip_dangling(id: HandleId, type_name: &str, origin: &Location<'_>) {
    if config::deinit_logging() && enabled(Severity::Debug) {
        debug!(
            target: "lnbind::ownership",
            handle = %id,
            type_name,
            origin = %origin,
            "Not freeing native payload due to dangle"
        );
    }
}

pub fn log_anchor(subject: HandleId, candidate: HandleId) {
    if enabled(Severity::Debug) {
        trace!(target: "lnbind::ownership", %subject, %candidate, "Anchor registered");
    }
}

pub fn log_cycle_rejected(subject: HandleId, candidate: HandleId) {
    if enabled(Severity::Warning) {
        warn!(
            target: "lnbind::ownership",
            %subject,
            %candidate,
            "Rejected anchor that would form a cycle"
        );
    }
}

pub fn log_live_handles(count: usize) {
    if count > 0 && enabled(Severity::Warning) {
        warn!(
            target: "lnbind::ownership",
            live_handles = count,
            "Handles still alive at cleanup; their payloads are released only if they are dropped"
        );
    }
}

// ============================================================================
// Bridge diagnostics
// ============================================================================

pub fn log_cache_instance(key: u64, reference_count: i64, cached_instances: usize) {
    if enabled(Severity::Debug) {
        debug!(
            target: "lnbind::bridge",
            key,
            reference_count,
            cached_instances,
            "Caching global instance"
        );
    }
}

pub fn log_expose(key: u64) {
    if enabled(Severity::Debug) {
        debug!(target: "lnbind::bridge", key, "Exposing instance as opaque key");
    }
}

pub fn log_lookup(key: u64) {
    if enabled(Severity::Debug) {
        trace!(target: "lnbind::bridge", key, "Looking up instance");
    }
}

pub fn log_bad_lookup(key: u64, reference_count: i64) {
    if enabled(Severity::Error) {
        error!(
            target: "lnbind::bridge",
            key,
            reference_count,
            "Bad lookup: non-positive reference count"
        );
    }
}

pub fn log_deregistered(key: u64) {
    if enabled(Severity::Debug) {
        debug!(target: "lnbind::bridge", key, "Instance released by every native holder");
    }
}

pub fn log_unknown_free(key: u64) {
    if enabled(Severity::Warning) {
        warn!(
            target: "lnbind::bridge",
            key,
            "Native free for an instance the registry no longer holds, ignoring"
        );
    }
}

/// Always emitted: the process is about to abort
pub fn log_fatal(marker: &str, reason: &dyn std::fmt::Display) {
    error!(target: "lnbind::bridge", marker, %reason, "Fatal trait bridge violation, aborting");
}

// ============================================================================
// FFI diagnostics
// ============================================================================

pub fn log_ffi_call(function: &str) {
    if enabled(Severity::Debug) {
        trace!(target: "lnbind::ffi", function, "FFI call");
    }
}
