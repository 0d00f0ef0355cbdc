//! lnbind - the memory-safety core of a Lightning language binding
//!
//! Three pieces sit between a host and a native Lightning library:
//! - [`ownership`]: host-side handles over native values, with anchors that
//!   keep owners alive for as long as views into them exist, and a release
//!   that runs exactly once
//! - [`bridge`]: host implementations of callback traits, reachable from C
//!   through opaque integer keys
//! - [`marshal`]: the `#[repr(C)]` carriers values travel in
//!
//! Ambient: [`config`] (TOML + `LNBIND_*` environment), [`logging`]
//! (`tracing`), [`errors`], and the [`ffi`] control surface.

pub mod bridge;
pub mod config;
pub mod errors;
pub mod ffi;
pub mod logging;
pub mod marshal;
pub mod ownership;

pub use bridge::{Registry, TraitObject};
pub use config::{BridgeConfig, Severity, StaleLookupPolicy};
pub use errors::{BridgeError, ConfigError, Error, MarshalError, OwnershipError, Result};
pub use ownership::{Handle, HandleId, NativeClone, NativePayload, OwnershipStats};

use std::ffi::{c_char, CStr};
use std::path::Path;

/// Load configuration (optional file, then environment), install it, and
/// bring up logging, the tracker, and the registry. Idempotent apart from
/// reinstalling the configuration.
pub fn init(config_path: Option<&Path>) -> Result<()> {
    let config = BridgeConfig::load(config_path)?;
    config::install(config);
    logging::init();
    ownership::init();
    bridge::init();
    logging::info!(target: "lnbind::ffi", version = env!("CARGO_PKG_VERSION"), "lnbind initialized");
    Ok(())
}

/// Report leftovers and drop every registered trait object
pub fn cleanup() -> OwnershipStats {
    let stats = ownership::cleanup();
    bridge::cleanup();
    stats
}

/// Initialize from the environment, plus a TOML file when `config_path` is
/// non-null. Returns false (after falling back to defaults) if the
/// configuration could not be loaded.
///
/// # Safety
/// `config_path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn lnbind_init(config_path: *const c_char) -> bool {
    let path = if config_path.is_null() {
        Ok(None)
    } else {
        CStr::from_ptr(config_path).to_str().map(|path| Some(Path::new(path)))
    };

    let outcome = match path {
        Ok(path) => init(path),
        Err(err) => Err(MarshalError::from(err).into()),
    };

    match outcome {
        Ok(()) => true,
        Err(err) => {
            logging::init();
            ownership::init();
            bridge::init();
            logging::error!(target: "lnbind::ffi", error = %err, "Configuration rejected, running with defaults");
            false
        }
    }
}

/// Tear down at process exit. Returns how many handles were still alive.
#[no_mangle]
pub extern "C" fn lnbind_cleanup() -> usize {
    cleanup().live
}
