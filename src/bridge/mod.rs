//! Trait bridge - host implementations of callback traits, callable from C
//!
//! Design: native code never sees a Rust pointer to a host object. It gets
//! an opaque integer key (the object's [`HandleId`](crate::ownership::HandleId))
//! and calls back through `extern "C"` trampolines that look the key up in
//! the [`Registry`]. The registry keeps the object alive while native code
//! holds its key and counts how many holders there are.

mod registry;
mod trait_object;
mod trampoline;
mod traits;


pub use registry::Registry;
pub use trait_object::TraitObject;
pub use trampoline::{
    CRecord, EntropySourceVTable, FeeEstimatorVTable, KvStoreVTable, LoggerVTable,
    NativeEntropySource, NativeFeeEstimator, NativeKvStore, NativeLogger,
};
pub use traits::{
    ConfirmationTarget, EntropySource, FeeEstimator, IoError, KvStore, Level, Logger, Record,
};

use once_cell::sync::Lazy;

use crate::logging::{debug, info};

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

/// The process-wide registry trampolines resolve against
pub fn global() -> &'static Registry {
    &GLOBAL
}

/// Initialize the bridge (idempotent)
pub fn init() {
    Lazy::force(&GLOBAL);
    debug!(target: "lnbind::bridge", "Trait registry ready");
}

/// Drop every registered instance. Native code must not call back afterwards;
/// a late `free` is logged and ignored.
pub fn cleanup() -> usize {
    let dropped = GLOBAL.reset();
    info!(target: "lnbind::bridge", dropped, "Trait registry cleanup");
    dropped
}
