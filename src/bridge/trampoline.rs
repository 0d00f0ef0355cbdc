//! C adapters for the callback traits
//!
//! Two directions:
//! - host → native: [`TraitObject::to_native`] builds a `#[repr(C)]` vtable
//!   whose `this_arg` is the object's registry key and whose slots are the
//!   trampolines below. A trampoline resolves the key, decodes arguments,
//!   calls the host implementation, and encodes the return value.
//! - native → host: `Native*` adapters implement the Rust traits by calling
//!   through a vtable the native side supplied, and call its `free` exactly
//!   once when dropped.
//!
//! A trampoline has no caller to return an error to. Unknown keys, invalid
//! enum tags, host panics and null vtable slots are logged and abort the
//! process. The `free` slot is the exception: a late free is only logged.

use std::any::Any;
use std::ffi::c_void;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::registry::pointer_to_key;
use super::traits::{
    ConfirmationTarget, EntropySource, FeeEstimator, IoError, KvStore, Level, Logger, Record,
};
use super::{global, TraitObject};
use crate::config;
use crate::errors::{BridgeError, MarshalError};
use crate::logging::{log_fatal, log_unknown_free};
use crate::marshal::{CResult, CVec, Str, ThirtyTwoBytes, U8Slice};
use crate::ownership::{Handle, NativePayload};

/// Log `reason` and abort. Continuing would hand native code garbage.
pub(crate) fn fatal(marker: &str, reason: &dyn fmt::Display) -> ! {
    log_fatal(marker, reason);
    std::process::abort()
}

fn resolve_or_abort<T>(this_arg: *const c_void, marker: &str) -> Arc<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    match global().resolve::<T>(this_arg) {
        Ok(instance) => instance,
        Err(err) => fatal(marker, &err),
    }
}

/// Run host code, turning a panic into an abort instead of unwinding into C
fn guard<R>(marker: &str, call: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(value) => value,
        Err(payload) => fatal(marker, &PanicMessage(payload)),
    }
}

fn slot<F: Copy>(slot: Option<F>, marker: &str) -> F {
    match slot {
        Some(function) => function,
        None => fatal(marker, &"native vtable slot is null"),
    }
}

fn decode<T, E: fmt::Display>(decoded: Result<T, E>, marker: &str) -> T {
    match decoded {
        Ok(value) => value,
        Err(err) => fatal(marker, &err),
    }
}

struct PanicMessage(Box<dyn Any + Send>);

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = self.0.downcast_ref::<&str>() {
            write!(f, "host panicked: {message}")
        } else if let Some(message) = self.0.downcast_ref::<String>() {
            write!(f, "host panicked: {message}")
        } else {
            f.write_str("host panicked")
        }
    }
}

/// Shared `free` slot: one native holder of the object let go.
///
/// A key the registry no longer holds (e.g. after [`super::cleanup`]) is
/// only logged: native finalizers may run in any order during shutdown.
pub(crate) extern "C" fn release_instance(this_arg: *mut c_void) {
    let key = pointer_to_key(this_arg);
    match global().release(key) {
        Ok(_) => {}
        Err(BridgeError::UnknownKey(key)) => log_unknown_free(key),
        Err(err) => fatal("TraitObject::free", &err),
    }
}

macro_rules! native_adapter {
    ($adapter:ident, $vtable:ident, $name:literal) => {
        #[doc = concat!("A ", $name, " implemented by the native library")]
        pub struct $adapter {
            vtable: $vtable,
        }

        impl $adapter {
            /// # Safety
            /// Every non-null slot must be callable with `this_arg` until
            /// `free` runs, and nobody else may call `free`.
            pub unsafe fn from_vtable(vtable: $vtable) -> Self {
                Self { vtable }
            }

            pub fn vtable(&self) -> &$vtable {
                &self.vtable
            }
        }

        impl Drop for $adapter {
            fn drop(&mut self) {
                if config::freedom_suspended() {
                    return;
                }
                if let Some(free) = self.vtable.free.take() {
                    free(self.vtable.this_arg);
                }
            }
        }

        // SAFETY: the native side promises thread-safe callbacks for every
        // trait it implements
        unsafe impl Send for $vtable {}
        unsafe impl Sync for $vtable {}
    };
}

// ============================================================================
// EntropySource
// ============================================================================

#[repr(C)]
pub struct EntropySourceVTable {
    pub this_arg: *mut c_void,
    pub get_secure_random_bytes: Option<extern "C" fn(this_arg: *const c_void) -> ThirtyTwoBytes>,
    pub free: Option<extern "C" fn(this_arg: *mut c_void)>,
}

native_adapter!(NativeEntropySource, EntropySourceVTable, "EntropySource");

extern "C" fn entropy_get_secure_random_bytes(this_arg: *const c_void) -> ThirtyTwoBytes {
    const MARKER: &str = "EntropySource::get_secure_random_bytes";
    let source = resolve_or_abort::<dyn EntropySource>(this_arg, MARKER);
    ThirtyTwoBytes::new(guard(MARKER, || source.get_secure_random_bytes()))
}

impl TraitObject<dyn EntropySource> {
    /// Activate and describe this object as a native vtable
    pub fn to_native(&self) -> EntropySourceVTable {
        self.activate();
        EntropySourceVTable {
            this_arg: self.opaque_key(),
            get_secure_random_bytes: Some(entropy_get_secure_random_bytes),
            free: Some(release_instance),
        }
    }
}

impl EntropySource for NativeEntropySource {
    fn get_secure_random_bytes(&self) -> [u8; 32] {
        let call = slot(
            self.vtable.get_secure_random_bytes,
            "NativeEntropySource::get_secure_random_bytes",
        );
        call(self.vtable.this_arg).into_inner()
    }
}

// ============================================================================
// FeeEstimator
// ============================================================================

#[repr(C)]
pub struct FeeEstimatorVTable {
    pub this_arg: *mut c_void,
    pub get_est_sat_per_1000_weight:
        Option<extern "C" fn(this_arg: *const c_void, confirmation_target: u32) -> u32>,
    pub free: Option<extern "C" fn(this_arg: *mut c_void)>,
}

native_adapter!(NativeFeeEstimator, FeeEstimatorVTable, "FeeEstimator");

extern "C" fn fee_get_est_sat_per_1000_weight(this_arg: *const c_void, target: u32) -> u32 {
    const MARKER: &str = "FeeEstimator::get_est_sat_per_1000_weight";
    let estimator = resolve_or_abort::<dyn FeeEstimator>(this_arg, MARKER);
    let target = decode(ConfirmationTarget::try_from(target), MARKER);
    guard(MARKER, || estimator.get_est_sat_per_1000_weight(target))
}

impl TraitObject<dyn FeeEstimator> {
    pub fn to_native(&self) -> FeeEstimatorVTable {
        self.activate();
        FeeEstimatorVTable {
            this_arg: self.opaque_key(),
            get_est_sat_per_1000_weight: Some(fee_get_est_sat_per_1000_weight),
            free: Some(release_instance),
        }
    }
}

impl FeeEstimator for NativeFeeEstimator {
    fn get_est_sat_per_1000_weight(&self, target: ConfirmationTarget) -> u32 {
        let call = slot(
            self.vtable.get_est_sat_per_1000_weight,
            "NativeFeeEstimator::get_est_sat_per_1000_weight",
        );
        call(self.vtable.this_arg, target as u32)
    }
}

// ============================================================================
// Logger
// ============================================================================

/// A log record as the native library lays it out
#[repr(C)]
pub struct CRecord {
    pub level: u32,
    pub args: Str,
    pub module_path: Str,
    pub file: Str,
    pub line: u32,
}

#[repr(C)]
pub struct LoggerVTable {
    pub this_arg: *mut c_void,
    pub log: Option<extern "C" fn(this_arg: *const c_void, record: *const CRecord)>,
    pub free: Option<extern "C" fn(this_arg: *mut c_void)>,
}

native_adapter!(NativeLogger, LoggerVTable, "Logger");

extern "C" fn logger_log(this_arg: *const c_void, record: *const CRecord) {
    const MARKER: &str = "Logger::log";
    let logger = resolve_or_abort::<dyn Logger>(this_arg, MARKER);

    // SAFETY: the record is valid for the duration of the call
    let record = match unsafe { record.as_ref() } {
        Some(record) => record,
        None => fatal(MARKER, &MarshalError::NullPointer { kind: "record" }),
    };
    let level = decode(Level::try_from(record.level), MARKER);

    // Log text is best effort; stray bytes are replaced, not fatal
    let args = String::from_utf8_lossy(record.args.as_bytes());
    let module_path = String::from_utf8_lossy(record.module_path.as_bytes());
    let file = String::from_utf8_lossy(record.file.as_bytes());

    guard(MARKER, || {
        logger.log(&Record {
            level,
            args: &args,
            module_path: &module_path,
            file: &file,
            line: record.line,
        })
    });
}

impl TraitObject<dyn Logger> {
    pub fn to_native(&self) -> LoggerVTable {
        self.activate();
        LoggerVTable {
            this_arg: self.opaque_key(),
            log: Some(logger_log),
            free: Some(release_instance),
        }
    }
}

impl Logger for NativeLogger {
    fn log(&self, record: &Record<'_>) {
        let call = slot(self.vtable.log, "NativeLogger::log");
        let record = CRecord {
            level: record.level as u32,
            args: Str::borrowed(record.args),
            module_path: Str::borrowed(record.module_path),
            file: Str::borrowed(record.file),
            line: record.line,
        };
        call(self.vtable.this_arg, &record);
    }
}

// ============================================================================
// KvStore
// ============================================================================

#[repr(C)]
pub struct KvStoreVTable {
    pub this_arg: *mut c_void,
    pub read: Option<
        extern "C" fn(this_arg: *const c_void, namespace: Str, key: Str) -> CResult<CVec<u8>, u32>,
    >,
    pub write: Option<
        extern "C" fn(
            this_arg: *const c_void,
            namespace: Str,
            key: Str,
            value: U8Slice,
        ) -> CResult<(), u32>,
    >,
    pub free: Option<extern "C" fn(this_arg: *mut c_void)>,
}

native_adapter!(NativeKvStore, KvStoreVTable, "KvStore");

fn decode_text<'a>(text: &'a Str, marker: &str) -> &'a str {
    decode(text.as_str(), marker)
}

extern "C" fn kv_store_read(
    this_arg: *const c_void,
    namespace: Str,
    key: Str,
) -> CResult<CVec<u8>, u32> {
    const MARKER: &str = "KvStore::read";
    let store = resolve_or_abort::<dyn KvStore>(this_arg, MARKER);
    let namespace = decode_text(&namespace, MARKER);
    let key = decode_text(&key, MARKER);

    guard(MARKER, || store.read(namespace, key))
        .map(CVec::from)
        .map_err(|err| err as u32)
        .into()
}

extern "C" fn kv_store_write(
    this_arg: *const c_void,
    namespace: Str,
    key: Str,
    value: U8Slice,
) -> CResult<(), u32> {
    const MARKER: &str = "KvStore::write";
    let store = resolve_or_abort::<dyn KvStore>(this_arg, MARKER);
    let namespace = decode_text(&namespace, MARKER);
    let key = decode_text(&key, MARKER);
    // SAFETY: the native caller keeps the buffer alive for the call
    let value = unsafe { value.as_slice() };

    guard(MARKER, || store.write(namespace, key, value))
        .map_err(|err| err as u32)
        .into()
}

impl TraitObject<dyn KvStore> {
    pub fn to_native(&self) -> KvStoreVTable {
        self.activate();
        KvStoreVTable {
            this_arg: self.opaque_key(),
            read: Some(kv_store_read),
            write: Some(kv_store_write),
            free: Some(release_instance),
        }
    }
}

impl NativeKvStore {
    /// Take ownership of a returned result, decode it, and release it
    fn finish<O, T>(
        result: CResult<O, u32>,
        marker: &str,
        convert: impl FnOnce(&O) -> T,
    ) -> Result<T, IoError>
    where
        O: NativePayload,
    {
        let result = Handle::owned(result);
        let outcome = match (result.payload().value(), result.payload().error()) {
            (Some(value), _) => Ok(convert(value)),
            (_, Some(code)) => Err(decode(IoError::try_from(*code), marker)),
            (None, None) => fatal(marker, &MarshalError::NullPointer { kind: "result" }),
        };
        drop(result);
        outcome
    }
}

impl KvStore for NativeKvStore {
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, IoError> {
        const MARKER: &str = "NativeKvStore::read";
        let call = slot(self.vtable.read, MARKER);
        let result = call(self.vtable.this_arg, Str::borrowed(namespace), Str::borrowed(key));
        Self::finish(result, MARKER, CVec::to_vec)
    }

    fn write(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), IoError> {
        const MARKER: &str = "NativeKvStore::write";
        let call = slot(self.vtable.write, MARKER);
        let result = call(
            self.vtable.this_arg,
            Str::borrowed(namespace),
            Str::borrowed(key),
            U8Slice::new(value),
        );
        Self::finish(result, MARKER, |_| ())
    }
}
