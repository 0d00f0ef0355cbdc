//! C control surface
//!
//! Design: a handful of `extern "C"` entry points so a host that is not
//! written in Rust can configure the binding core, inspect it, and free the
//! buffers it hands out:
//! 1. Runtime knobs (log threshold, suspend freedom)
//! 2. Introspection (live handles, registry size, version)
//! 3. Buffer release for carriers returned by value

use std::ffi::{c_char, CStr};

use crate::config::{self, Severity};
use crate::logging::{log_ffi_call, warn};
use crate::marshal::{CVec, Str};
use crate::ownership::{self, NativePayload};
use crate::bridge;

static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Crate version as a NUL-terminated string with static lifetime
#[no_mangle]
pub extern "C" fn lnbind_version() -> *const c_char {
    VERSION.as_ptr().cast()
}

/// Move the diagnostic threshold (0 = debug, 1 = warning, 2 = error).
/// Returns false and changes nothing for any other value.
#[no_mangle]
pub extern "C" fn lnbind_set_log_threshold(severity: u32) -> bool {
    log_ffi_call("lnbind_set_log_threshold");
    match Severity::from_raw(severity) {
        Some(severity) => {
            config::set_log_threshold(severity);
            true
        }
        None => {
            warn!(target: "lnbind::ffi", severity, "Ignoring unknown log threshold");
            false
        }
    }
}

/// While set, no handle releases its payload. Debugging aid only: anything
/// finalized meanwhile leaks.
#[no_mangle]
pub extern "C" fn lnbind_set_suspend_freedom(suspend: bool) {
    log_ffi_call("lnbind_set_suspend_freedom");
    config::set_suspend_freedom(suspend);
}

#[no_mangle]
pub extern "C" fn lnbind_live_handle_count() -> usize {
    ownership::live_count()
}

/// Trait objects currently reachable from native code
#[no_mangle]
pub extern "C" fn lnbind_registry_len() -> usize {
    bridge::global().len()
}

/// Free a string returned by value
///
/// # Safety
/// - `text` must not be used afterwards
/// - Borrowed strings (`chars_is_owned == false`) are left alone
#[no_mangle]
pub unsafe extern "C" fn lnbind_str_free(mut text: Str) {
    log_ffi_call("lnbind_str_free");
    text.release();
}

/// Free a byte vector returned by value
///
/// # Safety
/// - `bytes` must have been produced by this library and not freed yet
#[no_mangle]
pub unsafe extern "C" fn lnbind_cvec_u8_free(mut bytes: CVec<u8>) {
    log_ffi_call("lnbind_cvec_u8_free");
    bytes.release();
}

/// Read the version back as a Rust string
pub fn version() -> &'static str {
    // SAFETY: VERSION is NUL-terminated and static
    let raw = unsafe { CStr::from_ptr(lnbind_version()) };
    raw.to_str().unwrap_or(env!("CARGO_PKG_VERSION"))
}
