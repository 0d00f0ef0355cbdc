//! Error types for the binding core
//!
//! Protocol violations that the caller can act on are typed errors. Violations
//! that leave no sane way forward (a native callback into a released object, a
//! null slot in a native vtable) are logged and abort in the trampoline layer
//! instead of surfacing here.

use std::path::PathBuf;
use thiserror::Error;

use crate::ownership::HandleId;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the ownership tracker
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OwnershipError {
    /// Registering the anchor would close a loop in the anchor graph
    #[error("cyclic anchor: {candidate} already depends on {subject}")]
    CyclicReference {
        subject: HandleId,
        candidate: HandleId,
    },

    /// Deterministic release requested while other references are alive
    #[error("handle {id} is still shared by {holders} other reference(s)")]
    StillShared { id: HandleId, holders: usize },
}

/// Errors raised by the trait registry
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("null opaque key")]
    NullKey,

    #[error("no trait object registered under key {0}")]
    UnknownKey(u64),

    /// Native code called back into an object whose count already dropped to zero
    #[error("stale lookup of key {key}: reference count {count}")]
    StaleReference { key: u64, count: i64 },

    #[error("key {key} holds a {found}, not a {expected}")]
    TypeMismatch {
        key: u64,
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors raised while converting between host and C representations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarshalError {
    #[error("expected {expected} elements, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("invalid {kind} tag {tag}")]
    InvalidTag { kind: &'static str, tag: u32 },

    #[error("{kind} value {value} exceeds {max}")]
    OutOfRange {
        kind: &'static str,
        value: u64,
        max: u64,
    },

    /// A populated branch or buffer pointer was null
    #[error("null pointer in {kind}")]
    NullPointer { kind: &'static str },

    #[error("string is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Unified error type
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
