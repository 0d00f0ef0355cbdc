//! Callback traits the host implements and the native library calls
//!
//! These are plain Rust traits with no FFI types in their signatures. The
//! C plumbing lives in [`trampoline`](super::trampoline).

use std::fmt;

use crate::errors::MarshalError;

/// A source of entropy
pub trait EntropySource: Send + Sync {
    /// A unique, cryptographically secure random 32-byte value. Must differ
    /// on every call.
    fn get_secure_random_bytes(&self) -> [u8; 32];
}

/// How soon a transaction should confirm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ConfirmationTarget {
    Background = 0,
    Normal = 1,
    HighPriority = 2,
}

impl TryFrom<u32> for ConfirmationTarget {
    type Error = MarshalError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Self::Background),
            1 => Ok(Self::Normal),
            2 => Ok(Self::HighPriority),
            tag => Err(MarshalError::InvalidTag {
                kind: "confirmation target",
                tag,
            }),
        }
    }
}

/// Fee rate estimates
pub trait FeeEstimator: Send + Sync {
    /// Estimated fee rate for `target`, in satoshis per 1000 weight units
    fn get_est_sat_per_1000_weight(&self, target: ConfirmationTarget) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum Level {
    Gossip = 0,
    Trace = 1,
    Debug = 2,
    Info = 3,
    Warn = 4,
    Error = 5,
}

impl TryFrom<u32> for Level {
    type Error = MarshalError;

    fn try_from(tag: u32) -> Result<Self, MarshalError> {
        match tag {
            0 => Ok(Self::Gossip),
            1 => Ok(Self::Trace),
            2 => Ok(Self::Debug),
            3 => Ok(Self::Info),
            4 => Ok(Self::Warn),
            5 => Ok(Self::Error),
            tag => Err(MarshalError::InvalidTag { kind: "level", tag }),
        }
    }
}

/// One log line from the native library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub level: Level,
    pub args: &'a str,
    pub module_path: &'a str,
    pub file: &'a str,
    pub line: u32,
}

pub trait Logger: Send + Sync {
    fn log(&self, record: &Record<'_>);
}

/// Storage failure kinds, in the native library's numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum IoError {
    NotFound = 0,
    PermissionDenied = 1,
    ConnectionRefused = 2,
    ConnectionReset = 3,
    ConnectionAborted = 4,
    NotConnected = 5,
    AddrInUse = 6,
    AddrNotAvailable = 7,
    BrokenPipe = 8,
    AlreadyExists = 9,
    WouldBlock = 10,
    InvalidInput = 11,
    InvalidData = 12,
    TimedOut = 13,
    WriteZero = 14,
    Interrupted = 15,
    Other = 16,
    UnexpectedEof = 17,
}

impl IoError {
    const ALL: [Self; 18] = [
        Self::NotFound,
        Self::PermissionDenied,
        Self::ConnectionRefused,
        Self::ConnectionReset,
        Self::ConnectionAborted,
        Self::NotConnected,
        Self::AddrInUse,
        Self::AddrNotAvailable,
        Self::BrokenPipe,
        Self::AlreadyExists,
        Self::WouldBlock,
        Self::InvalidInput,
        Self::InvalidData,
        Self::TimedOut,
        Self::WriteZero,
        Self::Interrupted,
        Self::Other,
        Self::UnexpectedEof,
    ];
}

impl TryFrom<u32> for IoError {
    type Error = MarshalError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or(MarshalError::InvalidTag {
                kind: "io error",
                tag,
            })
    }
}

impl From<std::io::ErrorKind> for IoError {
    fn from(kind: std::io::ErrorKind) -> Self {
        use std::io::ErrorKind as K;
        match kind {
            K::NotFound => Self::NotFound,
            K::PermissionDenied => Self::PermissionDenied,
            K::ConnectionRefused => Self::ConnectionRefused,
            K::ConnectionReset => Self::ConnectionReset,
            K::ConnectionAborted => Self::ConnectionAborted,
            K::NotConnected => Self::NotConnected,
            K::AddrInUse => Self::AddrInUse,
            K::AddrNotAvailable => Self::AddrNotAvailable,
            K::BrokenPipe => Self::BrokenPipe,
            K::AlreadyExists => Self::AlreadyExists,
            K::WouldBlock => Self::WouldBlock,
            K::InvalidInput => Self::InvalidInput,
            K::InvalidData => Self::InvalidData,
            K::TimedOut => Self::TimedOut,
            K::WriteZero => Self::WriteZero,
            K::Interrupted => Self::Interrupted,
            K::UnexpectedEof => Self::UnexpectedEof,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for IoError {}

/// Namespaced key-value persistence
pub trait KvStore: Send + Sync {
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, IoError>;

    fn write(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), IoError>;
}
