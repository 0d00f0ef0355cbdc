//! Runtime configuration
//!
//! Defaults, overridable by a TOML file and by `LNBIND_*` environment
//! variables. The active config lives in a process-wide lock; the flags read
//! on hot paths (release, logging) are mirrored into atomics so `Drop` never
//! has to take a lock.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::errors::ConfigError;

static ACTIVE: Lazy<RwLock<BridgeConfig>> = Lazy::new(|| RwLock::new(BridgeConfig::default()));

static LOG_THRESHOLD: AtomicU8 = AtomicU8::new(Severity::Warning as u8);
static DEINIT_LOGGING: AtomicBool = AtomicBool::new(true);
static SUSPEND_FREEDOM: AtomicBool = AtomicBool::new(false);
static FATAL_STALE_LOOKUP: AtomicBool = AtomicBool::new(false);
static DEREGISTER_ON_FREE: AtomicBool = AtomicBool::new(true);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ownership: OwnershipConfig,

    #[serde(default)]
    pub bridge: BridgeSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum severity for bridge diagnostics
    #[serde(default)]
    pub level: Severity,

    #[serde(default = "default_false")]
    pub json: bool,

    /// Append logs to this file instead of stdout
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Per-handle "freeing" / "not freeing" lines on finalization
    #[serde(default = "default_true")]
    pub deinit_logging: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipConfig {
    /// Never release native payloads. Debugging aid only.
    #[serde(default = "default_false")]
    pub suspend_freedom: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeSection {
    #[serde(default)]
    pub stale_lookup: StaleLookupPolicy,

    /// Drop registry entries once every native holder has called `free`
    #[serde(default = "default_true")]
    pub deregister_on_free: bool,
}

/// Severity of bridge diagnostics. Raw values are part of the C surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Severity {
    Debug = 0,
    #[default]
    Warning = 1,
    Error = 2,
}

/// What `resolve` does when the key's reference count is not positive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaleLookupPolicy {
    /// Log at error severity and hand out the cached object anyway
    #[default]
    Degraded,
    /// Log and fail the lookup
    Fatal,
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Severity::Warning,
            json: false,
            file: None,
            deinit_logging: true,
        }
    }
}

impl Default for OwnershipConfig {
    fn default() -> Self {
        Self {
            suspend_freedom: false,
        }
    }
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            stale_lookup: StaleLookupPolicy::Degraded,
            deregister_on_free: true,
        }
    }
}

impl Severity {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Debug),
            1 => Some(Self::Warning),
            2 => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" | "trace" => Ok(Self::Debug),
            "warning" | "warn" | "info" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::InvalidValue {
                key: "LNBIND_LOG_LEVEL",
                value: s.to_string(),
            }),
        }
    }
}

impl std::str::FromStr for StaleLookupPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "degraded" => Ok(Self::Degraded),
            "fatal" => Ok(Self::Fatal),
            _ => Err(ConfigError::InvalidValue {
                key: "LNBIND_STALE_LOOKUP",
                value: s.to_string(),
            }),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Optional file, then environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `LNBIND_*` overrides from an arbitrary lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // LNBIND_LOG_LEVEL: debug, warning, error
        if let Some(level) = lookup("LNBIND_LOG_LEVEL") {
            self.logging.level = level.parse()?;
        }

        if let Some(path) = lookup("LNBIND_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(path));
        }

        if let Some(json) = lookup("LNBIND_LOG_JSON") {
            self.logging.json = parse_flag("LNBIND_LOG_JSON", &json)?;
        }

        if let Some(deinit) = lookup("LNBIND_DEINIT_LOGGING") {
            self.logging.deinit_logging = parse_flag("LNBIND_DEINIT_LOGGING", &deinit)?;
        }

        if let Some(suspend) = lookup("LNBIND_SUSPEND_FREEDOM") {
            self.ownership.suspend_freedom = parse_flag("LNBIND_SUSPEND_FREEDOM", &suspend)?;
        }

        if let Some(policy) = lookup("LNBIND_STALE_LOOKUP") {
            self.bridge.stale_lookup = policy.parse()?;
        }

        if let Some(deregister) = lookup("LNBIND_DEREGISTER_ON_FREE") {
            self.bridge.deregister_on_free = parse_flag("LNBIND_DEREGISTER_ON_FREE", &deregister)?;
        }

        Ok(())
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

/// Make `config` the active configuration
pub fn install(config: BridgeConfig) {
    LOG_THRESHOLD.store(config.logging.level as u8, Ordering::Relaxed);
    DEINIT_LOGGING.store(config.logging.deinit_logging, Ordering::Relaxed);
    SUSPEND_FREEDOM.store(config.ownership.suspend_freedom, Ordering::Relaxed);
    FATAL_STALE_LOOKUP.store(
        config.bridge.stale_lookup == StaleLookupPolicy::Fatal,
        Ordering::Relaxed,
    );
    DEREGISTER_ON_FREE.store(config.bridge.deregister_on_free, Ordering::Relaxed);
    *ACTIVE.write() = config;
}

/// Snapshot of the active configuration
pub fn current() -> BridgeConfig {
    ACTIVE.read().clone()
}

pub fn set_log_threshold(severity: Severity) {
    LOG_THRESHOLD.store(severity as u8, Ordering::Relaxed);
    ACTIVE.write().logging.level = severity;
}

pub fn log_threshold() -> Severity {
    match LOG_THRESHOLD.load(Ordering::Relaxed) {
        0 => Severity::Debug,
        1 => Severity::Warning,
        _ => Severity::Error,
    }
}

pub fn set_suspend_freedom(suspend: bool) {
    SUSPEND_FREEDOM.store(suspend, Ordering::Relaxed);
    ACTIVE.write().ownership.suspend_freedom = suspend;
}

#[inline]
pub fn freedom_suspended() -> bool {
    SUSPEND_FREEDOM.load(Ordering::Relaxed)
}

#[inline]
pub fn deinit_logging() -> bool {
    DEINIT_LOGGING.load(Ordering::Relaxed)
}

#[inline]
pub fn stale_lookup_policy() -> StaleLookupPolicy {
    if FATAL_STALE_LOOKUP.load(Ordering::Relaxed) {
        StaleLookupPolicy::Fatal
    } else {
        StaleLookupPolicy::Degraded
    }
}

#[inline]
pub fn deregister_on_free() -> bool {
    DEREGISTER_ON_FREE.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.logging.level, Severity::Warning);
        assert!(config.logging.deinit_logging);
        assert!(!config.ownership.suspend_freedom);
        assert_eq!(config.bridge.stale_lookup, StaleLookupPolicy::Degraded);
        assert!(config.bridge.deregister_on_free);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [logging]
            level = "debug"
            json = true

            [bridge]
            stale_lookup = "fatal"
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.level, Severity::Debug);
        assert!(config.logging.json);
        assert!(config.logging.deinit_logging);
        assert_eq!(config.bridge.stale_lookup, StaleLookupPolicy::Fatal);
        assert!(config.bridge.deregister_on_free);
        assert_eq!(config.ownership, OwnershipConfig::default());
    }

    #[test]
    fn test_parse_rejects_unknown_severity() {
        let result = BridgeConfig::from_toml_str("[logging]\nlevel = \"loud\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ownership]\nsuspend_freedom = true").unwrap();

        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert!(config.ownership.suspend_freedom);
    }

    #[test]
    fn test_from_missing_file() {
        let result = BridgeConfig::from_file(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("LNBIND_LOG_LEVEL", "error"),
            ("LNBIND_SUSPEND_FREEDOM", "yes"),
            ("LNBIND_STALE_LOOKUP", "Fatal"),
            ("LNBIND_DEREGISTER_ON_FREE", "0"),
        ]
        .into_iter()
        .collect();

        let mut config = BridgeConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.logging.level, Severity::Error);
        assert!(config.ownership.suspend_freedom);
        assert_eq!(config.bridge.stale_lookup, StaleLookupPolicy::Fatal);
        assert!(!config.bridge.deregister_on_free);
    }

    #[test]
    fn test_override_rejects_garbage_flag() {
        let mut config = BridgeConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "LNBIND_LOG_JSON").then(|| "maybe".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key: "LNBIND_LOG_JSON", .. })
        ));
    }

    #[test]
    fn test_severity_raw_values() {
        assert_eq!(Severity::from_raw(0), Some(Severity::Debug));
        assert_eq!(Severity::from_raw(2), Some(Severity::Error));
        assert_eq!(Severity::from_raw(3), None);
        assert!(Severity::Error > Severity::Warning);
    }
}
