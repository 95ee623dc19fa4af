//! TOML-based configuration for the host tool.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\ukbdc\config.toml`
//! - Linux:    `~/.config/ukbdc/config.toml`
//! - macOS:    `~/Library/Application Support/ukbdc/config.toml`
//!
//! A different file can be passed explicitly (the CLI's `--config` flag).
//!
//! # Example
//!
//! ```toml
//! [device]
//! vendor_id = 0x16c0
//! product_id = 0x047c
//! timeout_ms = 1000
//!
//! [layout]
//! no_keys = 64
//! no_layers = 4
//!
//! [mnemonics]
//! A = 4
//! ESC = 41
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "some_fn")]`, so a missing file,
//! a missing section, and a missing key all fall back to the same defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ukbdc_core::MnemonicTable;

use crate::application::session::{
    SessionConfig, DEFAULT_INTERFACE, DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub layout: LayoutDefaults,
    #[serde(default)]
    pub log: LogConfig,
    /// Scancode names accepted by `ukbdc set --scancode` and shown by `ukbdc show`.
    #[serde(default)]
    pub mnemonics: BTreeMap<String, u8>,
}

/// USB identity and timing of the controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
    #[serde(default = "default_product_id")]
    pub product_id: u16,
    /// Interface carrying the bulk endpoints.
    #[serde(default = "default_interface")]
    pub interface: u8,
    /// Deadline for every packet write or status read, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Pause between status polls while the device flashes a page.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Geometry used for `ukbdc new` when no size is given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutDefaults {
    #[serde(default = "default_no_keys")]
    pub no_keys: usize,
    #[serde(default = "default_no_layers")]
    pub no_layers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_vendor_id() -> u16 {
    DEFAULT_VENDOR_ID
}
fn default_product_id() -> u16 {
    DEFAULT_PRODUCT_ID
}
fn default_interface() -> u8 {
    DEFAULT_INTERFACE
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_poll_interval_ms() -> u64 {
    1
}
fn default_no_keys() -> usize {
    64
}
fn default_no_layers() -> usize {
    4
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
            interface: default_interface(),
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for LayoutDefaults {
    fn default() -> Self {
        Self {
            no_keys: default_no_keys(),
            no_layers: default_no_layers(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl DeviceConfig {
    /// Converts the on-disk settings into a [`SessionConfig`].
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            interface: self.interface,
            timeout: Duration::from_millis(self.timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

impl AppConfig {
    /// Builds the scancode name table from the `[mnemonics]` section.
    pub fn mnemonic_table(&self) -> MnemonicTable {
        self.mnemonics
            .iter()
            .map(|(name, &code)| (name.as_str(), code))
            .collect()
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, or from the platform default location when
/// `path` is `None`.  A file that does not exist yields `AppConfig::default()`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Resolves the platform config base directory including the `ukbdc` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ukbdc"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("ukbdc"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("ukbdc")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ukbdc_core::ScancodeTable;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ukbdc_cfg_{tag}_{}", std::process::id()))
    }

    // ── AppConfig defaults ────────────────────────────────────────────────────

    #[test]
    fn test_app_config_default_targets_the_controller() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.device.vendor_id, 0x16c0);
        assert_eq!(cfg.device.product_id, 0x047c);
        assert_eq!(cfg.device.interface, 1);
        assert_eq!(cfg.device.timeout_ms, 1000);
    }

    #[test]
    fn test_app_config_default_layout_is_64_keys_by_4_layers() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.layout.no_keys, 64);
        assert_eq!(cfg.layout.no_layers, 4);
    }

    #[test]
    fn test_log_config_default_level_is_info() {
        assert_eq!(LogConfig::default().level, "info");
    }

    #[test]
    fn test_session_config_converts_milliseconds() {
        let mut device = DeviceConfig::default();
        device.timeout_ms = 250;
        device.poll_interval_ms = 5;

        let session = device.session_config();

        assert_eq!(session.timeout, Duration::from_millis(250));
        assert_eq!(session.poll_interval, Duration::from_millis(5));
        assert_eq!(session.vendor_id, 0x16c0);
    }

    // ── TOML parsing ──────────────────────────────────────────────────────────

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        // Act
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");

        // Assert
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_deserialize_partial_device_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[device]
product_id = 0x1234
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.device.product_id, 0x1234);
        // Unspecified fields keep their defaults
        assert_eq!(cfg.device.vendor_id, 0x16c0);
        assert_eq!(cfg.device.poll_interval_ms, 1);
    }

    #[test]
    fn test_mnemonics_section_builds_case_insensitive_table() {
        // Arrange
        let toml_str = r#"
[mnemonics]
A = 4
ESC = 41
"#;
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize mnemonics");

        // Act
        let table = cfg.mnemonic_table();

        // Assert
        assert_eq!(table.scancode("a"), Some(4));
        assert_eq!(table.scancode("Esc"), Some(41));
        assert_eq!(table.mnemonic(41), Some("ESC"));
    }

    #[test]
    fn test_deserialize_invalid_toml_returns_parse_error() {
        let result: Result<AppConfig, toml::de::Error> = toml::from_str("[[[ not valid toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_app_config_serializes_and_deserializes_round_trip() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.device.timeout_ms = 500;
        cfg.layout.no_keys = 32;
        cfg.mnemonics.insert("SPACE".to_string(), 44);

        // Act
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg, restored);
    }

    // ── load_config ───────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");

        let cfg = load_config(Some(&path)).unwrap();

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_load_config_reports_malformed_file() {
        let dir = temp_dir("bad");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[device\nvendor_id = ").unwrap();

        let result = load_config(Some(&path));

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_reads_written_file_via_temp_dir() {
        // Arrange
        let dir = temp_dir("roundtrip");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.log.level = "debug".to_string();
        cfg.device.poll_interval_ms = 3;
        std::fs::write(&path, toml::to_string_pretty(&cfg).unwrap()).unwrap();

        // Act
        let loaded = load_config(Some(&path)).unwrap();

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("ukbdc/config.toml"),
                "unexpected config path {path:?}"
            );
        }
        // NoPlatformConfigDir is acceptable in a stripped environment.
    }
}
