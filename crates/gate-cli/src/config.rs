//! Reads/writes `~/.gesturegate/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gate_kernel::PermissionMatrix;
use gate_middleware::{LinkWriterConfig, SerialConfig, default_port};
use gate_runtime::AccessConfig;
use gate_types::GateError;
use serde::{Deserialize, Serialize};

/// Persisted controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Serial device of the actuator board.
    #[serde(default = "default_serial_port")]
    pub serial_port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Card detections must score strictly above this.
    #[serde(default = "default_card_threshold")]
    pub card_threshold: f32,

    /// Commands that may wait for the link before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_toggle_cooldown_ms")]
    pub toggle_cooldown_ms: u64,

    #[serde(default = "default_writer_poll_ms")]
    pub writer_poll_ms: u64,

    #[serde(default = "default_writer_join_timeout_ms")]
    pub writer_join_timeout_ms: u64,

    /// Role → allowed tokens.  Replaces the built-in matrix when present.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permissions: BTreeMap<String, Vec<String>>,
}

fn default_serial_port() -> String {
    default_port().to_string()
}
fn default_baud_rate() -> u32 {
    gate_middleware::link::DEFAULT_BAUD_RATE
}
fn default_card_threshold() -> f32 {
    gate_runtime::DEFAULT_CARD_THRESHOLD
}
fn default_queue_capacity() -> usize {
    gate_middleware::DEFAULT_CHANNEL_CAPACITY
}
fn default_debounce_ms() -> u64 {
    1500
}
fn default_toggle_cooldown_ms() -> u64 {
    2000
}
fn default_writer_poll_ms() -> u64 {
    1000
}
fn default_writer_join_timeout_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: default_serial_port(),
            baud_rate: default_baud_rate(),
            card_threshold: default_card_threshold(),
            queue_capacity: default_queue_capacity(),
            debounce_ms: default_debounce_ms(),
            toggle_cooldown_ms: default_toggle_cooldown_ms(),
            writer_poll_ms: default_writer_poll_ms(),
            writer_join_timeout_ms: default_writer_join_timeout_ms(),
            permissions: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            port: self.serial_port.clone(),
            baud_rate: self.baud_rate,
            ..SerialConfig::default()
        }
    }

    pub fn writer_config(&self) -> LinkWriterConfig {
        LinkWriterConfig {
            capacity: self.queue_capacity,
            poll_interval: Duration::from_millis(self.writer_poll_ms),
            join_timeout: Duration::from_millis(self.writer_join_timeout_ms),
        }
    }

    pub fn access_config(&self) -> AccessConfig {
        AccessConfig {
            card_threshold: self.card_threshold,
            debounce_window: Duration::from_millis(self.debounce_ms),
            toggle_cooldown: Duration::from_millis(self.toggle_cooldown_ms),
        }
    }

    /// The configured permission table, or the standard matrix when none is
    /// set.
    pub fn permission_matrix(&self) -> Result<PermissionMatrix, GateError> {
        if self.permissions.is_empty() {
            Ok(PermissionMatrix::standard())
        } else {
            PermissionMatrix::from_table(&self.permissions)
        }
    }
}

/// Return the path to `~/.gesturegate/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".gesturegate").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
/// `GATE_*` environment overrides are applied on top of the file.
pub fn load() -> Result<Option<Config>, GateError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, GateError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| GateError::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| GateError::Config(format!("failed to parse {}: {e}", path.display())))
}

/// Apply `GATE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `GATE_SERIAL_PORT` | `serial_port` |
/// | `GATE_BAUD_RATE` | `baud_rate` |
/// | `GATE_CARD_THRESHOLD` | `card_threshold` |
/// | `GATE_QUEUE_CAPACITY` | `queue_capacity` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("GATE_SERIAL_PORT") {
        cfg.serial_port = v;
    }
    if let Ok(v) = std::env::var("GATE_BAUD_RATE")
        && let Ok(baud) = v.parse()
    {
        cfg.baud_rate = baud;
    }
    if let Ok(v) = std::env::var("GATE_CARD_THRESHOLD")
        && let Ok(threshold) = v.parse::<f32>()
        && (0.0..=1.0).contains(&threshold)
    {
        cfg.card_threshold = threshold;
    }
    if let Ok(v) = std::env::var("GATE_QUEUE_CAPACITY")
        && let Ok(capacity) = v.parse()
    {
        cfg.queue_capacity = capacity;
    }
}

/// Save the config to disk, creating `~/.gesturegate/` if necessary.
pub fn save(cfg: &Config) -> Result<(), GateError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), GateError> {
    let io_err = |what: &str, e: std::io::Error| GateError::Config(format!("{what}: {e}"));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err("failed to create config directory", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| io_err("failed to restrict config directory", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| GateError::Config(format!("failed to serialize config: {e}")))?;

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| io_err(&format!("failed to write {}", path.display()), e))?;
    }
    #[cfg(not(unix))]
    {
        fs::write(path, raw)
            .map_err(|e| io_err(&format!("failed to write {}", path.display()), e))?;
    }
    Ok(())
}
