//! Configuration vault – reads/writes `~/.jointpose/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use jointpose_types::PoseError;

/// Where joint commands go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// A rosbridge_server WebSocket.
    #[default]
    Rosbridge,
    /// No robot: commands are only logged.
    Sim,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Rosbridge => write!(f, "rosbridge"),
            TransportKind::Sim => write!(f, "sim"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = PoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rosbridge" => Ok(Self::Rosbridge),
            "sim" => Ok(Self::Sim),
            other => Err(PoseError::Config(format!("unknown transport: {other}"))),
        }
    }
}

/// Persisted user configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// rosbridge_server WebSocket URL.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    /// Playback rate in rows per second when `-r` is not given.
    #[serde(default = "default_playback_rate")]
    pub playback_rate: u32,

    #[serde(default)]
    pub transport: TransportKind,

    /// Use the keyboard when neither `-j` nor `-i` is given.
    #[serde(default = "default_true")]
    pub keyboard_default: bool,

    /// Joint delta per unit of stick deflection.
    #[serde(default = "default_joystick_scale")]
    pub joystick_scale: f64,

    #[serde(default = "default_pad_type")]
    pub pad_type: String,

    /// Optional TOML key map replacing the built-in keyboard bindings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bindings_path: Option<PathBuf>,

    /// Publish groups, in publish order.
    #[serde(default = "default_groups")]
    pub groups: Vec<String>,
}

fn default_rosbridge_url() -> String {
    "ws://localhost:9090".to_string()
}
fn default_playback_rate() -> u32 {
    30
}
fn default_true() -> bool {
    true
}
fn default_joystick_scale() -> f64 {
    0.001
}
fn default_pad_type() -> String {
    "xbox".to_string()
}
fn default_groups() -> Vec<String> {
    vec!["left".to_string(), "right".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rosbridge_url: default_rosbridge_url(),
            playback_rate: default_playback_rate(),
            transport: TransportKind::default(),
            keyboard_default: true,
            joystick_scale: default_joystick_scale(),
            pad_type: default_pad_type(),
            bindings_path: None,
            groups: default_groups(),
        }
    }
}

/// Return the path to `~/.jointpose/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".jointpose").join("config.toml")
}

/// Load the default config file, falling back to built-in defaults when it
/// does not exist.  Environment overrides are applied either way.
pub fn load_or_default() -> Result<Config, PoseError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load an explicitly requested config file; a missing file is an error.
pub fn load_required(path: &Path) -> Result<Config, PoseError> {
    let mut cfg = load_from(path)?.ok_or_else(|| {
        PoseError::Config(format!("config file {} does not exist", path.display()))
    })?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Parse the config at `path`.  Returns `None` if the file does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, PoseError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| PoseError::io(path.display(), e))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| PoseError::Config(format!("failed to parse {}: {e}", path.display())))?;
    if cfg.playback_rate == 0 {
        return Err(PoseError::Config("playback_rate must be at least 1".to_string()));
    }
    Ok(Some(cfg))
}

/// Apply `JOINTPOSE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `JOINTPOSE_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `JOINTPOSE_RATE` | `playback_rate` |
/// | `JOINTPOSE_TRANSPORT` | `transport` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("JOINTPOSE_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
    if let Ok(v) = std::env::var("JOINTPOSE_RATE")
        && let Ok(rate) = v.parse::<u32>()
        && rate >= 1
    {
        cfg.playback_rate = rate;
    }
    if let Ok(v) = std::env::var("JOINTPOSE_TRANSPORT")
        && let Ok(transport) = v.parse::<TransportKind>()
    {
        cfg.transport = transport;
    }
}

/// Write `cfg` to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), PoseError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PoseError::io(parent.display(), e))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| PoseError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| PoseError::io(path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, Config::default());
        assert_eq!(loaded.rosbridge_url, "ws://localhost:9090");
        assert_eq!(loaded.playback_rate, 30);
        assert_eq!(loaded.groups, vec!["left", "right"]);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "transport = \"sim\"\nkeyboard_default = false\n").unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.transport, TransportKind::Sim);
        assert!(!cfg.keyboard_default);
        assert_eq!(cfg.pad_type, "xbox");
    }

    #[test]
    fn zero_rate_in_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "playback_rate = 0\n").unwrap();
        assert!(matches!(load_from(&path), Err(PoseError::Config(_))));
    }

    #[test]
    fn garbage_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "rosbridge_url = [").unwrap();
        assert!(matches!(load_from(&path), Err(PoseError::Config(_))));
    }

    #[test]
    fn config_path_points_to_jointpose_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".jointpose"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn missing_file_is_none_but_required_file_errors() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("absent.toml");
        assert!(load_from(&path).expect("no error").is_none());
        assert!(matches!(load_required(&path), Err(PoseError::Config(_))));
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        // SAFETY: the only test touching these variables.
        unsafe {
            std::env::set_var("JOINTPOSE_ROSBRIDGE_URL", "ws://baxter:9090");
            std::env::set_var("JOINTPOSE_RATE", "0");
            std::env::set_var("JOINTPOSE_TRANSPORT", "sim");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.rosbridge_url, "ws://baxter:9090");
        assert_eq!(cfg.playback_rate, 30);
        assert_eq!(cfg.transport, TransportKind::Sim);

        unsafe { std::env::set_var("JOINTPOSE_RATE", "60") };
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.playback_rate, 60);
        unsafe {
            std::env::remove_var("JOINTPOSE_ROSBRIDGE_URL");
            std::env::remove_var("JOINTPOSE_RATE");
            std::env::remove_var("JOINTPOSE_TRANSPORT");
        }
    }
}
