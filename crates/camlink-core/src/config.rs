//! Configuration system for camlink.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $CAMLINK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/camlink/config.toml
//!   3. ~/.config/camlink/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::wire::{
    DEFAULT_FRAME_ID_MODULUS, DEFAULT_MAX_FRAGMENT_SIZE, FRAME_ID_CEILING, MAX_FRAGMENT_PAYLOAD,
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CamlinkConfig {
    pub network: NetworkConfig,
    pub stream: StreamConfig,
    pub command: CommandConfig,
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Where the producer sends video datagrams.
    pub peer_host: String,
    /// UDP port of the video channel.
    pub video_port: u16,
    /// Local address the viewer and command listener bind to.
    pub bind_host: String,
    /// Producer address the viewer sends commands to.
    pub command_host: String,
    /// TCP port of the command channel.
    pub command_port: u16,
    /// HTTP port of the viewer's presentation API.
    pub api_port: u16,
    /// SO_SNDBUF / SO_RCVBUF for the video sockets.
    pub socket_buffer_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Largest fragment payload in bytes.
    pub max_fragment_size: usize,
    pub target_fps: u32,
    pub frame_id_modulus: u32,
    /// How long an incomplete frame may wait for its fragments.
    pub reassembly_timeout_ms: u64,
    /// Pause after a failed frame send.
    pub send_error_backoff_ms: u64,
    /// Metadata announcing a larger frame is dropped.
    pub max_frame_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// How long the server waits for a connected client to send its request.
    pub receive_timeout_ms: u64,
    /// Connect + response timeout used by command clients.
    pub client_timeout_ms: u64,
    /// Viewer-side coordinate sync period. 0 = never.
    pub sync_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// `"test_pattern"`, or a directory of `.jpg` files replayed in a loop.
    pub source: String,
    /// Approximate size of each synthetic test-pattern frame.
    pub test_pattern_bytes: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            peer_host: "127.0.0.1".to_string(),
            video_port: 9001,
            bind_host: "0.0.0.0".to_string(),
            command_host: "127.0.0.1".to_string(),
            command_port: 9002,
            api_port: 5000,
            socket_buffer_bytes: 65_536,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_fragment_size: DEFAULT_MAX_FRAGMENT_SIZE,
            target_fps: 30,
            frame_id_modulus: DEFAULT_FRAME_ID_MODULUS,
            reassembly_timeout_ms: 100,
            send_error_backoff_ms: 1_000,
            max_frame_bytes: 4 * 1024 * 1024,
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 500,
            client_timeout_ms: 2_000,
            sync_interval_secs: 10,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: TEST_PATTERN_SOURCE.to_string(),
            test_pattern_bytes: 20_000,
        }
    }
}

/// `camera.source` value selecting the synthetic frame generator.
pub const TEST_PATTERN_SOURCE: &str = "test_pattern";

impl StreamConfig {
    pub fn reassembly_timeout(&self) -> Duration {
        Duration::from_millis(self.reassembly_timeout_ms)
    }

    pub fn send_error_backoff(&self) -> Duration {
        Duration::from_millis(self.send_error_backoff_ms)
    }

    /// Capture period for the target frame rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }
}

impl CommandConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_millis(self.client_timeout_ms)
    }
}

impl NetworkConfig {
    pub fn video_target(&self) -> String {
        format!("{}:{}", self.peer_host, self.video_port)
    }

    pub fn video_bind(&self) -> String {
        format!("{}:{}", self.bind_host, self.video_port)
    }

    pub fn command_bind(&self) -> String {
        format!("{}:{}", self.bind_host, self.command_port)
    }

    pub fn command_target(&self) -> String {
        format!("{}:{}", self.command_host, self.command_port)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("camlink")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl CamlinkConfig {
    /// Load config: env vars → file → defaults, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::read_file(&Self::file_path())?.resolve()
    }

    /// Parse the file at `path`, or defaults when it does not exist.
    pub fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(CamlinkConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Apply env overrides on top of `self`, then validate the result.
    pub fn resolve(mut self) -> Result<Self, ConfigError> {
        self.apply_env_overrides();
        self.validate()?;
        Ok(self)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CAMLINK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&CamlinkConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Reject settings the protocol cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.stream;
        if s.max_fragment_size == 0 || s.max_fragment_size > MAX_FRAGMENT_PAYLOAD {
            return Err(ConfigError::Invalid {
                field: "stream.max_fragment_size",
                reason: format!("must be within 1..={MAX_FRAGMENT_PAYLOAD}"),
            });
        }
        if s.target_fps == 0 {
            return Err(ConfigError::Invalid {
                field: "stream.target_fps",
                reason: "must be positive".into(),
            });
        }
        if s.frame_id_modulus == 0 || s.frame_id_modulus >= FRAME_ID_CEILING {
            return Err(ConfigError::Invalid {
                field: "stream.frame_id_modulus",
                reason: format!("must be within 1..{FRAME_ID_CEILING:#x}"),
            });
        }
        if s.reassembly_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "stream.reassembly_timeout_ms",
                reason: "must be positive".into(),
            });
        }
        if self.command.receive_timeout_ms == 0 || self.command.client_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "command",
                reason: "timeouts must be positive".into(),
            });
        }
        Ok(())
    }

    /// Apply CAMLINK_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CAMLINK_NETWORK__PEER_HOST") {
            self.network.peer_host = v;
        }
        if let Ok(v) = std::env::var("CAMLINK_NETWORK__COMMAND_HOST") {
            self.network.command_host = v;
        }
        if let Ok(v) = std::env::var("CAMLINK_NETWORK__VIDEO_PORT") {
            if let Ok(p) = v.parse() {
                self.network.video_port = p;
            }
        }
        if let Ok(v) = std::env::var("CAMLINK_NETWORK__COMMAND_PORT") {
            if let Ok(p) = v.parse() {
                self.network.command_port = p;
            }
        }
        if let Ok(v) = std::env::var("CAMLINK_NETWORK__API_PORT") {
            if let Ok(p) = v.parse() {
                self.network.api_port = p;
            }
        }
        if let Ok(v) = std::env::var("CAMLINK_STREAM__MAX_FRAGMENT_SIZE") {
            if let Ok(n) = v.parse() {
                self.stream.max_fragment_size = n;
            }
        }
        if let Ok(v) = std::env::var("CAMLINK_STREAM__TARGET_FPS") {
            if let Ok(n) = v.parse() {
                self.stream.target_fps = n;
            }
        }
        if let Ok(v) = std::env::var("CAMLINK_CAMERA__SOURCE") {
            self.camera.source = v;
        }
    }
}
