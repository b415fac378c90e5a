//! Configuration for the relay host service.

use std::path::Path;

use serde::{Deserialize, Serialize};

use castrelay_core::relay::{IceServer, RelayConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// WebRTC signalling settings.
    pub webrtc: WebRtcConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the TCP listener binds to.
    pub listen_address: String,
    /// Longest accepted invocation line, in bytes.
    pub max_line_length: usize,
}

/// WebRTC configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebRtcConfig {
    /// Relay ICE candidates and SDP offers between casters and viewers.
    pub enabled: bool,
    /// ICE servers handed to casters.
    pub ice_servers: Vec<IceServer>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:5120".into(),
            max_line_length: 16 * 1024 * 1024,
        }
    }
}

impl Default for WebRtcConfig {
    fn default() -> Self {
        let relay = RelayConfig::default();
        Self {
            enabled: relay.webrtc_enabled,
            ice_servers: relay.ice_servers,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ServerConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Settings consumed by the relay router.
    pub fn to_relay_config(&self) -> RelayConfig {
        RelayConfig {
            webrtc_enabled: self.webrtc.enabled,
            ice_servers: self.webrtc.ice_servers.clone(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
