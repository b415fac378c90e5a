//! Read-only deployment settings consumed by the relay router.

use serde::{Deserialize, Serialize};

/// One STUN/TURN server handed to casters for WebRTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    /// Server URLs, e.g. `stun:stun.l.google.com:19302`.
    pub urls: String,
    /// TURN username, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// TURN credential, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    /// A server that needs no credentials (STUN).
    pub fn stun(urls: impl Into<String>) -> Self {
        Self {
            urls: urls.into(),
            username: None,
            credential: None,
        }
    }
}

/// Settings for [`RelayRouter`](crate::relay::RelayRouter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Relay ICE candidates and SDP offers. When `false` those calls are
    /// accepted and dropped.
    pub webrtc_enabled: bool,
    /// ICE servers returned to casters.
    pub ice_servers: Vec<IceServer>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            webrtc_enabled: true,
            ice_servers: vec![IceServer::stun("stun:stun.l.google.com:19302")],
        }
    }
}
