//! Inbound wire format of the host.
//!
//! One JSON object per line:
//!
//! ```text
//! Client ──[{"method":"Hello","args":{"role":"caster"}}]──► Host
//! Host   ──[{"method":"Connected","args":{"connection_id":"conn-1"}}]──► Client
//! Client ──[{"method":"GetSessionId"}]──► Host
//! Host   ──[{"method":"SessionID","args":"042917003"}]──► Client
//! ```
//!
//! Outbound lines are serialised [`HubMessage`](castrelay_core::HubMessage)s.

use std::fmt;

use serde::{Deserialize, Serialize};

use castrelay_core::relay::IceServer;
use castrelay_core::session::SessionMode;

// ── Role ─────────────────────────────────────────────────────────

/// What kind of peer a connection is, declared in its `Hello`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Caster,
    Viewer,
    Agent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Caster => write!(f, "caster"),
            Self::Viewer => write!(f, "viewer"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

// ── Invocation ───────────────────────────────────────────────────

/// A method call sent by a client.
///
/// Everything except `Hello` is a caster method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args")]
pub enum Invocation {
    Hello {
        role: Role,
    },
    GetSessionId,
    GetIceServers,
    ReceiveDeviceInfo {
        service_id: String,
        machine_name: String,
        device_id: String,
    },
    SetMode {
        mode: SessionMode,
    },
    ViewerConnected {
        viewer_id: String,
    },
    DisconnectViewer {
        viewer_id: String,
        notify: bool,
    },
    SendMessageToViewer {
        viewer_id: String,
        message: String,
    },
    SendConnectionRequestDenied {
        viewer_id: String,
    },
    SendConnectionFailedToViewers {
        viewer_ids: Vec<String>,
    },
    SendDtoToBrowser {
        viewer_id: String,
        dto: Vec<u8>,
    },
    SendIceCandidateToBrowser {
        viewer_id: String,
        candidate: String,
        sdp_mline_index: i32,
        sdp_mid: String,
    },
    SendRtcOfferToBrowser {
        viewer_id: String,
        sdp: String,
        #[serde(default)]
        ice_servers: Vec<IceServer>,
    },
    SendCtrlAltDelToAgent,
    NotifyRequesterUnattendedReady {
        requester_id: String,
    },
    NotifyViewersRelaunchedScreenCasterReady {
        viewer_ids: Vec<String>,
    },
}

impl Invocation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "Hello",
            Self::GetSessionId => "GetSessionId",
            Self::GetIceServers => "GetIceServers",
            Self::ReceiveDeviceInfo { .. } => "ReceiveDeviceInfo",
            Self::SetMode { .. } => "SetMode",
            Self::ViewerConnected { .. } => "ViewerConnected",
            Self::DisconnectViewer { .. } => "DisconnectViewer",
            Self::SendMessageToViewer { .. } => "SendMessageToViewer",
            Self::SendConnectionRequestDenied { .. } => "SendConnectionRequestDenied",
            Self::SendConnectionFailedToViewers { .. } => "SendConnectionFailedToViewers",
            Self::SendDtoToBrowser { .. } => "SendDtoToBrowser",
            Self::SendIceCandidateToBrowser { .. } => "SendIceCandidateToBrowser",
            Self::SendRtcOfferToBrowser { .. } => "SendRtcOfferToBrowser",
            Self::SendCtrlAltDelToAgent => "SendCtrlAltDelToAgent",
            Self::NotifyRequesterUnattendedReady { .. } => "NotifyRequesterUnattendedReady",
            Self::NotifyViewersRelaunchedScreenCasterReady { .. } => {
                "NotifyViewersRelaunchedScreenCasterReady"
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
