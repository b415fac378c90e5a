//! Outbound hub messages.
//!
//! Every message the core asks the transport to deliver is one variant of
//! [`HubMessage`]. The wire name (what the remote client's handler is
//! registered under) is [`HubMessage::name`]; serde encodes a message as
//! `{"method": <name>, "args": <fields>}`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::relay::config::IceServer;

// ── HubMessage ───────────────────────────────────────────────────

/// Messages sent to casters, viewers, agents and browser requesters.
///
/// Grouped by recipient:
/// - any connection: `Connected`
/// - caster: `SessionId`, `IceServers`
/// - viewer: `ViewerRemoved` … `ReceiveRtcOffer`
/// - agent: `RestartScreenCaster`, `CtrlAltDel`
/// - requester: `UnattendedSessionReady`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args")]
pub enum HubMessage {
    // ── Any connection ───────────────────────────────────────────
    /// Handshake acknowledgement carrying the transport-assigned id.
    Connected { connection_id: String },

    // ── Caster ───────────────────────────────────────────────────
    /// The display code issued for an attended session.
    #[serde(rename = "SessionID")]
    SessionId(String),
    /// The configured ICE servers.
    IceServers(Vec<IceServer>),

    // ── Viewer ───────────────────────────────────────────────────
    /// The caster dropped this viewer.
    ViewerRemoved,
    /// The caster process is relaunching; keep the link open.
    Reconnecting,
    /// The caster is gone for good.
    ScreenCasterDisconnected,
    /// A relaunched caster is ready under a new connection id.
    RelaunchedScreenCasterReady { caster_id: String },
    /// The caster could not establish the session.
    ConnectionFailed,
    /// The user at the caster declined the request.
    ConnectionRequestDenied,
    /// A text notice from the caster.
    ShowMessage(String),
    /// An opaque, already-encoded DTO.
    SendDtoToBrowser(Vec<u8>),
    /// A WebRTC ICE candidate.
    ReceiveIceCandidate {
        candidate: String,
        sdp_mline_index: i32,
        sdp_mid: String,
    },
    /// A WebRTC SDP offer plus the ICE servers to use.
    ReceiveRtcOffer {
        sdp: String,
        ice_servers: Vec<IceServer>,
    },

    // ── Agent ────────────────────────────────────────────────────
    /// Relaunch the caster and re-link the listed viewers.
    RestartScreenCaster {
        viewer_ids: Vec<String>,
        service_id: String,
        caster_id: String,
    },
    /// Send the secure attention sequence on the controlled machine.
    CtrlAltDel,

    // ── Requester ────────────────────────────────────────────────
    /// An unattended caster is up and can be joined.
    UnattendedSessionReady { caster_id: String, device_id: String },
}

impl HubMessage {
    /// The handler name the remote side subscribes to.
    pub fn name(&self) -> &'static str {
        match self {
            HubMessage::Connected { .. } => "Connected",
            HubMessage::SessionId(_) => "SessionID",
            HubMessage::IceServers(_) => "IceServers",
            HubMessage::ViewerRemoved => "ViewerRemoved",
            HubMessage::Reconnecting => "Reconnecting",
            HubMessage::ScreenCasterDisconnected => "ScreenCasterDisconnected",
            HubMessage::RelaunchedScreenCasterReady { .. } => "RelaunchedScreenCasterReady",
            HubMessage::ConnectionFailed => "ConnectionFailed",
            HubMessage::ConnectionRequestDenied => "ConnectionRequestDenied",
            HubMessage::ShowMessage(_) => "ShowMessage",
            HubMessage::SendDtoToBrowser(_) => "SendDtoToBrowser",
            HubMessage::ReceiveIceCandidate { .. } => "ReceiveIceCandidate",
            HubMessage::ReceiveRtcOffer { .. } => "ReceiveRtcOffer",
            HubMessage::RestartScreenCaster { .. } => "RestartScreenCaster",
            HubMessage::CtrlAltDel => "CtrlAltDel",
            HubMessage::UnattendedSessionReady { .. } => "UnattendedSessionReady",
        }
    }
}

impl fmt::Display for HubMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Tests ────────────────────────────────────────────────────────
