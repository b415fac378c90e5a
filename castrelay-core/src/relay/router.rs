//! Caster-facing relay operations.
//!
//! Every operation starts by looking up the caller's [`Session`]; a caller
//! without one gets [`RelayError::SessionNotFound`] and nothing is sent.
//! Payloads are forwarded verbatim, the router never looks inside them.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::message::HubMessage;
use crate::relay::config::{IceServer, RelayConfig};
use crate::relay::reconnect::{self, DisconnectOutcome};
use crate::session::{Session, SessionMode, SessionRegistry};
use crate::transport::Transport;

// ── RelayPayload ─────────────────────────────────────────────────

/// Opaque payloads a caster may push to viewers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayPayload {
    ShowMessage(String),
    ConnectionRequestDenied,
    ConnectionFailed,
    Dto(Vec<u8>),
    IceCandidate {
        candidate: String,
        sdp_mline_index: i32,
        sdp_mid: String,
    },
    RtcOffer {
        sdp: String,
        ice_servers: Vec<IceServer>,
    },
}

impl RelayPayload {
    /// ICE and SDP payloads are subject to the WebRTC feature flag.
    pub fn is_webrtc(&self) -> bool {
        matches!(self, Self::IceCandidate { .. } | Self::RtcOffer { .. })
    }

    fn into_message(self) -> HubMessage {
        match self {
            Self::ShowMessage(text) => HubMessage::ShowMessage(text),
            Self::ConnectionRequestDenied => HubMessage::ConnectionRequestDenied,
            Self::ConnectionFailed => HubMessage::ConnectionFailed,
            Self::Dto(bytes) => HubMessage::SendDtoToBrowser(bytes),
            Self::IceCandidate {
                candidate,
                sdp_mline_index,
                sdp_mid,
            } => HubMessage::ReceiveIceCandidate {
                candidate,
                sdp_mline_index,
                sdp_mid,
            },
            Self::RtcOffer { sdp, ice_servers } => HubMessage::ReceiveRtcOffer { sdp, ice_servers },
        }
    }
}

// ── Session codes ────────────────────────────────────────────────

/// Nine digits: three independent, zero-padded groups of `000`–`999`.
pub fn generate_session_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..3)
        .map(|_| format!("{:03}", rng.gen_range(0..=999u16)))
        .collect()
}

// ── RelayRouter ──────────────────────────────────────────────────

/// Stateless routing over a shared [`SessionRegistry`].
///
/// Cheap to clone; clones share the registry and transport.
#[derive(Clone)]
pub struct RelayRouter {
    registry: Arc<SessionRegistry>,
    transport: Arc<dyn Transport>,
    config: Arc<RelayConfig>,
}

impl RelayRouter {
    pub fn new(
        registry: Arc<SessionRegistry>,
        transport: Arc<dyn Transport>,
        config: RelayConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Configured ICE servers, for the caster's peer connection.
    pub fn ice_servers(&self) -> &[IceServer] {
        &self.config.ice_servers
    }

    fn session(&self, connection_id: &str) -> Result<Arc<Session>, RelayError> {
        self.registry.get(connection_id).ok_or_else(|| {
            warn!(connection_id, "operation on connection without a session");
            RelayError::SessionNotFound(connection_id.to_owned())
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// A caster connected: register its session.
    pub fn on_caster_connected(&self, connection_id: &str) -> Arc<Session> {
        let session = self.registry.create(connection_id);
        info!(connection_id, sessions = self.registry.len(), "caster connected");
        session
    }

    /// A caster disconnected: drop its session, then notify viewers or
    /// ask the agent to relaunch.
    ///
    /// The viewer list is read once, right after the session leaves the
    /// registry. Calls for the same caster must not run concurrently with
    /// this one: an `add_viewer` already past its registry lookup can land
    /// after the snapshot and that viewer is never notified. The host
    /// meets this by handling each caster connection's invocations and its
    /// close in sequence on one task.
    pub async fn on_caster_disconnected(&self, connection_id: &str) -> DisconnectOutcome {
        let Some(session) = self.registry.remove(connection_id) else {
            warn!(connection_id, "disconnect for connection without a session");
            return DisconnectOutcome::NoSession;
        };
        debug!(connection_id, sessions = self.registry.len(), "session removed");
        let snapshot = session.snapshot();
        reconnect::handle_caster_disconnect(self.transport.as_ref(), &snapshot).await
    }

    // ── Session setup ────────────────────────────────────────────

    /// Issue a new display code and send it back to the caster.
    pub async fn issue_session_code(&self, connection_id: &str) -> Result<String, RelayError> {
        let session = self.session(connection_id)?;
        let code = generate_session_code(&mut rand::thread_rng());
        session.set_session_code(code.clone());
        debug!(connection_id, "issued session code");
        self.transport
            .send(connection_id, HubMessage::SessionId(code.clone()))
            .await;
        Ok(code)
    }

    /// Record the caster's agent service id, machine name and device id.
    pub fn register_device_info(
        &self,
        connection_id: &str,
        agent_service_id: &str,
        machine_name: &str,
        device_id: &str,
    ) -> Result<(), RelayError> {
        let session = self.session(connection_id)?;
        session.set_device_info(agent_service_id, machine_name, device_id);
        debug!(connection_id, machine_name, device_id, "device info registered");
        Ok(())
    }

    /// Record how the caster was launched.
    pub fn set_mode(&self, connection_id: &str, mode: SessionMode) -> Result<(), RelayError> {
        let session = self.session(connection_id)?;
        session.set_mode(mode);
        debug!(connection_id, %mode, "session mode set");
        Ok(())
    }

    // ── Viewers ──────────────────────────────────────────────────

    /// A viewer joined. Returns `false` if it was already linked.
    pub fn add_viewer(&self, connection_id: &str, viewer_id: &str) -> Result<bool, RelayError> {
        let session = self.session(connection_id)?;
        let added = session.add_viewer(viewer_id);
        if added {
            info!(connection_id, viewer_id, "viewer joined");
        } else {
            debug!(connection_id, viewer_id, "viewer already linked");
        }
        Ok(added)
    }

    /// Unlink a viewer, optionally telling it so.
    pub async fn remove_viewer(
        &self,
        connection_id: &str,
        viewer_id: &str,
        notify: bool,
    ) -> Result<bool, RelayError> {
        let session = self.session(connection_id)?;
        let removed = session.remove_viewer(viewer_id);
        info!(connection_id, viewer_id, removed, "viewer dropped");
        if notify {
            self.transport
                .send(viewer_id, HubMessage::ViewerRemoved)
                .await;
        }
        Ok(removed)
    }

    // ── Relay ────────────────────────────────────────────────────

    /// Forward `payload` from the caster to `targets`.
    ///
    /// WebRTC payloads are dropped without error while WebRTC is off.
    pub async fn relay(
        &self,
        connection_id: &str,
        targets: &[String],
        payload: RelayPayload,
    ) -> Result<(), RelayError> {
        if payload.is_webrtc() && !self.config.webrtc_enabled {
            return Ok(());
        }
        self.session(connection_id)?;

        let message = payload.into_message();
        debug!(connection_id, %message, targets = targets.len(), "relaying");
        match targets {
            [single] => self.transport.send(single, message).await,
            many => self.transport.send_many(many, message).await,
        }
        Ok(())
    }

    pub async fn send_message_to_viewer(
        &self,
        connection_id: &str,
        viewer_id: &str,
        text: &str,
    ) -> Result<(), RelayError> {
        self.relay(
            connection_id,
            &[viewer_id.to_owned()],
            RelayPayload::ShowMessage(text.to_owned()),
        )
        .await
    }

    pub async fn send_connection_request_denied(
        &self,
        connection_id: &str,
        viewer_id: &str,
    ) -> Result<(), RelayError> {
        self.relay(
            connection_id,
            &[viewer_id.to_owned()],
            RelayPayload::ConnectionRequestDenied,
        )
        .await
    }

    pub async fn send_connection_failed_to_viewers(
        &self,
        connection_id: &str,
        viewer_ids: &[String],
    ) -> Result<(), RelayError> {
        self.relay(connection_id, viewer_ids, RelayPayload::ConnectionFailed)
            .await
    }

    pub async fn send_dto_to_viewer(
        &self,
        connection_id: &str,
        viewer_id: &str,
        dto: Vec<u8>,
    ) -> Result<(), RelayError> {
        self.relay(connection_id, &[viewer_id.to_owned()], RelayPayload::Dto(dto))
            .await
    }

    pub async fn send_ice_candidate_to_viewer(
        &self,
        connection_id: &str,
        viewer_id: &str,
        candidate: &str,
        sdp_mline_index: i32,
        sdp_mid: &str,
    ) -> Result<(), RelayError> {
        self.relay(
            connection_id,
            &[viewer_id.to_owned()],
            RelayPayload::IceCandidate {
                candidate: candidate.to_owned(),
                sdp_mline_index,
                sdp_mid: sdp_mid.to_owned(),
            },
        )
        .await
    }

    pub async fn send_rtc_offer_to_viewer(
        &self,
        connection_id: &str,
        viewer_id: &str,
        sdp: &str,
        ice_servers: Vec<IceServer>,
    ) -> Result<(), RelayError> {
        self.relay(
            connection_id,
            &[viewer_id.to_owned()],
            RelayPayload::RtcOffer {
                sdp: sdp.to_owned(),
                ice_servers,
            },
        )
        .await
    }

    // ── Agent / requester ────────────────────────────────────────

    /// Ask the caster's agent to send Ctrl-Alt-Del.
    pub async fn send_ctrl_alt_del_to_agent(&self, connection_id: &str) -> Result<(), RelayError> {
        let session = self.session(connection_id)?;
        let agent = session
            .agent_service_id()
            .ok_or_else(|| RelayError::MissingAgent(connection_id.to_owned()))?;
        self.transport.send(&agent, HubMessage::CtrlAltDel).await;
        Ok(())
    }

    /// Tell a waiting requester that this unattended caster is ready.
    pub async fn notify_unattended_ready(
        &self,
        connection_id: &str,
        requester_id: &str,
    ) -> Result<(), RelayError> {
        let session = self.session(connection_id)?;
        let message = HubMessage::UnattendedSessionReady {
            caster_id: connection_id.to_owned(),
            device_id: session.device_id().unwrap_or_default(),
        };
        self.transport.send(requester_id, message).await;
        Ok(())
    }

    /// A relaunched caster tells the viewers of its predecessor where to
    /// reconnect.
    pub async fn notify_viewers_relaunched(
        &self,
        connection_id: &str,
        viewer_ids: &[String],
    ) -> Result<(), RelayError> {
        self.session(connection_id)?;
        info!(
            connection_id,
            viewers = viewer_ids.len(),
            "relaunched caster ready"
        );
        self.transport
            .send_many(
                viewer_ids,
                HubMessage::RelaunchedScreenCasterReady {
                    caster_id: connection_id.to_owned(),
                },
            )
            .await;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
