//! Caster disconnect handling.
//!
//! Runs once per caster disconnect, on the snapshot taken right after the
//! session left the registry:
//!
//! ```text
//!  Normal ──────────────────────────► ScreenCasterDisconnected → viewers
//!  Unattended, viewers, agent ──────► Reconnecting → viewers
//!                                     RestartScreenCaster → agent
//!  Unattended, no viewers ──────────► (nothing)
//! ```
//!
//! There is no retry. Viewers told to wait stay waiting until a
//! relaunched caster calls `notify_viewers_relaunched`.

use tracing::{info, warn};

use crate::message::HubMessage;
use crate::session::{SessionMode, SessionSnapshot};
use crate::transport::Transport;

/// What the coordinator did for a departed caster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The connection had no session.
    NoSession,
    /// Viewers were told the caster is gone.
    ViewersNotified { viewers: usize },
    /// Viewers were told to wait and the agent was asked to relaunch.
    RelaunchRequested {
        agent_service_id: String,
        viewers: usize,
    },
    /// Unattended session without viewers; nothing to do.
    Idle,
}

/// Send the disconnect fan-out for `snapshot`.
pub async fn handle_caster_disconnect(
    transport: &dyn Transport,
    snapshot: &SessionSnapshot,
) -> DisconnectOutcome {
    let caster_id = snapshot.caster_id.as_str();
    let viewers = &snapshot.viewers;

    match snapshot.mode {
        SessionMode::Normal => notify_lost(transport, snapshot).await,
        SessionMode::Unattended if viewers.is_empty() => {
            info!(caster_id, "unattended caster left without viewers");
            DisconnectOutcome::Idle
        }
        SessionMode::Unattended => {
            let Some(agent) = snapshot.agent_service_id.clone() else {
                warn!(
                    caster_id,
                    mode = %snapshot.mode,
                    "unattended caster has no agent on record; ending session"
                );
                return notify_lost(transport, snapshot).await;
            };

            transport
                .send_many(viewers, HubMessage::Reconnecting)
                .await;
            transport
                .send(
                    &agent,
                    HubMessage::RestartScreenCaster {
                        viewer_ids: viewers.clone(),
                        service_id: agent.clone(),
                        caster_id: caster_id.to_owned(),
                    },
                )
                .await;

            info!(
                caster_id,
                agent = %agent,
                viewers = viewers.len(),
                "requested caster relaunch"
            );
            DisconnectOutcome::RelaunchRequested {
                agent_service_id: agent,
                viewers: viewers.len(),
            }
        }
    }
}

async fn notify_lost(transport: &dyn Transport, snapshot: &SessionSnapshot) -> DisconnectOutcome {
    transport
        .send_many(&snapshot.viewers, HubMessage::ScreenCasterDisconnected)
        .await;
    info!(
        caster_id = %snapshot.caster_id,
        viewers = snapshot.viewers.len(),
        "caster disconnected"
    );
    DisconnectOutcome::ViewersNotified {
        viewers: snapshot.viewers.len(),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use chrono::Utc;

    fn snapshot(mode: SessionMode, agent: Option<&str>, viewers: &[&str]) -> SessionSnapshot {
        SessionSnapshot {
            caster_id: "caster-1".into(),
            start_time: Utc::now(),
            session_code: None,
            mode,
            agent_service_id: agent.map(str::to_owned),
            device_id: Some("device-1".into()),
            machine_name: None,
            viewers: viewers.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn unattended_without_agent_falls_back_to_disconnect() {
        let transport = ChannelTransport::new();
        let mut v1 = transport.register("v1");
        let outcome =
            handle_caster_disconnect(&transport, &snapshot(SessionMode::Unattended, None, &["v1"]))
                .await;
        assert_eq!(outcome, DisconnectOutcome::ViewersNotified { viewers: 1 });
        assert_eq!(v1.try_recv().ok(), Some(HubMessage::ScreenCasterDisconnected));
    }

    #[tokio::test]
    async fn unattended_restart_names_departed_caster() {
        let transport = ChannelTransport::new();
        let mut agent = transport.register("agent-1");
        let _v1 = transport.register("v1");
        handle_caster_disconnect(
            &transport,
            &snapshot(SessionMode::Unattended, Some("agent-1"), &["v1"]),
        )
        .await;
        match agent.try_recv().ok() {
            Some(HubMessage::RestartScreenCaster {
                caster_id,
                service_id,
                viewer_ids,
            }) => {
                assert_eq!(caster_id, "caster-1");
                assert_eq!(service_id, "agent-1");
                assert_eq!(viewer_ids, vec!["v1"]);
            }
            other => panic!("unexpected agent message: {other:?}"),
        }
    }
}
