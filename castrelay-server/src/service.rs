//! Relay host service.
//!
//! Accepts TCP clients, frames them as newline-delimited JSON, and maps
//! each caster invocation onto a [`RelayRouter`] operation. Outbound
//! messages travel through a [`ChannelTransport`] queue per connection,
//! drained by a writer task into the socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

use castrelay_core::relay::RelayRouter;
use castrelay_core::session::SessionRegistry;
use castrelay_core::transport::{ChannelTransport, Transport};
use castrelay_core::{HubMessage, RelayError};

use crate::config::ServerConfig;
use crate::protocol::{Invocation, Role};

// ── RelayService ─────────────────────────────────────────────────

/// The top-level relay host.
///
/// Owns the session registry (through its router) and the transport.
/// Each accepted socket is served on its own task.
pub struct RelayService {
    config: ServerConfig,
    router: RelayRouter,
    transport: Arc<ChannelTransport>,
    running: Arc<AtomicBool>,
    next_connection: AtomicU64,
}

impl RelayService {
    /// Create a new service with the given config.
    pub fn new(config: ServerConfig) -> Self {
        let transport = Arc::new(ChannelTransport::new());
        let router = RelayRouter::new(
            Arc::new(SessionRegistry::new()),
            transport.clone(),
            config.to_relay_config(),
        );
        Self {
            config,
            router,
            transport,
            running: Arc::new(AtomicBool::new(false)),
            next_connection: AtomicU64::new(1),
        }
    }

    pub fn router(&self) -> &RelayRouter {
        &self.router
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the service is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bind the configured address and serve until stopped.
    pub async fn run(&self) -> Result<(), RelayError> {
        let listener = TcpListener::bind(&self.config.network.listen_address).await?;
        info!("relay listening on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Serve clients from an already bound listener until stopped.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), RelayError> {
        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            let accept = tokio::select! {
                result = listener.accept() => result,
                _ = Self::wait_for_stop(&self.running) => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            let connection_id = self.next_connection_id();
            info!(connection_id = %connection_id, %peer, "client connected");

            let conn = ClientConnection {
                connection_id,
                router: self.router.clone(),
                transport: Arc::clone(&self.transport),
                role: None,
            };
            let max_line_length = self.config.network.max_line_length;
            tokio::spawn(async move { conn.serve(stream, max_line_length).await });
        }

        self.running.store(false, Ordering::SeqCst);
        info!("relay service stopped");
        Ok(())
    }

    fn next_connection_id(&self) -> String {
        format!("conn-{}", self.next_connection.fetch_add(1, Ordering::Relaxed))
    }

    /// Async helper: resolves when `running` becomes false.
    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}

// ── ClientConnection ─────────────────────────────────────────────

/// One accepted socket.
struct ClientConnection {
    connection_id: String,
    router: RelayRouter,
    transport: Arc<ChannelTransport>,
    role: Option<Role>,
}

impl ClientConnection {
    async fn serve(mut self, stream: TcpStream, max_line_length: usize) {
        let id = self.connection_id.clone();
        let (mut sink, mut lines) =
            Framed::new(stream, LinesCodec::new_with_max_length(max_line_length)).split();

        // Transport queue → socket.
        let mut outbound = self.transport.register(&id);
        let writer_id = id.clone();
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                let line = match serde_json::to_string(&message) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(connection_id = %writer_id, "cannot encode {message}: {e}");
                        continue;
                    }
                };
                if let Err(e) = sink.send(line).await {
                    debug!(connection_id = %writer_id, "write error: {e}");
                    break;
                }
            }
        });

        // Socket → router.
        while let Some(read) = lines.next().await {
            let line = match read {
                Ok(line) => line,
                Err(e) => {
                    warn!(connection_id = %id, "read error: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let invocation = match serde_json::from_str::<Invocation>(&line) {
                Ok(invocation) => invocation,
                Err(e) => {
                    warn!(connection_id = %id, "malformed invocation: {e}");
                    continue;
                }
            };
            let method = invocation.name();
            if let Err(e) = self.dispatch(invocation).await {
                warn!(connection_id = %id, role = ?self.role, method, "invocation failed: {e}");
            }
        }

        if self.role == Some(Role::Caster) {
            let outcome = self.router.on_caster_disconnected(&id).await;
            debug!(connection_id = %id, ?outcome, "caster cleanup finished");
        }
        self.transport.unregister(&id);
        let _ = writer.await;
        info!(connection_id = %id, "client disconnected");
    }

    async fn dispatch(&mut self, invocation: Invocation) -> Result<(), RelayError> {
        match (invocation, self.role) {
            (Invocation::Hello { role }, None) => {
                self.role = Some(role);
                if role == Role::Caster {
                    self.router.on_caster_connected(&self.connection_id);
                }
                info!(connection_id = %self.connection_id, %role, "hello");
                self.transport
                    .send(
                        &self.connection_id,
                        HubMessage::Connected {
                            connection_id: self.connection_id.clone(),
                        },
                    )
                    .await;
                Ok(())
            }
            (Invocation::Hello { .. }, Some(_)) => {
                Err(RelayError::InvalidInvocation("duplicate hello".into()))
            }
            (other, None) => Err(RelayError::InvalidInvocation(format!(
                "{} before hello",
                other.name()
            ))),
            (other, Some(Role::Caster)) => self.invoke_caster(other).await,
            (other, Some(role)) => Err(RelayError::InvalidInvocation(format!(
                "{role} cannot call {}",
                other.name()
            ))),
        }
    }

    async fn invoke_caster(&self, invocation: Invocation) -> Result<(), RelayError> {
        let id = self.connection_id.as_str();
        let router = &self.router;
        match invocation {
            Invocation::GetSessionId => router.issue_session_code(id).await.map(|_| ()),
            Invocation::GetIceServers => {
                let servers = router.ice_servers().to_vec();
                self.transport
                    .send(id, HubMessage::IceServers(servers))
                    .await;
                Ok(())
            }
            Invocation::ReceiveDeviceInfo {
                service_id,
                machine_name,
                device_id,
            } => router.register_device_info(id, &service_id, &machine_name, &device_id),
            Invocation::SetMode { mode } => router.set_mode(id, mode),
            Invocation::ViewerConnected { viewer_id } => {
                router.add_viewer(id, &viewer_id).map(|_| ())
            }
            Invocation::DisconnectViewer { viewer_id, notify } => router
                .remove_viewer(id, &viewer_id, notify)
                .await
                .map(|_| ()),
            Invocation::SendMessageToViewer { viewer_id, message } => {
                router.send_message_to_viewer(id, &viewer_id, &message).await
            }
            Invocation::SendConnectionRequestDenied { viewer_id } => {
                router.send_connection_request_denied(id, &viewer_id).await
            }
            Invocation::SendConnectionFailedToViewers { viewer_ids } => {
                router.send_connection_failed_to_viewers(id, &viewer_ids).await
            }
            Invocation::SendDtoToBrowser { viewer_id, dto } => {
                router.send_dto_to_viewer(id, &viewer_id, dto).await
            }
            Invocation::SendIceCandidateToBrowser {
                viewer_id,
                candidate,
                sdp_mline_index,
                sdp_mid,
            } => {
                router
                    .send_ice_candidate_to_viewer(id, &viewer_id, &candidate, sdp_mline_index, &sdp_mid)
                    .await
            }
            Invocation::SendRtcOfferToBrowser {
                viewer_id,
                sdp,
                ice_servers,
            } => {
                router
                    .send_rtc_offer_to_viewer(id, &viewer_id, &sdp, ice_servers)
                    .await
            }
            Invocation::SendCtrlAltDelToAgent => router.send_ctrl_alt_del_to_agent(id).await,
            Invocation::NotifyRequesterUnattendedReady { requester_id } => {
                router.notify_unattended_ready(id, &requester_id).await
            }
            Invocation::NotifyViewersRelaunchedScreenCasterReady { viewer_ids } => {
                router.notify_viewers_relaunched(id, &viewer_ids).await
            }
            Invocation::Hello { .. } => Err(RelayError::InvalidInvocation("duplicate hello".into())),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::{Value, json};

    type Client = Framed<TcpStream, LinesCodec>;

    async fn start() -> (Arc<RelayService>, std::net::SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let service = Arc::new(RelayService::new(ServerConfig::default()));
        let svc = Arc::clone(&service);
        tokio::spawn(async move { svc.serve(listener).await });
        (service, addr)
    }

    async fn client(addr: std::net::SocketAddr) -> Client {
        Framed::new(TcpStream::connect(addr).await.unwrap(), LinesCodec::new())
    }

    async fn call(client: &mut Client, invocation: Value) {
        client.send(invocation.to_string()).await.unwrap();
    }

    async fn next(client: &mut Client) -> HubMessage {
        let line = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timeout")
            .expect("stream closed")
            .unwrap();
        serde_json::from_str(&line).unwrap()
    }

    async fn hello(client: &mut Client, role: &str) -> String {
        call(client, json!({"method": "Hello", "args": {"role": role}})).await;
        match next(client).await {
            HubMessage::Connected { connection_id } => connection_id,
            other => panic!("expected Connected, got {other:?}"),
        }
    }

    #[test]
    fn service_creates_with_defaults() {
        let svc = RelayService::new(ServerConfig::default());
        assert!(!svc.is_running());
        assert!(svc.router().registry().is_empty());
    }

    #[test]
    fn stop_handle_works() {
        let svc = RelayService::new(ServerConfig::default());
        let handle = svc.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert!(svc.is_running());
        svc.stop();
        assert!(!svc.is_running());
    }

    #[tokio::test]
    async fn caster_receives_session_code() {
        let (_service, addr) = start().await;
        let mut caster = client(addr).await;
        hello(&mut caster, "caster").await;

        call(&mut caster, json!({"method": "GetSessionId"})).await;
        match next(&mut caster).await {
            HubMessage::SessionId(code) => assert_eq!(code.len(), 9),
            other => panic!("expected SessionID, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn caster_drop_notifies_viewer() {
        let (service, addr) = start().await;
        let mut caster = client(addr).await;
        let mut viewer = client(addr).await;
        let caster_id = hello(&mut caster, "caster").await;
        let viewer_id = hello(&mut viewer, "viewer").await;

        call(
            &mut caster,
            json!({"method": "ViewerConnected", "args": {"viewer_id": viewer_id}}),
        )
        .await;
        call(
            &mut caster,
            json!({"method": "SendMessageToViewer", "args": {"viewer_id": viewer_id, "message": "hi"}}),
        )
        .await;
        assert_eq!(next(&mut viewer).await, HubMessage::ShowMessage("hi".into()));

        drop(caster);
        assert_eq!(next(&mut viewer).await, HubMessage::ScreenCasterDisconnected);
        assert!(service.router().registry().get(&caster_id).is_none());
    }

    #[tokio::test]
    async fn viewer_added_right_before_close_is_notified() {
        let (_service, addr) = start().await;
        let mut caster = client(addr).await;
        let mut viewer = client(addr).await;
        hello(&mut caster, "caster").await;
        let viewer_id = hello(&mut viewer, "viewer").await;

        // Join and close back to back: the close is handled only after
        // the join on the same connection task.
        call(
            &mut caster,
            json!({"method": "ViewerConnected", "args": {"viewer_id": viewer_id}}),
        )
        .await;
        drop(caster);

        assert_eq!(next(&mut viewer).await, HubMessage::ScreenCasterDisconnected);
    }

    #[tokio::test]
    async fn viewer_cannot_call_caster_methods() {
        let (service, addr) = start().await;
        let mut viewer = client(addr).await;
        let viewer_id = hello(&mut viewer, "viewer").await;
        call(&mut viewer, json!({"method": "GetSessionId"})).await;
        call(&mut viewer, json!({"method": "GetIceServers"})).await;

        let got = tokio::time::timeout(Duration::from_millis(200), viewer.next()).await;
        assert!(got.is_err(), "viewer should get no reply, got {got:?}");
        assert!(service.router().registry().get(&viewer_id).is_none());
    }
}
