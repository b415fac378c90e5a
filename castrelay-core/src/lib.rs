//! # castrelay-core
//!
//! Core library of the castrelay remote-desktop relay.
//!
//! This crate contains:
//! - **Frame**: `DiffEngine` / `FrameTracker`: parallel change-region
//!   detection between consecutive captures
//! - **Session**: `SessionRegistry` of per-caster `Session`s and their viewers
//! - **Relay**: `RelayRouter`: validated forwarding of signalling and
//!   control messages, plus the caster-disconnect reconnection logic
//! - **Message**: `HubMessage`: every message the core can emit
//! - **Transport**: the `Transport` delivery seam and `ChannelTransport`
//! - **Error**: `RelayError`: typed, `thiserror`-based error hierarchy

pub mod error;
pub mod frame;
pub mod message;
pub mod relay;
pub mod session;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use error::RelayError;
pub use frame::{ChangeRegion, DiffEngine, DiffStrategy, Frame, FrameDiff, FrameTracker, PixelFormat};
pub use message::HubMessage;
pub use relay::{DisconnectOutcome, IceServer, RelayConfig, RelayPayload, RelayRouter};
pub use session::{Session, SessionMode, SessionRegistry, SessionSnapshot};
pub use transport::{ChannelTransport, Transport};
