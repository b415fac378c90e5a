//! # Relay
//!
//! Session-scoped message routing between casters, viewers and agents.
//!
//! ```text
//!  caster ──[invocation]──► RelayRouter ──► SessionRegistry (lookup)
//!                               │
//!                               └──► Transport::send ──► viewer / agent
//!
//!  caster socket closed ──► RelayRouter::on_caster_disconnected
//!                               ├─► SessionRegistry::remove (snapshot)
//!                               └─► reconnect::handle_caster_disconnect
//! ```
//!
//! | Module      | Purpose                                             |
//! |-------------|-----------------------------------------------------|
//! | `config`    | WebRTC flag and ICE servers                         |
//! | `router`    | Per-operation validation and forwarding             |
//! | `reconnect` | Disconnect fan-out and agent relaunch request       |

pub mod config;
pub mod reconnect;
pub mod router;

// ── Re-exports ───────────────────────────────────────────────────

pub use config::{IceServer, RelayConfig};
pub use reconnect::{DisconnectOutcome, handle_caster_disconnect};
pub use router::{RelayPayload, RelayRouter, generate_session_code};
