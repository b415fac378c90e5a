//! # castrelay-server: Relay Host
//!
//! TCP front end for `castrelay-core`. Every client speaks
//! newline-delimited JSON: it declares its role with `Hello`, then a
//! caster issues invocations that the host maps onto the relay router.
//! Viewers and agents only receive.
//!
//! When a caster's socket closes, its session is torn down and the
//! viewers are either told the caster is gone or, for unattended
//! sessions, told to wait while the agent relaunches it.

pub mod config;
pub mod protocol;
pub mod service;
