//! Per-caster session state.
//!
//! A [`Session`] lives for exactly as long as its caster connection. It is
//! shared between concurrent router calls through an `Arc`, so every
//! mutable part sits behind its own lock: the descriptive fields behind
//! one, the viewer list behind another. Viewer joins and leaves on one
//! session therefore never contend with anything but each other.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// ── SessionMode ──────────────────────────────────────────────────

/// How the caster was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionMode {
    /// Started by a person at the machine; losing it ends the session.
    #[default]
    Normal,
    /// Started by the agent; the agent may relaunch it.
    Unattended,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Unattended => write!(f, "Unattended"),
        }
    }
}

// ── SessionInfo ──────────────────────────────────────────────────

/// Descriptive fields filled in after the caster connects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SessionInfo {
    session_code: Option<String>,
    mode: SessionMode,
    agent_service_id: Option<String>,
    device_id: Option<String>,
    machine_name: Option<String>,
}

// ── Session ──────────────────────────────────────────────────────

/// Server-side state of one caster connection.
#[derive(Debug)]
pub struct Session {
    caster_id: String,
    start_time: DateTime<Utc>,
    info: Mutex<SessionInfo>,
    /// Join order, no duplicates.
    viewers: Mutex<Vec<String>>,
}

impl Session {
    pub fn new(caster_id: impl Into<String>) -> Self {
        Self {
            caster_id: caster_id.into(),
            start_time: Utc::now(),
            info: Mutex::new(SessionInfo::default()),
            viewers: Mutex::new(Vec::new()),
        }
    }

    pub fn caster_id(&self) -> &str {
        &self.caster_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    // ── Descriptive fields ───────────────────────────────────────

    pub fn session_code(&self) -> Option<String> {
        self.info.lock().session_code.clone()
    }

    pub fn set_session_code(&self, code: impl Into<String>) {
        self.info.lock().session_code = Some(code.into());
    }

    pub fn mode(&self) -> SessionMode {
        self.info.lock().mode
    }

    pub fn set_mode(&self, mode: SessionMode) {
        self.info.lock().mode = mode;
    }

    pub fn agent_service_id(&self) -> Option<String> {
        self.info.lock().agent_service_id.clone()
    }

    pub fn device_id(&self) -> Option<String> {
        self.info.lock().device_id.clone()
    }

    pub fn machine_name(&self) -> Option<String> {
        self.info.lock().machine_name.clone()
    }

    /// Record the identity reported by the caster.
    pub fn set_device_info(
        &self,
        agent_service_id: impl Into<String>,
        machine_name: impl Into<String>,
        device_id: impl Into<String>,
    ) {
        let mut info = self.info.lock();
        info.agent_service_id = Some(agent_service_id.into());
        info.machine_name = Some(machine_name.into());
        info.device_id = Some(device_id.into());
    }

    // ── Viewers ──────────────────────────────────────────────────

    /// Append a viewer. Returns `false` if it was already present.
    pub fn add_viewer(&self, viewer_id: &str) -> bool {
        let mut viewers = self.viewers.lock();
        if viewers.iter().any(|v| v == viewer_id) {
            return false;
        }
        viewers.push(viewer_id.to_owned());
        true
    }

    /// Remove a viewer. Returns `false` if it was not present.
    pub fn remove_viewer(&self, viewer_id: &str) -> bool {
        let mut viewers = self.viewers.lock();
        match viewers.iter().position(|v| v == viewer_id) {
            Some(index) => {
                viewers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Copy of the viewer list in join order.
    pub fn viewers(&self) -> Vec<String> {
        self.viewers.lock().clone()
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.lock().len()
    }

    /// Owned copy of everything, for disconnect handling.
    ///
    /// The viewer list is copied under its lock, so the snapshot never
    /// observes a half-applied join or leave.
    pub fn snapshot(&self) -> SessionSnapshot {
        let info = self.info.lock().clone();
        let viewers = self.viewers();
        SessionSnapshot {
            caster_id: self.caster_id.clone(),
            start_time: self.start_time,
            session_code: info.session_code,
            mode: info.mode,
            agent_service_id: info.agent_service_id,
            device_id: info.device_id,
            machine_name: info.machine_name,
            viewers,
        }
    }
}

// ── SessionSnapshot ──────────────────────────────────────────────

/// Immutable copy of a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub caster_id: String,
    pub start_time: DateTime<Utc>,
    pub session_code: Option<String>,
    pub mode: SessionMode,
    pub agent_service_id: Option<String>,
    pub device_id: Option<String>,
    pub machine_name: Option<String>,
    pub viewers: Vec<String>,
}

// ── Tests ────────────────────────────────────────────────────────
