//! Session state shared between the orchestrator and its observers.

use serde::Serialize;

/// In-memory connection state. Finer-grained than the persisted
/// `status_conexao`, which only distinguishes connected / connecting /
/// disconnected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnState {
    #[default]
    Idle,
    /// Pre-check and QR request in flight.
    Generating,
    /// QR displayed, countdown running, no scan detected yet.
    Waiting,
    /// A device scanned the code; pairing not yet complete.
    Connecting,
    /// All four verification criteria held. Terminal.
    Connected,
    /// QR countdown expired without a scan. Retriable, not an error.
    Timeout,
    /// Gateway failure, conflict, or pairing timeout. Terminal until reset.
    Error,
}

impl ConnState {
    /// States in which the poll loop is active.
    pub fn is_polling(&self) -> bool {
        matches!(self, Self::Waiting | Self::Connecting)
    }

    /// States from which no further transition happens without a reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Connected | Self::Timeout | Self::Error)
    }
}

/// Which failure path produced a session error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectErrorKind {
    /// Gateway call failed (network or non-2xx).
    Api,
    /// Pre-check conflict: the instance is already paired.
    Verification,
    /// Pairing started but did not complete in time.
    Timeout,
}

/// Tagged, human-readable session error. This is the only failure shape the
/// presentation layer ever sees; raw errors never cross this boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectError {
    pub kind: ConnectErrorKind,
    pub message: String,
}

impl ConnectError {
    pub fn new(kind: ConnectErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Read-only observable snapshot of one connection session.
///
/// One session exists per open connect flow; it is never shared across
/// instances or admin sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: ConnState,
    /// QR payload, present only while waiting for a scan.
    pub qr_code: Option<String>,
    /// Numeric pairing code, when the provider offers one alongside the QR.
    pub pairing_code: Option<String>,
    /// Seconds until the displayed QR expires.
    pub countdown: u64,
    pub error: Option<ConnectError>,
    /// Populated only once connected.
    pub profile_name: Option<String>,
    pub phone_number: Option<String>,
}
