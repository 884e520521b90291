//! Shared gateway-facing types.
//!
//! Raw provider payloads stay `serde_json::Value` until the verifier
//! normalizes them; nothing downstream of the verifier sees the raw shape.

use serde::Serialize;

/// Result of provisioning a new remote instance.
#[derive(Debug, Clone)]
pub struct ProvisionedInstance {
    /// Opaque per-instance credential. Written once, never rotated by us.
    pub token: String,
    /// Provider-reported initial status, if any.
    pub status: Option<String>,
}

/// Payload returned by a connect / QR request.
///
/// The provider answers with either a QR payload (raw text or a base64 data
/// URL), a numeric pairing code, or both. An empty payload means the request
/// was accepted but no code is available yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QrPayload {
    pub qrcode: Option<String>,
    pub pairing_code: Option<String>,
}

impl QrPayload {
    pub fn is_empty(&self) -> bool {
        self.qrcode.is_none() && self.pairing_code.is_none()
    }
}

/// The four-field conjunctive check distinguishing a genuinely connected
/// session from a transiently/partially reported one.
///
/// The gateway has been observed to report any subset of these true on its
/// own (e.g. `loggedIn: true` while `jid` is still null), so no single field
/// is trusted in isolation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerifyCriteria {
    /// Instance-level status string equals "connected".
    pub instance_connected: bool,
    /// Session-level `connected` flag.
    pub session_connected: bool,
    /// Session-level `loggedIn` flag.
    pub logged_in: bool,
    /// JID present, non-empty, and well-formed (contains the domain separator).
    pub jid_well_formed: bool,
}

impl VerifyCriteria {
    pub fn all(&self) -> bool {
        self.instance_connected && self.session_connected && self.logged_in && self.jid_well_formed
    }
}

/// Normalized verdict produced from one raw status payload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Verification {
    /// True iff all four criteria hold simultaneously.
    pub is_connected: bool,
    /// True as soon as any JID string appears, even before the other
    /// criteria hold. Earliest reliable signal that a device scanned the QR.
    pub pairing_started: bool,
    pub criteria: VerifyCriteria,
    pub profile_name: Option<String>,
    pub phone_number: Option<String>,
}
