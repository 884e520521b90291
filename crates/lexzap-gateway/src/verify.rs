//! Tolerant status verification.
//!
//! The gateway's status payload is provider-controlled and inconsistent:
//! `status` may be a plain string or a nested object, and identity/profile
//! fields appear either at the top level or under an `instance` key. This
//! module reads every observed path, treats absence as false/null, and never
//! errors. Nothing past this boundary sees the raw shape.

use lexzap_core::types::{Verification, VerifyCriteria};
use serde_json::Value;

/// Run the full four-criterion check against one raw status payload.
///
/// `is_connected` is true iff all four criteria hold simultaneously. Any
/// single-field check produces false positives: the provider has been seen
/// reporting `loggedIn: true` with a null JID mid-pairing.
pub fn verify(raw: &Value) -> Verification {
    let jid = extract_jid(raw);

    let criteria = VerifyCriteria {
        instance_connected: instance_status(raw)
            .map(|s| s.eq_ignore_ascii_case("connected"))
            .unwrap_or(false),
        session_connected: session_flag(raw, "connected"),
        logged_in: session_flag(raw, "loggedIn"),
        jid_well_formed: jid
            .as_deref()
            .map(|j| !j.is_empty() && j.contains('@'))
            .unwrap_or(false),
    };

    let is_connected = criteria.all();

    Verification {
        is_connected,
        pairing_started: jid.as_deref().map(|j| !j.is_empty()).unwrap_or(false),
        criteria,
        profile_name: str_at(raw, &[&["instance", "profileName"], &["profileName"]]),
        phone_number: jid.as_deref().and_then(phone_from_jid).or_else(|| {
            str_at(raw, &[&["instance", "owner"], &["owner"]])
        }),
    }
}

/// True the moment any identity token (JID) appears in the payload, even
/// before the remaining criteria hold. This is the signal that a device
/// scanned the code and pairing is in progress.
pub fn has_pairing_started(raw: &Value) -> bool {
    extract_jid(raw)
        .map(|j| !j.is_empty())
        .unwrap_or(false)
}

/// Instance-level status string: `instance.status`, or top-level `status`
/// when the provider sends it as a plain string.
fn instance_status(raw: &Value) -> Option<String> {
    if let Some(s) = raw.pointer("/instance/status").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    raw.get("status").and_then(Value::as_str).map(str::to_string)
}

/// Session-level boolean: under the `status` object when it is one, or at
/// the top level.
fn session_flag(raw: &Value, key: &str) -> bool {
    if let Some(obj) = raw.get("status").filter(|v| v.is_object()) {
        if let Some(b) = obj.get(key).and_then(Value::as_bool) {
            return b;
        }
    }
    raw.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn extract_jid(raw: &Value) -> Option<String> {
    str_at(raw, &[&["status", "jid"], &["jid"], &["instance", "jid"]])
}

/// First non-null string found at any of the given paths.
fn str_at(raw: &Value, paths: &[&[&str]]) -> Option<String> {
    for path in paths {
        let mut cur = raw;
        let mut found = true;
        for key in *path {
            match cur.get(key) {
                Some(v) => cur = v,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if found {
            if let Some(s) = cur.as_str() {
                return Some(s.to_string());
            }
        }
    }
    None
}

/// Derive the bare phone number from a JID like `5511999887766:3@s.whatsapp.net`.
fn phone_from_jid(jid: &str) -> Option<String> {
    let local = jid.split('@').next()?;
    let number = local.split(':').next()?;
    if number.is_empty() {
        None
    } else {
        Some(number.to_string())
    }
}
