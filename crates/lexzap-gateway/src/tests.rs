use super::client::{extract_qr, extract_token, token_tail};
use super::qr::{decode_data_url, is_data_url, render_terminal};
use super::{has_pairing_started, verify};
use serde_json::{json, Value};

/// Build a status payload from the four criteria, in the nested shape the
/// provider usually sends.
fn payload(instance_connected: bool, session_connected: bool, logged_in: bool, jid: bool) -> Value {
    json!({
        "instance": {
            "status": if instance_connected { "connected" } else { "disconnected" },
            "profileName": "Escritório Silva",
        },
        "status": {
            "connected": session_connected,
            "loggedIn": logged_in,
            "jid": if jid { json!("5511999887766:3@s.whatsapp.net") } else { Value::Null },
        },
    })
}

#[test]
fn test_verify_truth_table() {
    // is_connected must be true iff all four criteria are true.
    for bits in 0u8..16 {
        let a = bits & 1 != 0;
        let b = bits & 2 != 0;
        let c = bits & 4 != 0;
        let d = bits & 8 != 0;
        let v = verify(&payload(a, b, c, d));
        assert_eq!(
            v.is_connected,
            a && b && c && d,
            "criteria ({a},{b},{c},{d}) produced wrong verdict"
        );
        assert_eq!(v.criteria.instance_connected, a);
        assert_eq!(v.criteria.session_connected, b);
        assert_eq!(v.criteria.logged_in, c);
        assert_eq!(v.criteria.jid_well_formed, d);
    }
}

#[test]
fn test_verify_fully_connected_extracts_identity() {
    let v = verify(&payload(true, true, true, true));
    assert!(v.is_connected);
    assert_eq!(v.profile_name.as_deref(), Some("Escritório Silva"));
    assert_eq!(v.phone_number.as_deref(), Some("5511999887766"));
}

#[test]
fn test_pairing_started_depends_only_on_jid() {
    // JID present with every other field false.
    let raw = json!({ "status": { "jid": "5511999887766@s.whatsapp.net" } });
    assert!(has_pairing_started(&raw));
    assert!(verify(&raw).pairing_started);

    // Everything else true, JID absent.
    let raw = json!({
        "instance": { "status": "connected" },
        "status": { "connected": true, "loggedIn": true },
    });
    assert!(!has_pairing_started(&raw));
    assert!(!verify(&raw).pairing_started);
}

#[test]
fn test_pairing_started_rejects_empty_jid() {
    let raw = json!({ "status": { "jid": "" } });
    assert!(!has_pairing_started(&raw));
}

#[test]
fn test_malformed_jid_starts_pairing_but_fails_criteria() {
    // A JID without the domain separator signals a scan in progress but is
    // not yet a well-formed identity.
    let raw = json!({
        "instance": { "status": "connected" },
        "status": { "connected": true, "loggedIn": true, "jid": "5511999887766" },
    });
    let v = verify(&raw);
    assert!(v.pairing_started);
    assert!(!v.criteria.jid_well_formed);
    assert!(!v.is_connected);
}

#[test]
fn test_verify_top_level_string_status() {
    // Older payloads put the instance status as a top-level string and the
    // session flags at the top level.
    let raw = json!({
        "status": "connected",
        "connected": true,
        "loggedIn": true,
        "jid": "5511999887766@s.whatsapp.net",
    });
    let v = verify(&raw);
    assert!(v.is_connected, "flat payload shape must verify");
}

#[test]
fn test_verify_empty_payload_is_soft_failure() {
    let v = verify(&json!({}));
    assert!(!v.is_connected);
    assert!(!v.pairing_started);
    assert!(v.profile_name.is_none());
    assert!(v.phone_number.is_none());

    // Non-object payloads must not panic either.
    let v = verify(&json!("disconnected"));
    assert!(!v.is_connected);
}

#[test]
fn test_verify_owner_fallback_for_phone() {
    let raw = json!({
        "instance": { "status": "connected", "owner": "5511988887777" },
        "status": { "connected": true, "loggedIn": true },
    });
    let v = verify(&raw);
    assert_eq!(v.phone_number.as_deref(), Some("5511988887777"));
}

#[test]
fn test_extract_token_shapes() {
    assert_eq!(
        extract_token(&json!({ "token": "abc123" })).as_deref(),
        Some("abc123")
    );
    assert_eq!(
        extract_token(&json!({ "instance": { "token": "abc123" } })).as_deref(),
        Some("abc123")
    );
    assert_eq!(extract_token(&json!({ "token": "" })), None);
    assert_eq!(extract_token(&json!({})), None);
}

#[test]
fn test_extract_qr_shapes() {
    let qr = extract_qr(&json!({ "qrcode": "2@abc", "pairingCode": "ABCD-1234" }));
    assert_eq!(qr.qrcode.as_deref(), Some("2@abc"));
    assert_eq!(qr.pairing_code.as_deref(), Some("ABCD-1234"));

    let qr = extract_qr(&json!({ "instance": { "qrcode": "2@abc" } }));
    assert_eq!(qr.qrcode.as_deref(), Some("2@abc"));
    assert!(qr.pairing_code.is_none());

    let qr = extract_qr(&json!({ "connected": true }));
    assert!(qr.is_empty());
}

#[test]
fn test_render_terminal() {
    let out = render_terminal("2@test-pairing-data").unwrap();
    assert!(!out.is_empty());
    assert!(out.lines().count() > 10, "QR should span multiple lines");
}

#[test]
fn test_data_url_roundtrip() {
    assert!(is_data_url("data:image/png;base64,aGk="));
    assert!(!is_data_url("2@raw-qr-text"));
    assert_eq!(decode_data_url("data:image/png;base64,aGk=").unwrap(), b"hi");
    assert!(decode_data_url("2@raw-qr-text").is_err());
}

#[test]
fn test_token_tail() {
    assert_eq!(token_tail("abcdef123456"), "3456");
    assert_eq!(token_tail("ab"), "ab");
}
