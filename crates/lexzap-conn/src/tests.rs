use crate::machine::{step, Event};
use crate::orchestrator::ConnectOrchestrator;
use crate::session::{ConnState, ConnectErrorKind, SessionSnapshot};
use async_trait::async_trait;
use lexzap_core::{
    config::ConnectConfig,
    error::ZapError,
    traits::InstanceGateway,
    types::{ProvisionedInstance, QrPayload, Verification, VerifyCriteria},
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{advance, Duration};

/// Gateway fake fed a script of status payloads. Once the script drains,
/// the last payload repeats; with `fail_when_empty` it errors instead.
struct FakeGateway {
    statuses: Mutex<VecDeque<Value>>,
    last: Mutex<Value>,
    fail_when_empty: bool,
    status_calls: AtomicUsize,
    qr_requests: AtomicUsize,
}

impl FakeGateway {
    fn scripted(script: Vec<Value>) -> Self {
        Self {
            statuses: Mutex::new(script.into()),
            last: Mutex::new(json!({})),
            fail_when_empty: false,
            status_calls: AtomicUsize::new(0),
            qr_requests: AtomicUsize::new(0),
        }
    }

    fn failing_after(script: Vec<Value>) -> Self {
        Self {
            fail_when_empty: true,
            ..Self::scripted(script)
        }
    }
}

#[async_trait]
impl InstanceGateway for FakeGateway {
    async fn create_instance(&self, _name: &str) -> Result<ProvisionedInstance, ZapError> {
        Ok(ProvisionedInstance {
            token: "fake-token".to_string(),
            status: None,
        })
    }

    async fn get_status(&self, _token: &str) -> Result<Value, ZapError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(v) => {
                *self.last.lock().unwrap() = v.clone();
                Ok(v)
            }
            None if self.fail_when_empty => Err(ZapError::Gateway("connection refused".into())),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }

    async fn request_qr_code(&self, _token: &str) -> Result<QrPayload, ZapError> {
        self.qr_requests.fetch_add(1, Ordering::SeqCst);
        Ok(QrPayload {
            qrcode: Some("2@fake-qr".to_string()),
            pairing_code: Some("ABCD-1234".to_string()),
        })
    }

    async fn logout(&self, _token: &str) -> Result<(), ZapError> {
        Ok(())
    }

    async fn delete_instance(&self, _token: &str) -> Result<(), ZapError> {
        Ok(())
    }
}

fn tuning() -> ConnectConfig {
    ConnectConfig {
        poll_interval_secs: 5,
        qr_ttl_secs: 120,
        pairing_timeout_secs: 30,
    }
}

fn disconnected() -> Value {
    json!({ "instance": { "status": "disconnected" } })
}

fn pairing_started() -> Value {
    // JID appeared but the session is not logged in yet.
    json!({
        "instance": { "status": "disconnected" },
        "status": { "connected": false, "loggedIn": false, "jid": "5511999887766@s.whatsapp.net" },
    })
}

fn fully_connected() -> Value {
    json!({
        "instance": { "status": "connected", "profileName": "Dra. Ana Paula" },
        "status": { "connected": true, "loggedIn": true, "jid": "5511999887766:7@s.whatsapp.net" },
    })
}

/// Let the spawned driver task make progress without moving the clock.
async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

// --- pure machine tests ---

fn waiting_snap(countdown: u64) -> SessionSnapshot {
    SessionSnapshot {
        state: ConnState::Waiting,
        qr_code: Some("2@qr".to_string()),
        countdown,
        ..Default::default()
    }
}

fn verdict(is_connected: bool, pairing: bool) -> Verification {
    Verification {
        is_connected,
        pairing_started: pairing,
        criteria: VerifyCriteria::default(),
        profile_name: is_connected.then(|| "Dra. Ana Paula".to_string()),
        phone_number: is_connected.then(|| "5511999887766".to_string()),
    }
}

#[test]
fn test_countdown_decrements_only_while_waiting() {
    let snap = step(waiting_snap(10), Event::CountdownTick);
    assert_eq!(snap.countdown, 9);
    assert_eq!(snap.state, ConnState::Waiting);

    let mut connecting = waiting_snap(10);
    connecting.state = ConnState::Connecting;
    let snap = step(connecting, Event::CountdownTick);
    assert_eq!(snap.countdown, 10, "connecting is governed by the pairing deadline");
}

#[test]
fn test_countdown_expiry_forces_timeout() {
    let snap = step(waiting_snap(1), Event::CountdownTick);
    assert_eq!(snap.state, ConnState::Timeout);
    assert_eq!(snap.countdown, 0);
    assert!(snap.qr_code.is_none(), "expired QR must not linger");
}

#[test]
fn test_expired_countdown_beats_same_tick_pairing_signal() {
    // Fail-safe: expiry wins even when the poll in the same tick reports a
    // scan. The admin just retries; a false "connected" would be worse.
    let snap = step(waiting_snap(0), Event::Poll(&verdict(false, true)));
    assert_eq!(snap.state, ConnState::Timeout);
}

#[test]
fn test_poll_moves_waiting_to_connecting_on_pairing() {
    let snap = step(waiting_snap(60), Event::Poll(&verdict(false, true)));
    assert_eq!(snap.state, ConnState::Connecting);
}

#[test]
fn test_poll_completes_from_waiting_or_connecting() {
    // A fast scan can satisfy all four criteria within one poll interval.
    let snap = step(waiting_snap(60), Event::Poll(&verdict(true, true)));
    assert_eq!(snap.state, ConnState::Connected);
    assert_eq!(snap.profile_name.as_deref(), Some("Dra. Ana Paula"));

    let mut connecting = waiting_snap(60);
    connecting.state = ConnState::Connecting;
    let snap = step(connecting, Event::Poll(&verdict(true, true)));
    assert_eq!(snap.state, ConnState::Connected);
    assert_eq!(snap.phone_number.as_deref(), Some("5511999887766"));
    assert!(snap.qr_code.is_none());
}

#[test]
fn test_pairing_deadline_only_interrupts_connecting() {
    let mut connecting = waiting_snap(60);
    connecting.state = ConnState::Connecting;
    let snap = step(connecting, Event::PairingDeadline);
    assert_eq!(snap.state, ConnState::Error);
    assert_eq!(snap.error.as_ref().unwrap().kind, ConnectErrorKind::Timeout);

    let snap = step(waiting_snap(60), Event::PairingDeadline);
    assert_eq!(snap.state, ConnState::Waiting, "deadline is armed only while connecting");
}

#[test]
fn test_poll_is_noop_in_terminal_states() {
    for state in [ConnState::Idle, ConnState::Connected, ConnState::Timeout, ConnState::Error] {
        let mut snap = SessionSnapshot::default();
        snap.state = state;
        let next = step(snap.clone(), Event::Poll(&verdict(true, true)));
        assert_eq!(next.state, state, "late poll must not disturb {state:?}");
    }
}

// --- orchestrator tests (paused clock, scripted gateway) ---

#[tokio::test(start_paused = true)]
async fn test_start_enters_waiting_with_qr() {
    let gw = Arc::new(FakeGateway::scripted(vec![disconnected()]));
    let orch = ConnectOrchestrator::new(gw.clone(), "tok", tuning());

    orch.start_connection().await.unwrap();
    settle().await;

    let snap = orch.snapshot();
    assert_eq!(snap.state, ConnState::Waiting);
    assert_eq!(snap.qr_code.as_deref(), Some("2@fake-qr"));
    assert_eq!(snap.pairing_code.as_deref(), Some("ABCD-1234"));
    assert_eq!(snap.countdown, 120);
    assert_eq!(gw.qr_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_progresses_without_subscribers() {
    // Hook-only consumers never call subscribe(); snapshot() must still
    // reflect every transition, not stay stuck at idle.
    let gw = Arc::new(FakeGateway::scripted(vec![disconnected(), fully_connected()]));
    let orch = ConnectOrchestrator::new(gw, "tok", tuning());

    orch.start_connection().await.unwrap();
    settle().await;
    assert_eq!(orch.snapshot().state, ConnState::Waiting);

    advance(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(orch.snapshot().state, ConnState::Connected);

    // A subscriber arriving after the fact sees the current state.
    let mut rx = orch.subscribe();
    assert_eq!(rx.borrow_and_update().state, ConnState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_already_connected_precheck_blocks_qr() {
    let gw = Arc::new(FakeGateway::scripted(vec![fully_connected()]));
    let orch = ConnectOrchestrator::new(gw.clone(), "tok", tuning());

    orch.start_connection().await.unwrap();
    settle().await;

    let snap = orch.snapshot();
    assert_eq!(snap.state, ConnState::Error);
    let err = snap.error.unwrap();
    assert_eq!(err.kind, ConnectErrorKind::Verification);
    assert!(err.message.contains("conectado"), "message was: {}", err.message);
    assert_eq!(
        gw.qr_requests.load(Ordering::SeqCst),
        0,
        "no QR may be requested for a paired instance"
    );
}

#[tokio::test(start_paused = true)]
async fn test_gradual_pairing_reaches_connected() {
    // Pre-check, then three polls: no jid; jid but not logged in; all four.
    let gw = Arc::new(FakeGateway::scripted(vec![
        disconnected(),
        disconnected(),
        pairing_started(),
        fully_connected(),
    ]));
    let orch = ConnectOrchestrator::new(gw.clone(), "tok", tuning());
    let connected_with: Arc<Mutex<Option<(Option<String>, Option<String>)>>> =
        Arc::new(Mutex::new(None));
    let seen = Arc::clone(&connected_with);
    let orch = orch.on_connected(move |profile, phone| {
        *seen.lock().unwrap() = Some((profile.map(String::from), phone.map(String::from)));
    });

    orch.start_connection().await.unwrap();
    settle().await;
    assert_eq!(orch.snapshot().state, ConnState::Waiting);

    advance(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(orch.snapshot().state, ConnState::Waiting, "jid still null");

    advance(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(orch.snapshot().state, ConnState::Connecting, "jid appeared");

    advance(Duration::from_secs(5)).await;
    settle().await;

    let snap = orch.snapshot();
    assert_eq!(snap.state, ConnState::Connected);
    assert_eq!(snap.profile_name.as_deref(), Some("Dra. Ana Paula"));
    assert_eq!(snap.phone_number.as_deref(), Some("5511999887766"));

    let hook = connected_with.lock().unwrap().clone().expect("hook fired");
    assert_eq!(hook.0.as_deref(), Some("Dra. Ana Paula"));
    assert_eq!(hook.1.as_deref(), Some("5511999887766"));
}

#[tokio::test(start_paused = true)]
async fn test_qr_countdown_expires_to_timeout() {
    let gw = Arc::new(FakeGateway::scripted(vec![disconnected()]));
    let cfg = ConnectConfig {
        qr_ttl_secs: 3,
        ..tuning()
    };
    let orch = ConnectOrchestrator::new(gw, "tok", cfg);

    orch.start_connection().await.unwrap();
    settle().await;
    assert_eq!(orch.snapshot().state, ConnState::Waiting);

    advance(Duration::from_secs(4)).await;
    settle().await;

    let snap = orch.snapshot();
    assert_eq!(snap.state, ConnState::Timeout);
    assert_eq!(snap.countdown, 0);
    assert!(snap.qr_code.is_none());
    assert!(snap.error.is_none(), "timeout is an expected outcome, not an error");
}

#[tokio::test(start_paused = true)]
async fn test_pairing_deadline_errors_out() {
    // The jid appears but pairing never completes.
    let gw = Arc::new(FakeGateway::scripted(vec![
        disconnected(),
        pairing_started(),
    ]));
    let orch = ConnectOrchestrator::new(gw, "tok", tuning());

    orch.start_connection().await.unwrap();
    settle().await;

    advance(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(orch.snapshot().state, ConnState::Connecting);

    advance(Duration::from_secs(31)).await;
    settle().await;

    let snap = orch.snapshot();
    assert_eq!(snap.state, ConnState::Error);
    assert_eq!(snap.error.unwrap().kind, ConnectErrorKind::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_gateway_failure_mid_poll_stops_session() {
    let gw = Arc::new(FakeGateway::failing_after(vec![disconnected()]));
    let orch = ConnectOrchestrator::new(gw, "tok", tuning());
    let errors = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&errors);
    let orch = orch.on_error(move |err| {
        assert_eq!(err.kind, ConnectErrorKind::Api);
        seen.fetch_add(1, Ordering::SeqCst);
    });

    orch.start_connection().await.unwrap();
    settle().await;
    assert_eq!(orch.snapshot().state, ConnState::Waiting);

    advance(Duration::from_secs(5)).await;
    settle().await;

    let snap = orch.snapshot();
    assert_eq!(snap.state, ConnState::Error);
    assert_eq!(snap.error.unwrap().kind, ConnectErrorKind::Api);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_double_start_is_rejected() {
    let gw = Arc::new(FakeGateway::scripted(vec![disconnected()]));
    let orch = ConnectOrchestrator::new(gw, "tok", tuning());

    orch.start_connection().await.unwrap();
    let second = orch.start_connection().await;
    assert!(matches!(second, Err(ZapError::Verification(_))));
}

#[tokio::test(start_paused = true)]
async fn test_reset_is_idempotent_and_kills_timers() {
    let gw = Arc::new(FakeGateway::scripted(vec![disconnected()]));
    let orch = ConnectOrchestrator::new(gw.clone(), "tok", tuning());

    orch.start_connection().await.unwrap();
    settle().await;
    assert_eq!(orch.snapshot().state, ConnState::Waiting);

    orch.reset_connection().await;
    orch.reset_connection().await;
    settle().await;
    assert_eq!(orch.snapshot(), SessionSnapshot::default());

    // No timer may survive the reset: a minute later, not a single further
    // snapshot and not a single further status call.
    let mut rx = orch.subscribe();
    rx.borrow_and_update();
    let calls_before = gw.status_calls.load(Ordering::SeqCst);
    advance(Duration::from_secs(60)).await;
    settle().await;
    assert!(!rx.has_changed().unwrap());
    assert_eq!(gw.status_calls.load(Ordering::SeqCst), calls_before);

    // And the session is startable again after reset.
    orch.start_connection().await.unwrap();
    settle().await;
    assert_eq!(orch.snapshot().state, ConnState::Waiting);
}

#[tokio::test(start_paused = true)]
async fn test_hidden_view_suspends_polling_but_not_countdown() {
    let gw = Arc::new(FakeGateway::scripted(vec![disconnected(), fully_connected()]));
    let orch = ConnectOrchestrator::new(gw.clone(), "tok", tuning());

    orch.start_connection().await.unwrap();
    settle().await;
    assert_eq!(orch.snapshot().state, ConnState::Waiting);
    let precheck_calls = gw.status_calls.load(Ordering::SeqCst);

    orch.set_visible(false);
    settle().await;
    advance(Duration::from_secs(20)).await;
    settle().await;

    let snap = orch.snapshot();
    assert_eq!(snap.state, ConnState::Waiting, "no poll may run while hidden");
    assert_eq!(gw.status_calls.load(Ordering::SeqCst), precheck_calls);
    assert_eq!(snap.countdown, 100, "countdown keeps wall-clock meaning while hidden");

    // Becoming visible re-polls immediately, catching the completed pairing.
    orch.set_visible(true);
    settle().await;
    assert_eq!(orch.snapshot().state, ConnState::Connected);
}
