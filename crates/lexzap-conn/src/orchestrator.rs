//! Timer loop driving one connection session.
//!
//! The orchestrator owns no transition logic of its own: it ticks timers,
//! polls the gateway, applies [`machine::step`], and publishes the resulting
//! snapshot on a watch channel. The gateway is injected so tests can script
//! it.

use crate::machine::{self, Event};
use crate::session::{ConnState, ConnectError, ConnectErrorKind, SessionSnapshot};
use lexzap_core::{config::ConnectConfig, error::ZapError, traits::InstanceGateway};
use lexzap_gateway::verify;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Called once when a session reaches `connected`, with the verified profile
/// name and phone number.
pub type ConnectedHook = Arc<dyn Fn(Option<&str>, Option<&str>) + Send + Sync>;
/// Called once when a session ends in `error`.
pub type ErrorHook = Arc<dyn Fn(&ConnectError) + Send + Sync>;

/// Orchestrates the connect flow for one instance:
/// `idle → generating → waiting → connecting → connected`, with
/// `timeout`/`error` branches.
///
/// One orchestrator per open connect flow. Concurrent admin sessions against
/// the same instance are not coordinated here; the remote provider's own
/// single-active-QR semantics arbitrate that race.
pub struct ConnectOrchestrator {
    gateway: Arc<dyn InstanceGateway>,
    instance_token: String,
    tuning: ConnectConfig,
    snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
    visible_tx: watch::Sender<bool>,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    on_connected: Option<ConnectedHook>,
    on_error: Option<ErrorHook>,
}

impl ConnectOrchestrator {
    pub fn new(
        gateway: Arc<dyn InstanceGateway>,
        instance_token: impl Into<String>,
        tuning: ConnectConfig,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        let (visible_tx, _) = watch::channel(true);
        Self {
            gateway,
            instance_token: instance_token.into(),
            tuning,
            snapshot_tx: Arc::new(snapshot_tx),
            visible_tx,
            started: AtomicBool::new(false),
            task: Mutex::new(None),
            on_connected: None,
            on_error: None,
        }
    }

    /// Register a hook fired when the session reaches `connected`.
    pub fn on_connected<F>(mut self, hook: F) -> Self
    where
        F: Fn(Option<&str>, Option<&str>) + Send + Sync + 'static,
    {
        self.on_connected = Some(Arc::new(hook));
        self
    }

    /// Register a hook fired when the session ends in `error`.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ConnectError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Observe session snapshots. The receiver sees every state change plus
    /// each countdown tick.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Suspend or resume polling, e.g. when the hosting view loses focus.
    ///
    /// Only the poll loop pauses: the QR keeps expiring on the provider side
    /// regardless, so the countdown keeps ticking. Becoming visible again
    /// triggers an immediate poll through the same path as the interval
    /// loop, so a pairing completed while hidden is not missed.
    pub fn set_visible(&self, visible: bool) {
        self.visible_tx.send_replace(visible);
    }

    /// Begin a connection session. Rejected while a session is already
    /// running: starting twice would double the polling timers.
    pub async fn start_connection(&self) -> Result<(), ZapError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ZapError::Verification(
                "connection session already started; reset it first".to_string(),
            ));
        }

        let driver = Driver {
            gateway: Arc::clone(&self.gateway),
            token: self.instance_token.clone(),
            tuning: self.tuning,
            tx: Arc::clone(&self.snapshot_tx),
            visible: self.visible_tx.subscribe(),
            on_connected: self.on_connected.clone(),
            on_error: self.on_error.clone(),
        };

        *self.task.lock().await = Some(tokio::spawn(driver.run()));
        Ok(())
    }

    /// Abort the session and return to `idle`. Safe from any state,
    /// including mid-poll, and idempotent: all timers die with the driver
    /// task.
    pub async fn reset_connection(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
        self.snapshot_tx.send_replace(SessionSnapshot::default());
        self.started.store(false, Ordering::SeqCst);
    }
}

struct Driver {
    gateway: Arc<dyn InstanceGateway>,
    token: String,
    tuning: ConnectConfig,
    tx: Arc<watch::Sender<SessionSnapshot>>,
    visible: watch::Receiver<bool>,
    on_connected: Option<ConnectedHook>,
    on_error: Option<ErrorHook>,
}

impl Driver {
    async fn run(self) {
        let snap = self.drive().await;

        match snap.state {
            ConnState::Connected => {
                info!(
                    "instance connected as {} ({})",
                    snap.profile_name.as_deref().unwrap_or("?"),
                    snap.phone_number.as_deref().unwrap_or("?"),
                );
                if let Some(hook) = &self.on_connected {
                    hook(snap.profile_name.as_deref(), snap.phone_number.as_deref());
                }
            }
            ConnState::Error => {
                if let Some(err) = &snap.error {
                    warn!("connection session failed ({:?}): {}", err.kind, err.message);
                    if let Some(hook) = &self.on_error {
                        hook(err);
                    }
                }
            }
            ConnState::Timeout => info!("QR code expired without a scan"),
            _ => {}
        }
    }

    /// Run the session to a terminal snapshot.
    async fn drive(&self) -> SessionSnapshot {
        let mut snap = SessionSnapshot {
            state: ConnState::Generating,
            ..Default::default()
        };
        self.publish(&snap);

        // Pre-check before any QR request: asking the provider for a QR on
        // an already-paired instance starts an accidental disconnect.
        let raw = match self.gateway.get_status(&self.token).await {
            Ok(raw) => raw,
            Err(e) => return self.finish_error(snap, ConnectErrorKind::Api, e.to_string()),
        };
        if verify(&raw).is_connected {
            return self.finish_error(
                snap,
                ConnectErrorKind::Verification,
                "WhatsApp já conectado nesta instância. Desconecte antes de gerar um novo QR code.",
            );
        }

        let qr = match self.gateway.request_qr_code(&self.token).await {
            Ok(qr) if !qr.is_empty() => qr,
            Ok(_) => {
                return self.finish_error(
                    snap,
                    ConnectErrorKind::Api,
                    "o gateway não retornou um QR code",
                )
            }
            Err(e) => return self.finish_error(snap, ConnectErrorKind::Api, e.to_string()),
        };

        snap.state = ConnState::Waiting;
        snap.qr_code = qr.qrcode;
        snap.pairing_code = qr.pairing_code;
        snap.countdown = self.tuning.qr_ttl_secs;
        self.publish(&snap);
        info!("QR code obtained, waiting for scan ({}s)", snap.countdown);

        let poll_period = Duration::from_secs(self.tuning.poll_interval_secs);
        let mut poll_iv = interval_at(Instant::now() + poll_period, poll_period);
        poll_iv.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The countdown mirrors wall-clock QR expiry, so it catches up
        // (bursts) after a stall instead of stretching the TTL.
        let second = Duration::from_secs(1);
        let mut countdown_iv = interval_at(Instant::now() + second, second);

        let mut visible_rx = self.visible.clone();
        let mut is_visible = *visible_rx.borrow_and_update();
        let mut pairing_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = countdown_iv.tick() => {
                    snap = machine::step(snap, Event::CountdownTick);
                    if let Some(deadline) = pairing_deadline {
                        if Instant::now() >= deadline {
                            snap = machine::step(snap, Event::PairingDeadline);
                        }
                    }
                    self.publish(&snap);
                }
                _ = poll_iv.tick(), if is_visible => {
                    snap = self.poll_once(snap, &mut pairing_deadline).await;
                    self.publish(&snap);
                }
                changed = visible_rx.changed() => {
                    if changed.is_err() {
                        // Orchestrator dropped; stop quietly.
                        return snap;
                    }
                    is_visible = *visible_rx.borrow_and_update();
                    if is_visible && snap.state.is_polling() {
                        debug!("view visible again, re-polling immediately");
                        snap = self.poll_once(snap, &mut pairing_deadline).await;
                        self.publish(&snap);
                    } else if !is_visible {
                        debug!("view hidden, polling suspended");
                    }
                }
            }

            if snap.state.is_terminal() {
                return snap;
            }
        }
    }

    /// One verification round-trip. The same path serves the interval loop
    /// and the resume-from-hidden case, so the two cannot diverge.
    async fn poll_once(
        &self,
        snap: SessionSnapshot,
        pairing_deadline: &mut Option<Instant>,
    ) -> SessionSnapshot {
        let raw = match self.gateway.get_status(&self.token).await {
            Ok(raw) => raw,
            // A failed gateway call ends the session; the admin retries
            // explicitly. Soft verification misses just keep polling.
            Err(e) => return error_snap(snap, ConnectErrorKind::Api, e.to_string()),
        };

        let verdict = verify(&raw);
        let was_waiting = snap.state == ConnState::Waiting;
        let next = machine::step(snap, Event::Poll(&verdict));

        if was_waiting && next.state == ConnState::Connecting {
            *pairing_deadline = Some(
                Instant::now() + Duration::from_secs(self.tuning.pairing_timeout_secs),
            );
            info!("pairing detected, waiting up to {}s for completion", self.tuning.pairing_timeout_secs);
        }

        next
    }

    fn finish_error(
        &self,
        snap: SessionSnapshot,
        kind: ConnectErrorKind,
        message: impl Into<String>,
    ) -> SessionSnapshot {
        let snap = error_snap(snap, kind, message);
        self.publish(&snap);
        snap
    }

    fn publish(&self, snap: &SessionSnapshot) {
        // send_replace stores the value even with zero receivers, so
        // `snapshot()` stays accurate for hook-only consumers.
        self.tx.send_replace(snap.clone());
    }
}

fn error_snap(
    mut snap: SessionSnapshot,
    kind: ConnectErrorKind,
    message: impl Into<String>,
) -> SessionSnapshot {
    snap.state = ConnState::Error;
    snap.qr_code = None;
    snap.pairing_code = None;
    snap.error = Some(ConnectError::new(kind, message));
    snap
}
