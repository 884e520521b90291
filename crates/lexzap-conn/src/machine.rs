//! Pure per-tick transition logic.
//!
//! The orchestrator's timer loop reduces to "tick, apply `step`, publish".
//! Keeping the transitions as a pure function means every race in this flow
//! (countdown expiry vs. a late pairing signal, a pairing deadline firing
//! mid-poll) is testable without real timers.

use crate::session::{ConnState, ConnectError, ConnectErrorKind, SessionSnapshot};
use lexzap_core::types::Verification;

/// One input to the state machine.
#[derive(Debug)]
pub enum Event<'a> {
    /// A poll round-trip completed with this verdict.
    Poll(&'a Verification),
    /// One second of QR countdown elapsed.
    CountdownTick,
    /// The post-pairing completion deadline passed.
    PairingDeadline,
}

/// Apply one event to a session, returning the next session state.
///
/// Timer-driven transitions into `Timeout`/`Error` are trusted without
/// re-verification: they are fail-safe, always falling back to a retry and
/// never to a false "connected". Everything else re-checks the verdict.
pub fn step(mut snap: SessionSnapshot, event: Event<'_>) -> SessionSnapshot {
    match event {
        Event::CountdownTick => {
            if snap.state == ConnState::Waiting {
                snap.countdown = snap.countdown.saturating_sub(1);
                if snap.countdown == 0 {
                    return expire(snap);
                }
            }
            snap
        }

        Event::PairingDeadline => {
            if snap.state == ConnState::Connecting {
                snap.state = ConnState::Error;
                snap.qr_code = None;
                snap.pairing_code = None;
                snap.error = Some(ConnectError::new(
                    ConnectErrorKind::Timeout,
                    "o pareamento não foi concluído a tempo; gere um novo QR code",
                ));
            }
            snap
        }

        Event::Poll(verdict) => match snap.state {
            ConnState::Waiting => {
                // An expired countdown wins over anything this poll says.
                if snap.countdown == 0 {
                    return expire(snap);
                }
                if verdict.is_connected {
                    return complete(snap, verdict);
                }
                if verdict.pairing_started {
                    snap.state = ConnState::Connecting;
                }
                snap
            }
            ConnState::Connecting => {
                if verdict.is_connected {
                    return complete(snap, verdict);
                }
                snap
            }
            // Polls arriving in any other state (e.g. after a reset raced a
            // round-trip) change nothing.
            _ => snap,
        },
    }
}

fn expire(mut snap: SessionSnapshot) -> SessionSnapshot {
    snap.state = ConnState::Timeout;
    snap.countdown = 0;
    snap.qr_code = None;
    snap.pairing_code = None;
    snap
}

fn complete(mut snap: SessionSnapshot, verdict: &Verification) -> SessionSnapshot {
    snap.state = ConnState::Connected;
    snap.qr_code = None;
    snap.pairing_code = None;
    snap.error = None;
    snap.profile_name = verdict.profile_name.clone();
    snap.phone_number = verdict.phone_number.clone();
    snap
}
