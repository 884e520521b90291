//! # lexzap-conn
//!
//! The per-instance connection state machine. `machine` holds the pure
//! per-tick transition logic; `orchestrator` owns the timers and gateway
//! calls that drive it.

pub mod machine;
pub mod orchestrator;
pub mod session;

pub use orchestrator::ConnectOrchestrator;
pub use session::{ConnState, ConnectError, ConnectErrorKind, SessionSnapshot};

#[cfg(test)]
mod tests;
