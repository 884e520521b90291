//! # lexzap-store
//!
//! SQLite-backed persistence for client instances, the connection-status
//! reconciler, and the append-only audit log.

pub mod audit;
pub mod reconciler;
mod store;

pub use store::{ClientRow, ConnStatus, Store};
