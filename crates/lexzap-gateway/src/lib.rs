//! # lexzap-gateway
//!
//! Thin HTTP wrapper over the remote WhatsApp gateway, the tolerant status
//! verifier, and terminal QR rendering.

pub mod client;
pub mod qr;
pub mod verify;

pub use client::UazClient;
pub use verify::{has_pairing_started, verify};

#[cfg(test)]
mod tests;
