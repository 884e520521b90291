//! # lexzap-core
//!
//! Core types, traits, configuration, and error handling for Lexzap.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::shellexpand;
