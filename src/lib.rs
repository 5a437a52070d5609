//! flvrec - Live FLV stream recorder
//!
//! This library crate exposes the config and recorder used by the binary and its tests.

pub mod config;
pub mod recorder;
