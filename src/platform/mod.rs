//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Wall-clock time (score record timestamps)
//! - Entropy for unseeded sessions
//! - The wasm-bindgen host boundary (`web`)

#[cfg(target_arch = "wasm32")]
pub mod web;

/// Wall-clock milliseconds since the Unix epoch
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

/// Wall-clock milliseconds since the Unix epoch
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Seed for sessions that did not ask for a fixed one
pub fn entropy_seed() -> u64 {
    rand::random()
}
