//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Wall clock (session timestamps)
//! - Seed entropy for new runs

/// Unix time in milliseconds
#[cfg(target_arch = "wasm32")]
pub fn wall_clock_ms() -> f64 {
    js_sys::Date::now()
}

/// Unix time in milliseconds
#[cfg(not(target_arch = "wasm32"))]
pub fn wall_clock_ms() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Seed for a new session when the host doesn't supply one
pub fn entropy_seed() -> u64 {
    (wall_clock_ms() as u64) ^ rand::random::<u64>()
}
