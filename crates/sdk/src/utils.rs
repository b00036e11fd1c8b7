//! Shared utility functions: wall-clock time and random hex identifiers.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

/// Milliseconds in one UTC day.
pub(crate) const DAY_MS: u64 = 24 * 60 * 60 * 1_000;

/// Current wall-clock time in unix milliseconds.
///
/// A clock set before the epoch reads as 0; callers compare timestamps,
/// never subtract them.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// `len` random bytes, lowercase hex.
pub(crate) fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
