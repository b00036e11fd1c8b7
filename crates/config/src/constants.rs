//! Protocol constants.
//!
//! Denominations, lifetimes, fee rates and caps shared by the quorum client,
//! the payment router and the e-cash bridge.

/// Canonical e-cash denominations in satoshis, strictly descending.
///
/// Ends in 1 so greedy splitting always produces an exact partition.
pub const CANONICAL_DENOMINATIONS: [u64; 11] = [
    100_000, 50_000, 10_000, 5_000, 1_000, 500, 100, 50, 10, 5, 1,
];

/// Upper bound on the notes a single issuance may produce.
pub const MAX_NOTES_PER_ISSUE: usize = 10_000;

/// Logical lifetime of an issued note (30 days).
pub const NOTE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Default bound on a single guardian liveness probe.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Daily outgoing cap for the offspring role, in satoshis.
pub const OFFSPRING_DAILY_CAP_SATS: u64 = 50_000;

/// Default bound on a single backend attempt inside the fallback loop.
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 30_000;

/// Amount at which routing re-sorts candidates by success rate.
pub const LARGE_PAYMENT_THRESHOLD_SATS: u64 = 1_000_000;

/// Same-protocol conversion fee (0.5%).
pub const SAME_PROTOCOL_FEE_BPS: u32 = 50;

/// Fedimint to Cashu conversion fee (1%).
pub const FEDIMINT_TO_CASHU_FEE_BPS: u32 = 100;

/// Cashu to Fedimint conversion fee (1.5%).
pub const CASHU_TO_FEDIMINT_FEE_BPS: u32 = 150;

/// External mint swap fee (2%).
pub const EXTERNAL_SWAP_FEE_BPS: u32 = 200;

/// Expiry of conversions inside the trust domain (24 hours).
pub const TRUSTED_CONVERSION_EXPIRY_SECS: u64 = 24 * 60 * 60;

/// Expiry of external mint swaps (12 hours).
pub const EXTERNAL_SWAP_EXPIRY_SECS: u64 = 12 * 60 * 60;

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;
