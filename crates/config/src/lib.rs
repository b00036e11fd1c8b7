//! Hearth configuration.
//!
//! Static, `Copy` configuration for each component of the payment core:
//!
//! - [`FederationConfig`] -- guardian probing and note issuance
//! - [`RouterConfig`] -- spending caps, attempt timeouts, backend preferences
//! - [`BridgeConfig`] -- conversion fees and expiries
//! - [`HearthConfig`] -- all of the above
//! - [`constants`] -- the protocol-level values the defaults are built from
//!
//! All data is compile-time constant. `hearth-config` depends only on
//! [`hearth_core`] for [`BackendKind`], so it stays a leaf dependency.

pub mod constants;

use std::time::Duration;

use hearth_core::BackendKind;

use constants::*;

// ---------------------------------------------------------------------------
// FederationConfig
// ---------------------------------------------------------------------------

/// Guardian quorum client configuration.
#[derive(Debug, Clone, Copy)]
pub struct FederationConfig {
    /// Upper bound on a single guardian liveness probe, in milliseconds.
    pub probe_timeout_ms: u64,

    /// Lifetime of an issued note, in seconds.
    pub note_ttl_secs: u64,

    /// Descending denomination list used to split issuances.
    pub denominations: &'static [u64],

    /// Largest number of notes one issuance may split into.
    pub max_notes_per_issue: usize,
}

impl FederationConfig {
    pub const DEFAULT: Self = Self {
        probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        note_ttl_secs: NOTE_TTL_SECS,
        denominations: &CANONICAL_DENOMINATIONS,
        max_notes_per_issue: MAX_NOTES_PER_ISSUE,
    };

    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub const fn note_ttl_ms(&self) -> u64 {
        self.note_ttl_secs * 1_000
    }

    /// Whether `amount` is one of the configured denominations.
    pub fn is_denomination(&self, amount: u64) -> bool {
        self.denominations.contains(&amount)
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// RouterConfig
// ---------------------------------------------------------------------------

/// Ordered backend preferences for each route class.
///
/// Consumed by the bundled node-selection policy. The first active backend
/// in a list is preferred and the remaining active ones become fallbacks.
#[derive(Debug, Clone, Copy)]
pub struct RoutingPreferences {
    /// Payments between family members.
    pub family: &'static [BackendKind],
    /// Payments inside the trust domain that are not family flows.
    pub internal: &'static [BackendKind],
    /// Payments to or from outside counterparties.
    pub external: &'static [BackendKind],
    /// Settlement legs of e-cash conversions.
    pub ecash: &'static [BackendKind],
}

impl RoutingPreferences {
    pub const DEFAULT: Self = Self {
        family: &[
            BackendKind::Phoenixd,
            BackendKind::SelfHosted,
            BackendKind::Voltage,
        ],
        internal: &[
            BackendKind::Phoenixd,
            BackendKind::Lnbits,
            BackendKind::SelfHosted,
            BackendKind::Voltage,
        ],
        external: &[
            BackendKind::Voltage,
            BackendKind::Breez,
            BackendKind::Phoenixd,
            BackendKind::Nwc,
        ],
        ecash: &[
            BackendKind::Phoenixd,
            BackendKind::Voltage,
            BackendKind::Lnbits,
        ],
    };
}

/// Payment router configuration.
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    /// Daily outgoing cap applied to the offspring role, in satoshis.
    pub offspring_daily_cap_sats: u64,

    /// Upper bound on one backend attempt, in milliseconds.
    pub attempt_timeout_ms: u64,

    /// Amount at which candidates are re-sorted by success rate.
    pub large_payment_threshold_sats: u64,

    /// Backend preference lists per route class.
    pub preferences: RoutingPreferences,
}

impl RouterConfig {
    pub const DEFAULT: Self = Self {
        offspring_daily_cap_sats: OFFSPRING_DAILY_CAP_SATS,
        attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT_MS,
        large_payment_threshold_sats: LARGE_PAYMENT_THRESHOLD_SATS,
        preferences: RoutingPreferences::DEFAULT,
    };

    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// BridgeConfig
// ---------------------------------------------------------------------------

/// Conversion fees in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub same_protocol_bps: u32,
    pub fedimint_to_cashu_bps: u32,
    pub cashu_to_fedimint_bps: u32,
    pub external_swap_bps: u32,
}

impl FeeSchedule {
    pub const DEFAULT: Self = Self {
        same_protocol_bps: SAME_PROTOCOL_FEE_BPS,
        fedimint_to_cashu_bps: FEDIMINT_TO_CASHU_FEE_BPS,
        cashu_to_fedimint_bps: CASHU_TO_FEDIMINT_FEE_BPS,
        external_swap_bps: EXTERNAL_SWAP_FEE_BPS,
    };
}

/// E-cash bridge configuration.
#[derive(Debug, Clone, Copy)]
pub struct BridgeConfig {
    pub fees: FeeSchedule,

    /// Expiry of conversions inside the trust domain, in seconds.
    pub trusted_expiry_secs: u64,

    /// Expiry of swaps with external mints, in seconds.
    pub external_expiry_secs: u64,

    /// Mint URL named in synthesized Cashu tokens.
    pub cashu_mint_url: &'static str,

    /// Keyset id stamped on synthesized Cashu proofs.
    pub cashu_keyset_id: &'static str,
}

impl BridgeConfig {
    pub const DEFAULT: Self = Self {
        fees: FeeSchedule::DEFAULT,
        trusted_expiry_secs: TRUSTED_CONVERSION_EXPIRY_SECS,
        external_expiry_secs: EXTERNAL_SWAP_EXPIRY_SECS,
        cashu_mint_url: "https://mint.hearth.local",
        cashu_keyset_id: "00hearth",
    };
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// HearthConfig
// ---------------------------------------------------------------------------

/// Full configuration of the payment core.
#[derive(Debug, Clone, Copy)]
pub struct HearthConfig {
    pub federation: FederationConfig,
    pub router: RouterConfig,
    pub bridge: BridgeConfig,
}

impl HearthConfig {
    pub const DEFAULT: Self = Self {
        federation: FederationConfig::DEFAULT,
        router: RouterConfig::DEFAULT,
        bridge: BridgeConfig::DEFAULT,
    };
}

impl Default for HearthConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_probe_timeout_is_two_seconds() {
        assert_eq!(
            FederationConfig::DEFAULT.probe_timeout(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn note_ttl_is_thirty_days() {
        assert_eq!(
            FederationConfig::DEFAULT.note_ttl_ms(),
            30 * 24 * 60 * 60 * 1_000
        );
    }

    #[test]
    fn preference_lists_have_no_duplicates() {
        let prefs = RoutingPreferences::DEFAULT;
        for list in [prefs.family, prefs.internal, prefs.external, prefs.ecash] {
            let mut sorted = list.to_vec();
            sorted.sort();
            sorted.dedup();
            assert_eq!(sorted.len(), list.len());
        }
    }

    #[test]
    fn configs_are_copy() {
        const CONFIG: HearthConfig = HearthConfig::DEFAULT;
        let a = CONFIG;
        let b = a;
        assert_eq!(a.router.offspring_daily_cap_sats, b.router.offspring_daily_cap_sats);
    }
}
