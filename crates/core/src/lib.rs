//! Core types shared across the Hearth payment workspace.
//!
//! - [`FederationId`] / [`InviteCode`] -- opaque, timestamped identifiers
//! - [`UserRole`] -- family role driving spending-limit policy
//! - [`PaymentType`] -- closed set of payment flows with their privacy posture
//! - [`BackendKind`] -- Lightning backends the router can activate
//! - [`EcashProtocol`] -- bearer-token systems the bridge converts between
//!
//! Policy code matches on these enums without wildcard arms.

pub mod ids;

pub use ids::{FederationId, IdError, InviteCode};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// UserRole
// ---------------------------------------------------------------------------

/// Family role of the member initiating an operation.
///
/// Unrelated to the federation guardian entity: `Guardian` here is a
/// household role with full spending sovereignty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Private,
    Offspring,
    Adult,
    Steward,
    Guardian,
}

impl UserRole {
    pub const ALL: [UserRole; 5] = [
        UserRole::Private,
        UserRole::Offspring,
        UserRole::Adult,
        UserRole::Steward,
        UserRole::Guardian,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Offspring => "offspring",
            Self::Adult => "adult",
            Self::Steward => "steward",
            Self::Guardian => "guardian",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| IdError::UnknownName(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// PaymentType
// ---------------------------------------------------------------------------

/// The kind of payment flow an operation belongs to.
///
/// Drives routing (via the node manager) and the bridge fee schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Lightning payment between members of the same trust domain.
    InternalLightning,
    /// Lightning payment to or from a counterparty outside the trust domain.
    ExternalLightning,
    /// E-cash conversion within one protocol (e.g. federation to federation).
    EcashSameProtocol,
    /// Fedimint notes converted into Cashu proofs.
    EcashFedimintToCashu,
    /// Cashu proofs converted into Fedimint notes.
    EcashCashuToFedimint,
    /// Swap with a mint outside the trust domain.
    EcashExternalSwap,
    /// Legacy callers that do not classify their payments.
    Default,
}

impl PaymentType {
    /// Whether the counterparty sits inside the trust domain.
    pub const fn is_internal(&self) -> bool {
        match self {
            Self::InternalLightning
            | Self::EcashSameProtocol
            | Self::EcashFedimintToCashu
            | Self::EcashCashuToFedimint => true,
            Self::ExternalLightning | Self::EcashExternalSwap | Self::Default => false,
        }
    }

    /// Whether this is one of the e-cash bridge flows.
    pub const fn is_ecash_bridge(&self) -> bool {
        match self {
            Self::EcashSameProtocol
            | Self::EcashFedimintToCashu
            | Self::EcashCashuToFedimint
            | Self::EcashExternalSwap => true,
            Self::InternalLightning | Self::ExternalLightning | Self::Default => false,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InternalLightning => "internal_lightning",
            Self::ExternalLightning => "external_lightning",
            Self::EcashSameProtocol => "ecash_same_protocol",
            Self::EcashFedimintToCashu => "ecash_fedimint_to_cashu",
            Self::EcashCashuToFedimint => "ecash_cashu_to_fedimint",
            Self::EcashExternalSwap => "ecash_external_swap",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BackendKind
// ---------------------------------------------------------------------------

/// A Lightning backend the payment router can route through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    Phoenixd,
    Voltage,
    Lnbits,
    Breez,
    Nwc,
    SelfHosted,
}

impl BackendKind {
    pub const ALL: [BackendKind; 6] = [
        BackendKind::Phoenixd,
        BackendKind::Voltage,
        BackendKind::Lnbits,
        BackendKind::Breez,
        BackendKind::Nwc,
        BackendKind::SelfHosted,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Phoenixd => "phoenixd",
            Self::Voltage => "voltage",
            Self::Lnbits => "lnbits",
            Self::Breez => "breez",
            Self::Nwc => "nwc",
            Self::SelfHosted => "self-hosted",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| IdError::UnknownName(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// EcashProtocol
// ---------------------------------------------------------------------------

/// Bearer-token system on either side of a bridge conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EcashProtocol {
    Fedimint,
    Cashu,
}

impl EcashProtocol {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fedimint => "fedimint",
            Self::Cashu => "cashu",
        }
    }
}

impl fmt::Display for EcashProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Offspring".parse::<UserRole>().unwrap(), UserRole::Offspring);
        assert_eq!("guardian".parse::<UserRole>().unwrap(), UserRole::Guardian);
        assert!("parent".parse::<UserRole>().is_err());
    }

    #[test]
    fn backend_kind_names_are_stable() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
        assert_eq!(
            serde_json::to_string(&BackendKind::SelfHosted).unwrap(),
            "\"self-hosted\""
        );
    }

    #[test]
    fn bridge_types_are_classified() {
        assert!(PaymentType::EcashCashuToFedimint.is_ecash_bridge());
        assert!(PaymentType::EcashCashuToFedimint.is_internal());
        assert!(PaymentType::EcashExternalSwap.is_ecash_bridge());
        assert!(!PaymentType::EcashExternalSwap.is_internal());
        assert!(!PaymentType::Default.is_ecash_bridge());
        assert!(!PaymentType::ExternalLightning.is_internal());
    }
}
