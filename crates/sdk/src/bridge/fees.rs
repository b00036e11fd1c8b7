//! Conversion kinds and their fee terms.

use std::fmt;

use hearth_config::constants::BPS_DENOMINATOR;
use hearth_config::{BridgeConfig, FeeSchedule};
use hearth_core::{EcashProtocol, PaymentType};
use serde::Serialize;

use crate::SdkError;

/// The four conversion shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ConversionKind {
    /// Between two mints of the same protocol inside the trust domain.
    SameProtocol { protocol: EcashProtocol },
    FedimintToCashu,
    CashuToFedimint,
    /// Swap with a mint outside the trust domain.
    ExternalSwap {
        source: EcashProtocol,
        destination: EcashProtocol,
    },
}

impl ConversionKind {
    pub fn source(&self) -> EcashProtocol {
        match *self {
            Self::SameProtocol { protocol } => protocol,
            Self::FedimintToCashu => EcashProtocol::Fedimint,
            Self::CashuToFedimint => EcashProtocol::Cashu,
            Self::ExternalSwap { source, .. } => source,
        }
    }

    pub fn destination(&self) -> EcashProtocol {
        match *self {
            Self::SameProtocol { protocol } => protocol,
            Self::FedimintToCashu => EcashProtocol::Cashu,
            Self::CashuToFedimint => EcashProtocol::Fedimint,
            Self::ExternalSwap { destination, .. } => destination,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::ExternalSwap { .. })
    }

    pub fn payment_type(&self) -> PaymentType {
        match self {
            Self::SameProtocol { .. } => PaymentType::EcashSameProtocol,
            Self::FedimintToCashu => PaymentType::EcashFedimintToCashu,
            Self::CashuToFedimint => PaymentType::EcashCashuToFedimint,
            Self::ExternalSwap { .. } => PaymentType::EcashExternalSwap,
        }
    }

    pub fn fee_bps(&self, fees: &FeeSchedule) -> u32 {
        match self {
            Self::SameProtocol { .. } => fees.same_protocol_bps,
            Self::FedimintToCashu => fees.fedimint_to_cashu_bps,
            Self::CashuToFedimint => fees.cashu_to_fedimint_bps,
            Self::ExternalSwap { .. } => fees.external_swap_bps,
        }
    }

    pub fn expiry_secs(&self, config: &BridgeConfig) -> u64 {
        if self.is_external() {
            config.external_expiry_secs
        } else {
            config.trusted_expiry_secs
        }
    }
}

impl fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameProtocol { protocol } => write!(f, "{protocol}_same_protocol"),
            Self::FedimintToCashu => write!(f, "fedimint_to_cashu"),
            Self::CashuToFedimint => write!(f, "cashu_to_fedimint"),
            Self::ExternalSwap {
                source,
                destination,
            } => write!(f, "external_swap_{source}_to_{destination}"),
        }
    }
}

/// Fee and net amount of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub fee_sats: u64,
    pub destination_sats: u64,
}

/// `ceil(amount * bps / 10_000)`.
pub fn fee_for(amount_sats: u64, bps: u32) -> u64 {
    let numerator = u128::from(amount_sats) * u128::from(bps);
    let fee = numerator.div_ceil(u128::from(BPS_DENOMINATOR));
    u64::try_from(fee).unwrap_or(u64::MAX)
}

/// # Errors
///
/// [`SdkError::InvalidAmount`] when the fee consumes the whole amount.
pub fn quote(
    kind: &ConversionKind,
    amount_sats: u64,
    fees: &FeeSchedule,
) -> Result<FeeQuote, SdkError> {
    let fee_sats = fee_for(amount_sats, kind.fee_bps(fees));
    match amount_sats.checked_sub(fee_sats) {
        Some(destination_sats) if destination_sats > 0 => Ok(FeeQuote {
            fee_sats,
            destination_sats,
        }),
        _ => Err(SdkError::InvalidAmount),
    }
}
