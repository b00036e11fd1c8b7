//! Cross-protocol e-cash bridge.
//!
//! Every conversion, whatever its shape, runs:
//!
//! 1. Parse the source token and extract its amount
//! 2. Check the member's spending limit and quote the fee
//! 3. Resolve routing and create a settlement invoice for the source amount,
//!    falling back across backends like any router operation
//! 4. Synthesize the destination token for the amount net of fees
//!
//! A token that cannot be parsed is rejected before any backend is touched.

pub mod fees;
pub mod token;

pub use fees::{ConversionKind, FeeQuote, fee_for, quote};
pub use token::{ParsedToken, parse_token};

use std::sync::Arc;
use std::time::Instant;

use hearth_config::BridgeConfig;
use hearth_core::EcashProtocol;
use tracing::info;

use crate::SdkError;
use crate::router::{
    Invoice, MemberContext, NodeManager, PaymentRouter, PaymentRouting, PrivacyService,
    RoutingRequest, SettlementAttempt,
};
use crate::tracking::{OperationError, OperationId, OperationKind, OperationStep};
use crate::utils::{now_millis, random_hex};

/// A completed conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub conversion_id: String,
    pub kind: ConversionKind,
    pub source_amount: u64,
    pub fee_sats: u64,
    /// `source_amount - fee_sats`.
    pub destination_amount: u64,
    pub destination_token: String,
    /// Lightning leg sized to `source_amount`.
    pub settlement_invoice: Invoice,
    pub routing: PaymentRouting,
    /// Unix ms.
    pub expires_at: u64,
    pub operation_id: OperationId,
}

/// Converts tokens between mints and protocols through the payment router.
pub struct EcashBridge<M, P> {
    router: Arc<PaymentRouter<M, P>>,
    config: BridgeConfig,
}

impl<M, P> std::fmt::Debug for EcashBridge<M, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcashBridge")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<M, P> EcashBridge<M, P>
where
    M: NodeManager,
    P: PrivacyService,
{
    /// The bridge shares the router's in-flight guard, so a conversion and a
    /// router operation never run at the same time.
    pub fn new(router: Arc<PaymentRouter<M, P>>, config: BridgeConfig) -> Self {
        Self { router, config }
    }

    pub fn router(&self) -> &Arc<PaymentRouter<M, P>> {
        &self.router
    }

    /// Fee terms for converting `token`, without side effects.
    pub fn quote(&self, kind: &ConversionKind, token: &str) -> Result<FeeQuote, SdkError> {
        let parsed = self.parse_source(kind, token)?;
        quote(kind, parsed.amount_sats, &self.config.fees)
    }

    /// Converts `token` as described by `kind` on behalf of `member`.
    pub async fn convert(
        &self,
        member: &MemberContext,
        kind: ConversionKind,
        token: &str,
    ) -> Result<ConversionResult, OperationError> {
        let router = &self.router;
        let mut tracker = router.tracker(OperationKind::Conversion);
        let _guard = match router.admit() {
            Ok(guard) => guard,
            Err(e) => return Err(tracker.fail(OperationStep::Admission, e)),
        };

        let t = Instant::now();
        let parsed = match self.parse_source(&kind, token) {
            Ok(parsed) => parsed,
            Err(e) => return Err(tracker.fail(OperationStep::TokenParse, e)),
        };
        tracker.step_ok(OperationStep::TokenParse, t.elapsed());
        let source_amount = parsed.amount_sats;

        let t = Instant::now();
        let fee_quote = match router
            .check_outgoing(member, source_amount)
            .and_then(|()| quote(&kind, source_amount, &self.config.fees))
        {
            Ok(q) => q,
            Err(e) => return Err(tracker.fail(OperationStep::SpendingLimit, e)),
        };
        tracker.step_ok(OperationStep::SpendingLimit, t.elapsed());

        let request = RoutingRequest {
            is_internal: !kind.is_external(),
            is_family: false,
            amount_sats: source_amount,
            payment_type: kind.payment_type(),
        };
        let description = format!("hearth {kind} conversion");
        let attempt = SettlementAttempt {
            amount_sats: source_amount,
            description: &description,
        };
        let (settlement_invoice, routing) =
            match router.run_with_fallback(&mut tracker, &request, &attempt).await {
                Ok(settled) => settled,
                Err(failure) => return Err(tracker.fail(failure.step, failure.error)),
            };

        let t = Instant::now();
        let destination_token = match self.mint(kind.destination(), fee_quote.destination_sats) {
            Ok(token) => token,
            Err(e) => return Err(tracker.fail(OperationStep::TokenMint, e)),
        };
        tracker.step_ok(OperationStep::TokenMint, t.elapsed());

        router.spending().record(member, source_amount);
        let operation_id = tracker.id();
        let conversion_id = random_hex(16);
        let expires_at = now_millis().saturating_add(kind.expiry_secs(&self.config) * 1_000);

        info!(
            op_id = %operation_id,
            conversion_id = %conversion_id,
            kind = %kind,
            backend = %routing.preferred_backend,
            source_amount,
            fee_sats = fee_quote.fee_sats,
            "conversion completed"
        );
        tracker.succeed();

        Ok(ConversionResult {
            conversion_id,
            kind,
            source_amount,
            fee_sats: fee_quote.fee_sats,
            destination_amount: fee_quote.destination_sats,
            destination_token,
            settlement_invoice,
            routing,
            expires_at,
            operation_id,
        })
    }

    fn parse_source(&self, kind: &ConversionKind, token: &str) -> Result<ParsedToken, SdkError> {
        let parsed = parse_token(token)?;
        if let Some(protocol) = parsed.protocol {
            if protocol != kind.source() {
                return Err(SdkError::InvalidToken);
            }
        }
        Ok(parsed)
    }

    fn mint(&self, protocol: EcashProtocol, amount_sats: u64) -> Result<String, SdkError> {
        match protocol {
            EcashProtocol::Cashu => token::mint_cashu(
                amount_sats,
                self.config.cashu_mint_url,
                self.config.cashu_keyset_id,
            ),
            EcashProtocol::Fedimint => Ok(token::mint_fedimint(amount_sats)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
