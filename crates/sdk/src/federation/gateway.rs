//! Federation Lightning gateway trait.
//!
//! The quorum client proxies invoice creation and payment to the gateway of
//! its federation. [`NoGateway`] is a placeholder for deployments that only
//! monitor guardians.

use std::future::Future;
use std::sync::Arc;

use hearth_core::FederationId;

use crate::SdkError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An invoice issued by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayInvoice {
    pub invoice: String,
    pub payment_hash: String,
    pub amount_sats: u64,
}

/// A settled gateway payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPayment {
    pub preimage: String,
    pub fee_sats: u64,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Lightning gateway of a federation, scoped by federation id.
pub trait LightningGateway: Send + Sync {
    /// Federation balance held for this member, in satoshis.
    fn balance(
        &self,
        federation_id: &FederationId,
    ) -> impl Future<Output = Result<u64, SdkError>> + Send;

    fn create_invoice(
        &self,
        federation_id: &FederationId,
        amount_sats: u64,
        description: &str,
    ) -> impl Future<Output = Result<GatewayInvoice, SdkError>> + Send;

    fn pay_invoice(
        &self,
        federation_id: &FederationId,
        invoice: &str,
        amount_sats: u64,
    ) -> impl Future<Output = Result<GatewayPayment, SdkError>> + Send;
}

impl<T: LightningGateway> LightningGateway for Arc<T> {
    fn balance(
        &self,
        federation_id: &FederationId,
    ) -> impl Future<Output = Result<u64, SdkError>> + Send {
        (**self).balance(federation_id)
    }

    fn create_invoice(
        &self,
        federation_id: &FederationId,
        amount_sats: u64,
        description: &str,
    ) -> impl Future<Output = Result<GatewayInvoice, SdkError>> + Send {
        (**self).create_invoice(federation_id, amount_sats, description)
    }

    fn pay_invoice(
        &self,
        federation_id: &FederationId,
        invoice: &str,
        amount_sats: u64,
    ) -> impl Future<Output = Result<GatewayPayment, SdkError>> + Send {
        (**self).pay_invoice(federation_id, invoice, amount_sats)
    }
}

// ---------------------------------------------------------------------------
// No-op implementation
// ---------------------------------------------------------------------------

/// A gateway with zero balance that refuses every Lightning call.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGateway;

impl LightningGateway for NoGateway {
    async fn balance(&self, _federation_id: &FederationId) -> Result<u64, SdkError> {
        Ok(0)
    }

    async fn create_invoice(
        &self,
        _federation_id: &FederationId,
        _amount_sats: u64,
        _description: &str,
    ) -> Result<GatewayInvoice, SdkError> {
        Err(SdkError::GatewayFailed)
    }

    async fn pay_invoice(
        &self,
        _federation_id: &FederationId,
        _invoice: &str,
        _amount_sats: u64,
    ) -> Result<GatewayPayment, SdkError> {
        Err(SdkError::GatewayFailed)
    }
}
