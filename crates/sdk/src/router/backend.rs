//! Lightning backend connectors.

pub use futures::future::BoxFuture;
use hearth_core::BackendKind;
use serde::{Deserialize, Serialize};

use crate::SdkError;

/// A BOLT11 invoice created by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub bolt11: String,
    pub payment_hash: String,
    pub amount_sats: u64,
    pub description: String,
}

/// Proof of a settled outgoing payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub payment_hash: String,
    pub preimage: String,
    pub amount_sats: u64,
    pub fee_sats: u64,
}

/// One Lightning node the router can activate.
///
/// Object safe: the router keeps connectors as `Arc<dyn LightningBackend>`
/// keyed by [`BackendKind`].
pub trait LightningBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn create_invoice<'a>(
        &'a self,
        amount_sats: u64,
        description: &'a str,
    ) -> BoxFuture<'a, Result<Invoice, SdkError>>;

    fn pay_invoice<'a>(
        &'a self,
        invoice: &'a str,
        amount_sats: u64,
    ) -> BoxFuture<'a, Result<PaymentReceipt, SdkError>>;
}
