//! One backend attempt of a router operation.
//!
//! The fallback loop re-runs the whole attempt on every candidate, wrapping
//! included, so each attempt type owns its complete sequence of backend and
//! privacy calls.

use std::future::Future;
use std::sync::Arc;

use tracing::warn;

use crate::SdkError;
use crate::tracking::OperationStep;

use super::backend::{Invoice, LightningBackend, PaymentReceipt};
use super::privacy::{PrivacyService, PrivacyWrappedInvoice, wrap_mandatory};

/// Where an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttemptFailure {
    pub step: OperationStep,
    pub error: SdkError,
}

impl AttemptFailure {
    fn wrap(backend: &dyn LightningBackend, error: SdkError) -> Self {
        Self {
            step: OperationStep::PrivacyWrap(backend.kind()),
            error,
        }
    }

    fn execute(backend: &dyn LightningBackend, error: SdkError) -> Self {
        Self {
            step: OperationStep::Execute(backend.kind()),
            error,
        }
    }
}

/// A created invoice and the wrapping applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InvoiceOutcome {
    pub invoice: Invoice,
    pub privacy: Option<PrivacyWrappedInvoice>,
}

/// A settled payment and the wrapping applied to the paid invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PaymentOutcome {
    pub receipt: PaymentReceipt,
    pub privacy: Option<PrivacyWrappedInvoice>,
}

pub(crate) trait Attempt<P: PrivacyService>: Send + Sync {
    type Output: Send;

    fn run(
        &self,
        backend: Arc<dyn LightningBackend>,
        privacy: &P,
    ) -> impl Future<Output = Result<Self::Output, AttemptFailure>> + Send;
}

// ---------------------------------------------------------------------------
// Invoices
// ---------------------------------------------------------------------------

/// Family invoice: the wrapped invoice is mandatory.
pub(crate) struct FamilyInvoiceAttempt<'a> {
    pub amount_sats: u64,
    pub description: &'a str,
}

impl<P: PrivacyService> Attempt<P> for FamilyInvoiceAttempt<'_> {
    type Output = InvoiceOutcome;

    async fn run(
        &self,
        backend: Arc<dyn LightningBackend>,
        privacy: &P,
    ) -> Result<InvoiceOutcome, AttemptFailure> {
        let invoice = backend
            .create_invoice(self.amount_sats, self.description)
            .await
            .map_err(|e| AttemptFailure::execute(backend.as_ref(), e))?;
        let wrapped = wrap_mandatory(privacy, &invoice.bolt11, self.description)
            .await
            .map_err(|e| AttemptFailure::wrap(backend.as_ref(), e))?;
        Ok(InvoiceOutcome {
            invoice,
            privacy: Some(wrapped),
        })
    }
}

/// External invoice: wrapping is best effort and only when requested.
pub(crate) struct ExternalInvoiceAttempt<'a> {
    pub amount_sats: u64,
    pub description: &'a str,
    pub request_privacy: bool,
}

impl<P: PrivacyService> Attempt<P> for ExternalInvoiceAttempt<'_> {
    type Output = InvoiceOutcome;

    async fn run(
        &self,
        backend: Arc<dyn LightningBackend>,
        privacy: &P,
    ) -> Result<InvoiceOutcome, AttemptFailure> {
        let invoice = backend
            .create_invoice(self.amount_sats, self.description)
            .await
            .map_err(|e| AttemptFailure::execute(backend.as_ref(), e))?;
        if !self.request_privacy {
            return Ok(InvoiceOutcome {
                invoice,
                privacy: None,
            });
        }

        let privacy = match privacy.wrap_invoice(&invoice.bolt11, self.description).await {
            Ok(wrapped) if wrapped.is_privacy_enabled => Some(wrapped),
            Ok(_) => {
                warn!(backend = %backend.kind(), "privacy disabled, returning unwrapped invoice");
                None
            }
            Err(e) => {
                warn!(
                    backend = %backend.kind(),
                    error = %e,
                    "privacy wrap failed, returning unwrapped invoice"
                );
                None
            }
        };
        Ok(InvoiceOutcome { invoice, privacy })
    }
}

/// Settlement leg of an e-cash conversion: a plain invoice.
pub(crate) struct SettlementAttempt<'a> {
    pub amount_sats: u64,
    pub description: &'a str,
}

impl<P: PrivacyService> Attempt<P> for SettlementAttempt<'_> {
    type Output = Invoice;

    async fn run(
        &self,
        backend: Arc<dyn LightningBackend>,
        _privacy: &P,
    ) -> Result<Invoice, AttemptFailure> {
        backend
            .create_invoice(self.amount_sats, self.description)
            .await
            .map_err(|e| AttemptFailure::execute(backend.as_ref(), e))
    }
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

/// Family payment: the recipient's invoice is wrapped, then the wrapped
/// invoice is paid.
pub(crate) struct FamilyPaymentAttempt<'a> {
    pub invoice: &'a str,
    pub amount_sats: u64,
}

impl<P: PrivacyService> Attempt<P> for FamilyPaymentAttempt<'_> {
    type Output = PaymentOutcome;

    async fn run(
        &self,
        backend: Arc<dyn LightningBackend>,
        privacy: &P,
    ) -> Result<PaymentOutcome, AttemptFailure> {
        let wrapped = wrap_mandatory(privacy, self.invoice, "")
            .await
            .map_err(|e| AttemptFailure::wrap(backend.as_ref(), e))?;
        let receipt = backend
            .pay_invoice(&wrapped.wrapped_invoice, self.amount_sats)
            .await
            .map_err(|e| AttemptFailure::execute(backend.as_ref(), e))?;
        Ok(PaymentOutcome {
            receipt,
            privacy: Some(wrapped),
        })
    }
}

/// External payment: the invoice is paid as given.
pub(crate) struct ExternalPaymentAttempt<'a> {
    pub invoice: &'a str,
    pub amount_sats: u64,
}

impl<P: PrivacyService> Attempt<P> for ExternalPaymentAttempt<'_> {
    type Output = PaymentOutcome;

    async fn run(
        &self,
        backend: Arc<dyn LightningBackend>,
        _privacy: &P,
    ) -> Result<PaymentOutcome, AttemptFailure> {
        let receipt = backend
            .pay_invoice(self.invoice, self.amount_sats)
            .await
            .map_err(|e| AttemptFailure::execute(backend.as_ref(), e))?;
        Ok(PaymentOutcome {
            receipt,
            privacy: None,
        })
    }
}
