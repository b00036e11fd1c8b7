//! Privacy service contract.
//!
//! A privacy service re-encodes an invoice so the payer cannot learn the
//! recipient's node (route blinding, trampoline hops, and so on). Family and
//! internal flows require a wrapped invoice; external flows may ask for one.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::SdkError;

/// Result of wrapping an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyWrappedInvoice {
    pub original_invoice: String,
    pub wrapped_invoice: String,
    /// `false` when the service passed the invoice through unwrapped.
    pub is_privacy_enabled: bool,
    /// Fee budget granted to the privacy route, in parts per million.
    pub routing_budget_ppm: u32,
}

/// Wraps invoices for receiver privacy.
pub trait PrivacyService: Send + Sync {
    fn wrap_invoice(
        &self,
        invoice: &str,
        description: &str,
    ) -> impl Future<Output = Result<PrivacyWrappedInvoice, SdkError>> + Send;

    /// Whether the service is reachable.
    fn test_connection(&self) -> impl Future<Output = bool> + Send;

    fn default_routing_budget(&self) -> u32;
}

impl<T: PrivacyService> PrivacyService for Arc<T> {
    fn wrap_invoice(
        &self,
        invoice: &str,
        description: &str,
    ) -> impl Future<Output = Result<PrivacyWrappedInvoice, SdkError>> + Send {
        (**self).wrap_invoice(invoice, description)
    }

    fn test_connection(&self) -> impl Future<Output = bool> + Send {
        (**self).test_connection()
    }

    fn default_routing_budget(&self) -> u32 {
        (**self).default_routing_budget()
    }
}

/// Wraps `invoice` and insists on an enabled result.
///
/// # Errors
///
/// [`SdkError::PrivacyWrapFailed`] when the service fails and
/// [`SdkError::PrivacyDisabled`] when it returns an unwrapped invoice.
pub(crate) async fn wrap_mandatory<P: PrivacyService>(
    privacy: &P,
    invoice: &str,
    description: &str,
) -> Result<PrivacyWrappedInvoice, SdkError> {
    let wrapped = privacy
        .wrap_invoice(invoice, description)
        .await
        .map_err(|_| SdkError::PrivacyWrapFailed)?;
    if !wrapped.is_privacy_enabled {
        return Err(SdkError::PrivacyDisabled);
    }
    Ok(wrapped)
}
