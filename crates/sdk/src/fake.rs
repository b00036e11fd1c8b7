//! Deterministic in-process collaborators.
//!
//! - [`FakeGateway`]: a federation gateway with a fixed balance
//! - [`ScriptedBackend`]: a Lightning backend with failure toggles
//! - [`ScriptedPrivacy`]: a privacy service with a selectable mode
//!
//! Pair them with [`hearth_transport::ScriptedTransport`] to run the whole
//! payment core without a network.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use hearth_core::{BackendKind, FederationId};

use crate::SdkError;
use crate::federation::{GatewayInvoice, GatewayPayment, LightningGateway};
use crate::router::{
    BoxFuture, Invoice, LightningBackend, PaymentReceipt, PrivacyService, PrivacyWrappedInvoice,
};
use crate::utils::random_hex;

// ---------------------------------------------------------------------------
// FakeGateway
// ---------------------------------------------------------------------------

/// Gateway reporting a settable balance.
#[derive(Debug, Default)]
pub struct FakeGateway {
    balance_sats: AtomicU64,
    fail_balance: AtomicBool,
    fail_invoice: AtomicBool,
    fail_pay: AtomicBool,
    invoices: AtomicUsize,
    payments: AtomicUsize,
}

impl FakeGateway {
    pub fn with_balance(balance_sats: u64) -> Self {
        let gateway = Self::default();
        gateway.set_balance(balance_sats);
        gateway
    }

    pub fn set_balance(&self, balance_sats: u64) {
        self.balance_sats.store(balance_sats, Ordering::SeqCst);
    }

    pub fn set_fail_balance(&self, fail: bool) {
        self.fail_balance.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_invoice(&self, fail: bool) {
        self.fail_invoice.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_pay(&self, fail: bool) {
        self.fail_pay.store(fail, Ordering::SeqCst);
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices.load(Ordering::SeqCst)
    }

    pub fn payment_count(&self) -> usize {
        self.payments.load(Ordering::SeqCst)
    }
}

impl LightningGateway for FakeGateway {
    async fn balance(&self, _federation_id: &FederationId) -> Result<u64, SdkError> {
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(SdkError::GatewayFailed);
        }
        Ok(self.balance_sats.load(Ordering::SeqCst))
    }

    async fn create_invoice(
        &self,
        federation_id: &FederationId,
        amount_sats: u64,
        _description: &str,
    ) -> Result<GatewayInvoice, SdkError> {
        if self.fail_invoice.load(Ordering::SeqCst) {
            return Err(SdkError::GatewayFailed);
        }
        let n = self.invoices.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayInvoice {
            invoice: format!("lnbc{amount_sats}fed{n}_{federation_id}"),
            payment_hash: random_hex(32),
            amount_sats,
        })
    }

    async fn pay_invoice(
        &self,
        _federation_id: &FederationId,
        _invoice: &str,
        _amount_sats: u64,
    ) -> Result<GatewayPayment, SdkError> {
        if self.fail_pay.load(Ordering::SeqCst) {
            return Err(SdkError::GatewayFailed);
        }
        self.payments.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayPayment {
            preimage: random_hex(32),
            fee_sats: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedBackend
// ---------------------------------------------------------------------------

/// Lightning backend whose calls succeed unless told otherwise.
#[derive(Debug)]
pub struct ScriptedBackend {
    kind: BackendKind,
    fail_create: AtomicBool,
    fail_pay: AtomicBool,
    hang: AtomicBool,
    calls: AtomicUsize,
    paid: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            fail_create: AtomicBool::new(false),
            fail_pay: AtomicBool::new(false),
            hang: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            paid: Mutex::new(Vec::new()),
        }
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_pay(&self, fail: bool) {
        self.fail_pay.store(fail, Ordering::SeqCst);
    }

    /// Makes every call pend forever.
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Number of create and pay calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Invoices paid successfully, in order.
    pub fn paid(&self) -> Vec<String> {
        self.paid.lock().map(|p| p.clone()).unwrap_or_default()
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

impl LightningBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn create_invoice<'a>(
        &'a self,
        amount_sats: u64,
        description: &'a str,
    ) -> BoxFuture<'a, Result<Invoice, SdkError>> {
        Box::pin(async move {
            self.enter().await;
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(SdkError::BackendFailed);
            }
            Ok(Invoice {
                bolt11: format!("lnbc{amount_sats}n1{}{}", self.kind, random_hex(8)),
                payment_hash: random_hex(32),
                amount_sats,
                description: description.to_owned(),
            })
        })
    }

    fn pay_invoice<'a>(
        &'a self,
        invoice: &'a str,
        amount_sats: u64,
    ) -> BoxFuture<'a, Result<PaymentReceipt, SdkError>> {
        Box::pin(async move {
            self.enter().await;
            if self.fail_pay.load(Ordering::SeqCst) {
                return Err(SdkError::BackendFailed);
            }
            if let Ok(mut paid) = self.paid.lock() {
                paid.push(invoice.to_owned());
            }
            Ok(PaymentReceipt {
                payment_hash: random_hex(32),
                preimage: random_hex(32),
                amount_sats,
                fee_sats: 0,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedPrivacy
// ---------------------------------------------------------------------------

/// How [`ScriptedPrivacy`] answers wrap requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PrivacyMode {
    /// Wraps as `wrapped:<invoice>`.
    Enabled = 0,
    /// Returns the invoice unwrapped with `is_privacy_enabled = false`.
    Disabled = 1,
    /// Fails every wrap.
    Failing = 2,
}

impl PrivacyMode {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Enabled,
            1 => Self::Disabled,
            _ => Self::Failing,
        }
    }
}

/// Privacy service with a selectable mode.
#[derive(Debug)]
pub struct ScriptedPrivacy {
    mode: AtomicU8,
    wraps: AtomicUsize,
}

impl ScriptedPrivacy {
    pub const ROUTING_BUDGET_PPM: u32 = 5_000;

    pub fn new() -> Self {
        Self {
            mode: AtomicU8::new(PrivacyMode::Enabled as u8),
            wraps: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: PrivacyMode) {
        self.mode.store(mode as u8, Ordering::SeqCst);
    }

    pub fn mode(&self) -> PrivacyMode {
        PrivacyMode::from_u8(self.mode.load(Ordering::SeqCst))
    }

    pub fn wrap_count(&self) -> usize {
        self.wraps.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedPrivacy {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivacyService for ScriptedPrivacy {
    async fn wrap_invoice(
        &self,
        invoice: &str,
        _description: &str,
    ) -> Result<PrivacyWrappedInvoice, SdkError> {
        self.wraps.fetch_add(1, Ordering::SeqCst);
        match self.mode() {
            PrivacyMode::Enabled => Ok(PrivacyWrappedInvoice {
                original_invoice: invoice.to_owned(),
                wrapped_invoice: format!("wrapped:{invoice}"),
                is_privacy_enabled: true,
                routing_budget_ppm: Self::ROUTING_BUDGET_PPM,
            }),
            PrivacyMode::Disabled => Ok(PrivacyWrappedInvoice {
                original_invoice: invoice.to_owned(),
                wrapped_invoice: invoice.to_owned(),
                is_privacy_enabled: false,
                routing_budget_ppm: 0,
            }),
            PrivacyMode::Failing => Err(SdkError::PrivacyWrapFailed),
        }
    }

    async fn test_connection(&self) -> bool {
        self.mode() != PrivacyMode::Failing
    }

    fn default_routing_budget(&self) -> u32 {
        Self::ROUTING_BUDGET_PPM
    }
}
