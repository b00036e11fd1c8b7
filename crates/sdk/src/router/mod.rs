//! Multi-node payment router.
//!
//! Every operation follows the same sequence:
//!
//! 1. **Admission**: a non-reentrant guard rejects concurrent callers with
//!    [`SdkError::Busy`]
//! 2. **Spending limit**: amount and role checks, before any network call
//! 3. **Routing**: the [`NodeManager`] picks a preferred backend and fallbacks
//! 4. **Activation**: the candidate becomes the single active backend
//! 5. **Execution**: the attempt runs under a timeout; family flows must
//!    produce a privacy-wrapped invoice
//! 6. **Fallback**: on failure the whole attempt moves to the next candidate.
//!    When every candidate fails the pre-operation backend is restored and
//!    the first error is returned
//!
//! Spend is recorded against the member only after a successful payment.

mod attempt;
pub mod backend;
mod guard;
pub mod limits;
pub mod manager;
pub mod privacy;

pub use backend::{BoxFuture, Invoice, LightningBackend, PaymentReceipt};
pub use limits::{MemberContext, SpendingDecision, SpendingLimit, SpendingTracker};
pub use manager::{
    BackendHealth, BackendInfo, HealthUpdate, NodeManager, PaymentRouting, PolicyNodeManager,
    RouteClass, RoutingRequest,
};
pub use privacy::{PrivacyService, PrivacyWrappedInvoice};

pub(crate) use attempt::{Attempt, AttemptFailure, SettlementAttempt};
pub(crate) use guard::InFlightGuard;

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use hearth_config::RouterConfig;
use hearth_core::{BackendKind, PaymentType};
use tracing::{debug, info, warn};

use crate::SdkError;
use crate::tracking::{
    NoopOperationStore, OperationError, OperationId, OperationKind, OperationStep, OperationStore,
    OperationTracker,
};

use attempt::{
    ExternalInvoiceAttempt, ExternalPaymentAttempt, FamilyInvoiceAttempt, FamilyPaymentAttempt,
};
use guard::RestoreGuard;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A created invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceResult {
    pub invoice: Invoice,
    /// Always present for family invoices.
    pub privacy: Option<PrivacyWrappedInvoice>,
    /// `preferred_backend` is the backend that produced the invoice.
    pub routing: PaymentRouting,
    pub operation_id: OperationId,
}

/// A settled outgoing payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentResult {
    pub receipt: PaymentReceipt,
    pub privacy: Option<PrivacyWrappedInvoice>,
    /// `preferred_backend` is the backend that paid.
    pub routing: PaymentRouting,
    pub operation_id: OperationId,
}

// ---------------------------------------------------------------------------
// PaymentRouter
// ---------------------------------------------------------------------------

/// Routes Lightning operations across several backends.
///
/// # Type Parameters
///
/// - `M`: backend inventory and routing policy
/// - `P`: invoice privacy service
pub struct PaymentRouter<M, P> {
    config: RouterConfig,
    manager: M,
    privacy: P,
    connectors: RwLock<HashMap<BackendKind, Arc<dyn LightningBackend>>>,
    active: RwLock<Option<BackendKind>>,
    in_flight: AtomicBool,
    spending: SpendingTracker,
    operation_store: Arc<dyn OperationStore>,
}

impl<M, P> std::fmt::Debug for PaymentRouter<M, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentRouter")
            .field("active", &self.active_backend())
            .finish_non_exhaustive()
    }
}

impl<M, P> PaymentRouter<M, P> {
    /// The currently active backend, if any.
    pub fn active_backend(&self) -> Option<BackendKind> {
        self.active.read().ok().and_then(|a| *a)
    }
}

impl<M, P> PaymentRouter<M, P>
where
    M: NodeManager,
    P: PrivacyService,
{
    pub fn new(config: RouterConfig, manager: M, privacy: P) -> Self {
        Self {
            spending: SpendingTracker::new(config.offspring_daily_cap_sats),
            config,
            manager,
            privacy,
            connectors: RwLock::new(HashMap::new()),
            active: RwLock::new(None),
            in_flight: AtomicBool::new(false),
            operation_store: Arc::new(NoopOperationStore),
        }
    }

    pub fn with_operation_store(mut self, store: Arc<dyn OperationStore>) -> Self {
        self.operation_store = store;
        self
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn privacy(&self) -> &P {
        &self.privacy
    }

    pub fn spending(&self) -> &SpendingTracker {
        &self.spending
    }

    /// Adds or replaces the connector for `backend.kind()`.
    pub fn register_backend(&self, backend: Arc<dyn LightningBackend>) {
        if let Ok(mut connectors) = self.connectors.write() {
            connectors.insert(backend.kind(), backend);
        }
    }

    // -----------------------------------------------------------------------
    // Backend activation
    // -----------------------------------------------------------------------

    /// Makes `kind` the active backend.
    ///
    /// # Errors
    ///
    /// [`SdkError::Busy`] while an operation runs,
    /// [`SdkError::UnknownBackend`] or [`SdkError::InactiveBackend`] when a
    /// check fails. The active backend is unchanged on error.
    pub fn activate_backend(&self, kind: BackendKind) -> Result<(), SdkError> {
        let _guard = self.admit()?;
        self.activate(kind)
    }

    fn activate(&self, kind: BackendKind) -> Result<(), SdkError> {
        let info = self.manager.get_backend(kind).ok_or(SdkError::UnknownBackend)?;
        if !info.is_active
            || !self.manager.validate_security(kind)
            || self.connector(kind).is_none()
        {
            return Err(SdkError::InactiveBackend);
        }
        self.set_active(Some(kind))?;
        debug!(backend = %kind, "backend activated");
        Ok(())
    }

    fn set_active(&self, kind: Option<BackendKind>) -> Result<(), SdkError> {
        let mut active = self.active.write().map_err(|_| SdkError::StoreFailed)?;
        *active = kind;
        Ok(())
    }

    fn connector(&self, kind: BackendKind) -> Option<Arc<dyn LightningBackend>> {
        self.connectors.read().ok()?.get(&kind).cloned()
    }

    // -----------------------------------------------------------------------
    // Spending
    // -----------------------------------------------------------------------

    /// Checks `amount_sats` against the member's limit without recording it.
    pub fn validate_spending(&self, member: &MemberContext, amount_sats: u64) -> SpendingDecision {
        self.spending.check(member, amount_sats)
    }

    /// Amount and limit checks shared by every outgoing operation.
    pub(crate) fn check_outgoing(
        &self,
        member: &MemberContext,
        amount_sats: u64,
    ) -> Result<(), SdkError> {
        if amount_sats == 0 {
            return Err(SdkError::InvalidAmount);
        }
        let decision = self.spending.check(member, amount_sats);
        if !decision.allowed {
            info!(
                member_id = %member.member_id,
                role = %member.role,
                amount_sats,
                remaining = decision.remaining.unwrap_or(0),
                "spending limit requires approval"
            );
            return Err(SdkError::SpendingLimitExceeded {
                requested: amount_sats,
                remaining: decision.remaining.unwrap_or(0),
                requires_approval: decision.requires_approval,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Creates an invoice for a family member. The result always carries a
    /// privacy-wrapped invoice.
    pub async fn create_family_invoice(
        &self,
        amount_sats: u64,
        description: &str,
    ) -> Result<InvoiceResult, OperationError> {
        let mut tracker = self.tracker(OperationKind::FamilyInvoice);
        let _guard = match self.admit() {
            Ok(guard) => guard,
            Err(e) => return Err(tracker.fail(OperationStep::Admission, e)),
        };
        if let Err(e) = receiving_amount(amount_sats, &mut tracker) {
            return Err(tracker.fail(OperationStep::SpendingLimit, e));
        }

        let request = RoutingRequest {
            is_internal: true,
            is_family: true,
            amount_sats,
            payment_type: PaymentType::InternalLightning,
        };
        let attempt = FamilyInvoiceAttempt {
            amount_sats,
            description,
        };
        match self.run_with_fallback(&mut tracker, &request, &attempt).await {
            Ok((outcome, routing)) => {
                let operation_id = tracker.id();
                tracker.succeed();
                Ok(InvoiceResult {
                    invoice: outcome.invoice,
                    privacy: outcome.privacy,
                    routing,
                    operation_id,
                })
            }
            Err(failure) => Err(tracker.fail(failure.step, failure.error)),
        }
    }

    /// Creates an invoice for an outside payer. Privacy is best effort.
    pub async fn create_external_invoice(
        &self,
        amount_sats: u64,
        description: &str,
        request_privacy: bool,
    ) -> Result<InvoiceResult, OperationError> {
        let mut tracker = self.tracker(OperationKind::ExternalInvoice);
        let _guard = match self.admit() {
            Ok(guard) => guard,
            Err(e) => return Err(tracker.fail(OperationStep::Admission, e)),
        };
        if let Err(e) = receiving_amount(amount_sats, &mut tracker) {
            return Err(tracker.fail(OperationStep::SpendingLimit, e));
        }

        let request = RoutingRequest {
            is_internal: false,
            is_family: false,
            amount_sats,
            payment_type: PaymentType::ExternalLightning,
        };
        let attempt = ExternalInvoiceAttempt {
            amount_sats,
            description,
            request_privacy,
        };
        match self.run_with_fallback(&mut tracker, &request, &attempt).await {
            Ok((outcome, routing)) => {
                let operation_id = tracker.id();
                tracker.succeed();
                Ok(InvoiceResult {
                    invoice: outcome.invoice,
                    privacy: outcome.privacy,
                    routing,
                    operation_id,
                })
            }
            Err(failure) => Err(tracker.fail(failure.step, failure.error)),
        }
    }

    /// Pays a family member's invoice through a privacy wrap.
    pub async fn send_family_payment(
        &self,
        member: &MemberContext,
        invoice: &str,
        amount_sats: u64,
    ) -> Result<PaymentResult, OperationError> {
        let request = RoutingRequest {
            is_internal: true,
            is_family: true,
            amount_sats,
            payment_type: PaymentType::InternalLightning,
        };
        let attempt = FamilyPaymentAttempt {
            invoice,
            amount_sats,
        };
        self.pay(OperationKind::FamilyPayment, member, request, &attempt)
            .await
    }

    /// Pays an outside invoice.
    pub async fn pay_external_invoice(
        &self,
        member: &MemberContext,
        invoice: &str,
        amount_sats: u64,
    ) -> Result<PaymentResult, OperationError> {
        let request = RoutingRequest {
            is_internal: false,
            is_family: false,
            amount_sats,
            payment_type: PaymentType::ExternalLightning,
        };
        let attempt = ExternalPaymentAttempt {
            invoice,
            amount_sats,
        };
        self.pay(OperationKind::ExternalPayment, member, request, &attempt)
            .await
    }

    async fn pay<A>(
        &self,
        kind: OperationKind,
        member: &MemberContext,
        request: RoutingRequest,
        attempt: &A,
    ) -> Result<PaymentResult, OperationError>
    where
        A: Attempt<P, Output = attempt::PaymentOutcome>,
    {
        let mut tracker = self.tracker(kind);
        let _guard = match self.admit() {
            Ok(guard) => guard,
            Err(e) => return Err(tracker.fail(OperationStep::Admission, e)),
        };
        let t = Instant::now();
        if let Err(e) = self.check_outgoing(member, request.amount_sats) {
            return Err(tracker.fail(OperationStep::SpendingLimit, e));
        }
        tracker.step_ok(OperationStep::SpendingLimit, t.elapsed());

        match self.run_with_fallback(&mut tracker, &request, attempt).await {
            Ok((outcome, routing)) => {
                self.spending.record(member, request.amount_sats);
                let operation_id = tracker.id();
                tracker.succeed();
                Ok(PaymentResult {
                    receipt: outcome.receipt,
                    privacy: outcome.privacy,
                    routing,
                    operation_id,
                })
            }
            Err(failure) => Err(tracker.fail(failure.step, failure.error)),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    pub(crate) fn tracker(&self, kind: OperationKind) -> OperationTracker {
        OperationTracker::start(self.operation_store.clone(), kind)
    }

    pub(crate) fn admit(&self) -> Result<InFlightGuard<'_>, SdkError> {
        InFlightGuard::acquire(&self.in_flight)
    }

    /// Steps 3 to 6: resolve, then run `attempt` on each candidate until one
    /// succeeds. The caller must hold the in-flight guard.
    pub(crate) async fn run_with_fallback<A: Attempt<P>>(
        &self,
        tracker: &mut OperationTracker,
        request: &RoutingRequest,
        attempt: &A,
    ) -> Result<(A::Output, PaymentRouting), AttemptFailure> {
        let t = Instant::now();
        let routing = self
            .manager
            .resolve_routing(request)
            .map_err(|error| AttemptFailure {
                step: OperationStep::RoutingResolution,
                error,
            })?;
        tracker.step_ok(OperationStep::RoutingResolution, t.elapsed());

        let restore = RestoreGuard::new(&self.active);
        let original = restore.original();
        let candidates = routing.candidates();
        let mut first_failure: Option<AttemptFailure> = None;

        for (i, &kind) in candidates.iter().enumerate() {
            let t = Instant::now();
            if let Err(error) = self.activate(kind) {
                warn!(
                    op_id = %tracker.id(),
                    backend = %kind,
                    error = %error,
                    "backend activation failed"
                );
                tracker.step_failed(
                    OperationStep::BackendActivation(kind),
                    error.clone(),
                    t.elapsed(),
                );
                first_failure.get_or_insert(AttemptFailure {
                    step: OperationStep::BackendActivation(kind),
                    error,
                });
                continue;
            }
            tracker.step_ok(OperationStep::BackendActivation(kind), t.elapsed());
            let Some(backend) = self.connector(kind) else {
                continue;
            };

            let t = Instant::now();
            let outcome = tokio::time::timeout(
                self.config.attempt_timeout(),
                attempt.run(backend, &self.privacy),
            )
            .await
            .unwrap_or_else(|_| {
                Err(AttemptFailure {
                    step: OperationStep::Execute(kind),
                    error: SdkError::Timeout,
                })
            });
            let latency_ms = t.elapsed().as_millis() as u64;

            match outcome {
                Ok(output) => {
                    self.manager.update_health(
                        kind,
                        HealthUpdate {
                            success: true,
                            latency_ms,
                            error: None,
                        },
                    );
                    tracker.step_ok(OperationStep::Execute(kind), t.elapsed());
                    restore.disarm();
                    info!(
                        op_id = %tracker.id(),
                        backend = %kind,
                        attempt = i + 1,
                        amount_sats = request.amount_sats,
                        "router attempt succeeded"
                    );
                    return Ok((
                        output,
                        PaymentRouting {
                            preferred_backend: kind,
                            fallback_backends: candidates[i + 1..].to_vec(),
                            reason: routing.reason,
                        },
                    ));
                }
                Err(failure) => {
                    self.manager.update_health(
                        kind,
                        HealthUpdate {
                            success: false,
                            latency_ms,
                            error: Some(failure.error.to_string()),
                        },
                    );
                    warn!(
                        op_id = %tracker.id(),
                        backend = %kind,
                        step = %failure.step,
                        error = %failure.error,
                        remaining = candidates.len() - i - 1,
                        "router attempt failed"
                    );
                    tracker.step_failed(failure.step.clone(), failure.error.clone(), t.elapsed());
                    first_failure.get_or_insert(failure);
                }
            }
        }

        let t = Instant::now();
        match restore.restore() {
            Ok(()) => tracker.step_ok(OperationStep::Restore, t.elapsed()),
            Err(e) => tracker.step_failed(OperationStep::Restore, e, t.elapsed()),
        }
        warn!(
            op_id = %tracker.id(),
            restored = ?original,
            tried = candidates.len(),
            "every backend failed"
        );
        Err(first_failure.unwrap_or(AttemptFailure {
            step: OperationStep::RoutingResolution,
            error: SdkError::InactiveBackend,
        }))
    }
}

fn receiving_amount(amount_sats: u64, tracker: &mut OperationTracker) -> Result<(), SdkError> {
    if amount_sats == 0 {
        return Err(SdkError::InvalidAmount);
    }
    tracker.step_skipped(OperationStep::SpendingLimit);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
