//! Step-level records of connects, router operations and conversions.
//!
//! Each tracked call opens an [`Operation`] and appends one [`StepRecord`]
//! per step it reaches, including every backend tried by the fallback loop.
//! A failed call returns an [`OperationError`] carrying the failing step and
//! everything recorded before it, so a caller can see that `voltage` timed
//! out and `breez` was never reached without reading logs.
//!
//! Records go to an [`OperationStore`]. [`NoopOperationStore`] is the
//! default; [`InMemoryOperationStore`] keeps a bounded history.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hearth_core::BackendKind;
use tracing::debug;

use crate::SdkError;
use crate::utils::now_millis;

// ---------------------------------------------------------------------------
// Identifiers and kinds
// ---------------------------------------------------------------------------

/// Process-unique operation id, displayed as `op-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl OperationId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationKind {
    Connect,
    FamilyInvoice,
    ExternalInvoice,
    FamilyPayment,
    ExternalPayment,
    Conversion,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::FamilyInvoice => "family_invoice",
            Self::ExternalInvoice => "external_invoice",
            Self::FamilyPayment => "family_payment",
            Self::ExternalPayment => "external_payment",
            Self::Conversion => "conversion",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed,
    /// Dropped before it finished, e.g. by a cancelled future.
    Cancelled,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// A step of a tracked operation.
///
/// Router and bridge operations run
/// `Admission -> SpendingLimit -> RoutingResolution`, then
/// `BackendActivation -> PrivacyWrap -> Execute` once per candidate, and
/// `Restore` when every candidate failed. Conversions add `TokenParse`
/// before the limit check and `TokenMint` after settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationStep {
    // quorum client
    ProbeGuardians,
    QuorumCheck,
    BalanceSync,

    // router and bridge
    Admission,
    SpendingLimit,
    RoutingResolution,
    BackendActivation(BackendKind),
    PrivacyWrap(BackendKind),
    Execute(BackendKind),
    Restore,

    // bridge only
    TokenParse,
    TokenMint,
}

impl OperationStep {
    /// The backend this step ran against, for per-candidate steps.
    pub fn backend(&self) -> Option<BackendKind> {
        match *self {
            Self::BackendActivation(kind) | Self::PrivacyWrap(kind) | Self::Execute(kind) => {
                Some(kind)
            }
            _ => None,
        }
    }
}

impl fmt::Display for OperationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProbeGuardians => f.write_str("probe_guardians"),
            Self::QuorumCheck => f.write_str("quorum_check"),
            Self::BalanceSync => f.write_str("balance_sync"),
            Self::Admission => f.write_str("admission"),
            Self::SpendingLimit => f.write_str("spending_limit"),
            Self::RoutingResolution => f.write_str("routing_resolution"),
            Self::BackendActivation(kind) => write!(f, "backend_activation({kind})"),
            Self::PrivacyWrap(kind) => write!(f, "privacy_wrap({kind})"),
            Self::Execute(kind) => write!(f, "execute({kind})"),
            Self::Restore => f.write_str("restore"),
            Self::TokenParse => f.write_str("token_parse"),
            Self::TokenMint => f.write_str("token_mint"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Ok,
    Failed(SdkError),
    /// Not needed on this call, e.g. the balance was already synced.
    Skipped,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Failed(e) => write!(f, "failed({e})"),
            Self::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: OperationStep,
    pub outcome: StepOutcome,
    /// Unix ms.
    pub timestamp_ms: u64,
    /// `None` for skipped steps.
    pub duration: Option<Duration>,
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub steps: Vec<StepRecord>,
    /// Unix ms.
    pub started_at_ms: u64,
    pub finished_at_ms: Option<u64>,
}

impl Operation {
    fn open(kind: OperationKind) -> Self {
        Self {
            id: OperationId::next(),
            kind,
            status: OperationStatus::InProgress,
            steps: Vec::new(),
            started_at_ms: now_millis(),
            finished_at_ms: None,
        }
    }

    fn close(&mut self, status: OperationStatus) {
        self.status = status;
        self.finished_at_ms = Some(now_millis());
    }

    pub fn is_finished(&self) -> bool {
        self.status != OperationStatus::InProgress
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Backends that executed, in attempt order.
    pub fn backends_tried(&self) -> Vec<BackendKind> {
        self.steps
            .iter()
            .filter(|s| matches!(s.step, OperationStep::Execute(_)))
            .filter_map(|s| s.step.backend())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// OperationError
// ---------------------------------------------------------------------------

/// An [`SdkError`] with the step it happened at and the steps before it.
#[derive(Debug, Clone)]
pub struct OperationError {
    pub operation_id: OperationId,
    pub error: SdkError,
    pub failed_step: OperationStep,
    /// Includes failed attempts on earlier fallback candidates.
    pub completed_steps: Vec<StepRecord>,
}

impl OperationError {
    pub fn kind(&self) -> crate::ErrorKind {
        self.error.kind()
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed at {}: {}", self.operation_id, self.failed_step, self.error)
    }
}

impl std::error::Error for OperationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<OperationError> for SdkError {
    fn from(e: OperationError) -> Self {
        e.error
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Sink for operation records. Implementations must not block.
pub trait OperationStore: Send + Sync {
    fn begin(&self, op: &Operation);

    fn append(&self, id: OperationId, step: &StepRecord);

    fn finish(&self, id: OperationId, status: OperationStatus);

    fn get(&self, id: OperationId) -> Option<Operation>;

    /// Operations not yet finished, oldest first.
    fn in_progress(&self) -> Vec<Operation>;
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOperationStore;

impl OperationStore for NoopOperationStore {
    fn begin(&self, _op: &Operation) {}

    fn append(&self, _id: OperationId, _step: &StepRecord) {}

    fn finish(&self, _id: OperationId, _status: OperationStatus) {}

    fn get(&self, _id: OperationId) -> Option<Operation> {
        None
    }

    fn in_progress(&self) -> Vec<Operation> {
        Vec::new()
    }
}

/// Keeps the most recent operations in memory.
///
/// Once `limit` records are held, the oldest finished operation is evicted
/// to make room. Running operations are never evicted, so the store can
/// exceed `limit` while many operations are in flight.
#[derive(Debug)]
pub struct InMemoryOperationStore {
    ops: Mutex<VecDeque<Operation>>,
    limit: usize,
}

impl InMemoryOperationStore {
    pub const DEFAULT_LIMIT: usize = 1_024;

    pub fn new() -> Self {
        Self::with_limit(Self::DEFAULT_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            ops: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
        }
    }

    /// Every held operation, oldest first.
    pub fn all(&self) -> Vec<Operation> {
        self.ops
            .lock()
            .map(|ops| ops.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.ops.lock().map(|ops| ops.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_op(&self, id: OperationId, f: impl FnOnce(&mut Operation)) {
        if let Ok(mut ops) = self.ops.lock() {
            if let Some(op) = ops.iter_mut().rev().find(|op| op.id == id) {
                f(op);
            }
        }
    }
}

impl Default for InMemoryOperationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationStore for InMemoryOperationStore {
    fn begin(&self, op: &Operation) {
        let Ok(mut ops) = self.ops.lock() else {
            return;
        };
        while ops.len() >= self.limit {
            let Some(pos) = ops.iter().position(Operation::is_finished) else {
                break;
            };
            ops.remove(pos);
        }
        ops.push_back(op.clone());
    }

    fn append(&self, id: OperationId, step: &StepRecord) {
        self.with_op(id, |op| op.steps.push(step.clone()));
    }

    fn finish(&self, id: OperationId, status: OperationStatus) {
        self.with_op(id, |op| op.close(status));
    }

    fn get(&self, id: OperationId) -> Option<Operation> {
        let ops = self.ops.lock().ok()?;
        ops.iter().rev().find(|op| op.id == id).cloned()
    }

    fn in_progress(&self) -> Vec<Operation> {
        self.ops
            .lock()
            .map(|ops| ops.iter().filter(|op| !op.is_finished()).cloned().collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// OperationTracker
// ---------------------------------------------------------------------------

/// Live operation plus the store it reports to. Consumed by
/// [`succeed`](Self::succeed) or [`fail`](Self::fail).
pub(crate) struct OperationTracker {
    store: Arc<dyn OperationStore>,
    op: Operation,
}

impl OperationTracker {
    pub fn start(store: Arc<dyn OperationStore>, kind: OperationKind) -> Self {
        let op = Operation::open(kind);
        store.begin(&op);
        Self { store, op }
    }

    pub fn id(&self) -> OperationId {
        self.op.id
    }

    fn push(&mut self, step: OperationStep, outcome: StepOutcome, elapsed: Option<Duration>) {
        debug!(
            op_id = %self.op.id,
            kind = %self.op.kind,
            %step,
            %outcome,
            elapsed_ms = elapsed.map(|d| d.as_millis() as u64),
            "step recorded"
        );
        let record = StepRecord {
            step,
            outcome,
            timestamp_ms: now_millis(),
            duration: elapsed,
        };
        self.store.append(self.op.id, &record);
        self.op.steps.push(record);
    }

    pub fn step_ok(&mut self, step: OperationStep, elapsed: Duration) {
        self.push(step, StepOutcome::Ok, Some(elapsed));
    }

    /// Records a failure the operation recovers from, such as one fallback
    /// candidate.
    pub fn step_failed(&mut self, step: OperationStep, error: SdkError, elapsed: Duration) {
        self.push(step, StepOutcome::Failed(error), Some(elapsed));
    }

    pub fn step_skipped(&mut self, step: OperationStep) {
        self.push(step, StepOutcome::Skipped, None);
    }

    pub fn succeed(mut self) {
        self.op.close(OperationStatus::Succeeded);
        self.store.finish(self.op.id, OperationStatus::Succeeded);
    }

    pub fn fail(mut self, failed_step: OperationStep, error: SdkError) -> OperationError {
        self.op.close(OperationStatus::Failed);
        self.store.finish(self.op.id, OperationStatus::Failed);
        OperationError {
            operation_id: self.op.id,
            error,
            failed_step,
            completed_steps: std::mem::take(&mut self.op.steps),
        }
    }
}

impl Drop for OperationTracker {
    fn drop(&mut self) {
        if self.op.is_finished() {
            return;
        }
        debug!(
            op_id = %self.op.id,
            kind = %self.op.kind,
            "operation dropped before finishing"
        );
        self.op.close(OperationStatus::Cancelled);
        self.store.finish(self.op.id, OperationStatus::Cancelled);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
