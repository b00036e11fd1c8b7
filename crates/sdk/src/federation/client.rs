//! Guardian quorum client.
//!
//! # Connect
//!
//! 1. Probe every guardian concurrently, each bounded by the probe timeout
//! 2. Wait for all probes; failures, timeouts and mismatched guardian ids
//!    count as offline
//! 3. Require `online >= threshold` (syncing guardians do not count)
//! 4. Sync the balance from the gateway once; a failed sync is retried on
//!    the next connect
//!
//! # Notes
//!
//! Issuance splits the amount over the canonical denominations and debits
//! the balance. Redemption validates the whole batch before crediting
//! anything.

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use futures::future::join_all;
use hearth_config::FederationConfig;
use hearth_core::{FederationId, InviteCode};
use hearth_transport::{GuardianTransport, LivenessRequest, LivenessResponse, LivenessState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{NoteRejection, RejectReason};
use crate::events::{Event, Events};
use crate::notes::{ElectronicCashNote, InMemoryNoteStore, NoteKeyDeriver, NoteStore, split_greedy};
use crate::tracking::{
    NoopOperationStore, OperationError, OperationId, OperationKind, OperationStep, OperationStore,
    OperationTracker,
};
use crate::utils::{now_millis, random_hex};
use crate::SdkError;

use super::gateway::{GatewayInvoice, GatewayPayment, LightningGateway};
use super::guardian::{Guardian, GuardianStatus};
use super::health::FederationHealth;

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// What a client needs to know about the federation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationMembershipConfig {
    pub federation_id: FederationId,
    /// One entry per guardian, in guardian index order.
    pub guardian_endpoints: Vec<String>,
    pub threshold: usize,
    pub total_guardians: usize,
    pub invite_code: Option<InviteCode>,
}

impl FederationMembershipConfig {
    /// Checks `1 <= threshold <= total_guardians == guardian_endpoints.len()`.
    pub fn validate(&self) -> Result<(), SdkError> {
        if self.total_guardians == 0 || self.guardian_endpoints.is_empty() {
            return Err(SdkError::NoGuardians);
        }
        if self.threshold == 0
            || self.threshold > self.total_guardians
            || self.guardian_endpoints.len() != self.total_guardians
        {
            return Err(SdkError::InvalidThreshold {
                threshold: self.threshold,
                guardians: self.guardian_endpoints.len(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Outcome of a successful connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReport {
    pub operation_id: OperationId,
    pub online: usize,
    pub syncing: usize,
    pub total: usize,
    pub threshold: usize,
    /// Highest epoch reported by an online guardian.
    pub epoch_height: u64,
    pub balance_sats: u64,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ClientState {
    guardians: Vec<Guardian>,
    connected: bool,
    balance_sats: u64,
    balance_synced: bool,
    epoch_height: u64,
}

enum ProbeOutcome {
    Answered(LivenessResponse),
    Offline,
}

// ---------------------------------------------------------------------------
// QuorumClient
// ---------------------------------------------------------------------------

/// One federation membership.
///
/// # Type Parameters
///
/// - `P`: guardian liveness transport
/// - `G`: federation Lightning gateway
/// - `N`: note storage
pub struct QuorumClient<P, G, N = InMemoryNoteStore> {
    federation_id: FederationId,
    threshold: usize,
    config: FederationConfig,
    transport: P,
    gateway: G,
    notes: N,
    keys: NoteKeyDeriver,
    events: Arc<Events>,
    operation_store: Arc<dyn OperationStore>,
    state: RwLock<ClientState>,
}

impl<P, G, N> std::fmt::Debug for QuorumClient<P, G, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuorumClient")
            .field("federation_id", &self.federation_id)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl<P, G, N> QuorumClient<P, G, N>
where
    P: GuardianTransport,
    G: LightningGateway,
    N: NoteStore,
{
    /// Builds a disconnected client. No network I/O happens here.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::NoGuardians`] or [`SdkError::InvalidThreshold`]
    /// if the membership is inconsistent.
    pub fn new(
        membership: &FederationMembershipConfig,
        config: FederationConfig,
        transport: P,
        gateway: G,
        notes: N,
    ) -> Result<Self, SdkError> {
        membership.validate()?;
        Ok(Self {
            federation_id: membership.federation_id.clone(),
            threshold: membership.threshold,
            config,
            transport,
            gateway,
            notes,
            keys: NoteKeyDeriver::random(),
            events: Arc::new(Events::new()),
            operation_store: Arc::new(NoopOperationStore),
            state: RwLock::new(ClientState {
                guardians: Guardian::from_endpoints(&membership.guardian_endpoints),
                connected: false,
                balance_sats: 0,
                balance_synced: false,
                epoch_height: 0,
            }),
        })
    }

    /// Shares an event registry with other clients.
    pub fn with_events(mut self, events: Arc<Events>) -> Self {
        self.events = events;
        self
    }

    pub fn with_operation_store(mut self, store: Arc<dyn OperationStore>) -> Self {
        self.operation_store = store;
        self
    }

    pub fn with_key_deriver(mut self, keys: NoteKeyDeriver) -> Self {
        self.keys = keys;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn federation_id(&self) -> &FederationId {
        &self.federation_id
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn events(&self) -> &Arc<Events> {
        &self.events
    }

    pub fn notes(&self) -> &N {
        &self.notes
    }

    pub fn is_connected(&self) -> bool {
        self.read().map(|s| s.connected).unwrap_or(false)
    }

    pub fn balance_sats(&self) -> u64 {
        self.read().map(|s| s.balance_sats).unwrap_or(0)
    }

    pub fn epoch_height(&self) -> u64 {
        self.read().map(|s| s.epoch_height).unwrap_or(0)
    }

    /// Snapshot of the guardian list.
    pub fn guardians(&self) -> Vec<Guardian> {
        self.read().map(|s| s.guardians.clone()).unwrap_or_default()
    }

    pub fn health(&self) -> FederationHealth {
        FederationHealth::from_guardians(
            self.federation_id.clone(),
            &self.guardians(),
            self.threshold,
        )
    }

    /// Replaces guardian endpoints (e.g. after a reconstructed join learns
    /// real membership data). Statuses reset to offline and the client
    /// disconnects.
    pub fn replace_endpoints(&self, endpoints: &[String]) -> Result<(), SdkError> {
        let mut state = self.write()?;
        if endpoints.len() != state.guardians.len() {
            return Err(SdkError::InvalidThreshold {
                threshold: self.threshold,
                guardians: endpoints.len(),
            });
        }
        state.guardians = Guardian::from_endpoints(endpoints);
        state.connected = false;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Connect / disconnect
    // -----------------------------------------------------------------------

    /// Probes every guardian and connects iff a quorum answers `online`.
    ///
    /// # Errors
    ///
    /// Fails at [`OperationStep::QuorumCheck`] with
    /// [`SdkError::QuorumUnavailable`]; probe failures never surface.
    pub async fn connect(&self) -> Result<ConnectReport, OperationError> {
        let mut tracker =
            OperationTracker::start(self.operation_store.clone(), OperationKind::Connect);
        let op_id = tracker.id();

        let targets: Vec<(String, String)> = match self.read() {
            Ok(state) => state
                .guardians
                .iter()
                .map(|g| (g.id.clone(), g.endpoint.clone()))
                .collect(),
            Err(e) => return Err(tracker.fail(OperationStep::ProbeGuardians, e)),
        };

        // Probe all guardians concurrently.
        let t = Instant::now();
        let requests: Vec<LivenessRequest> = targets
            .iter()
            .map(|(guardian_id, _)| LivenessRequest {
                federation_id: self.federation_id.to_string(),
                guardian_id: guardian_id.clone(),
                nonce: random_hex(16),
            })
            .collect();
        let outcomes = join_all(
            targets
                .iter()
                .zip(&requests)
                .map(|((_, endpoint), request)| self.probe_one(endpoint, request)),
        )
        .await;
        tracker.step_ok(OperationStep::ProbeGuardians, t.elapsed());

        let now = now_millis();
        let (online, syncing, total, epoch_height) = {
            let mut state = match self.write() {
                Ok(s) => s,
                Err(e) => return Err(tracker.fail(OperationStep::QuorumCheck, e)),
            };
            let mut max_epoch = 0;
            for (guardian, outcome) in state.guardians.iter_mut().zip(outcomes) {
                match outcome {
                    ProbeOutcome::Answered(resp) => {
                        guardian.status = match resp.state {
                            LivenessState::Online => {
                                max_epoch = max_epoch.max(resp.epoch_height);
                                GuardianStatus::Online
                            }
                            LivenessState::Syncing => GuardianStatus::Syncing,
                        };
                        guardian.last_seen = Some(now);
                        if resp.public_key.is_some() {
                            guardian.public_key = resp.public_key;
                        }
                    }
                    ProbeOutcome::Offline => guardian.status = GuardianStatus::Offline,
                }
            }
            let online = state.guardians.iter().filter(|g| g.is_online()).count();
            let syncing = state
                .guardians
                .iter()
                .filter(|g| g.status == GuardianStatus::Syncing)
                .count();
            let quorum = online >= self.threshold;
            state.connected = quorum;
            if quorum {
                state.epoch_height = max_epoch;
            }
            (online, syncing, state.guardians.len(), max_epoch)
        };

        if online < self.threshold {
            warn!(
                op_id = %op_id,
                federation_id = %self.federation_id,
                online,
                threshold = self.threshold,
                "quorum unavailable"
            );
            self.events.emit(Event::ConnectionFailed {
                federation_id: self.federation_id.clone(),
                online,
                threshold: self.threshold,
            });
            return Err(tracker.fail(
                OperationStep::QuorumCheck,
                SdkError::QuorumUnavailable {
                    online,
                    threshold: self.threshold,
                },
            ));
        }
        tracker.step_ok(OperationStep::QuorumCheck, t.elapsed());

        info!(
            op_id = %op_id,
            federation_id = %self.federation_id,
            online,
            syncing,
            total,
            threshold = self.threshold,
            epoch_height,
            "federation connected"
        );
        self.events.emit(Event::Connected {
            federation_id: self.federation_id.clone(),
            online,
            threshold: self.threshold,
            total,
        });

        self.sync_balance_once(&mut tracker).await;
        let balance_sats = self.balance_sats();
        tracker.succeed();

        Ok(ConnectReport {
            operation_id: op_id,
            online,
            syncing,
            total,
            threshold: self.threshold,
            epoch_height,
            balance_sats,
        })
    }

    async fn probe_one(&self, endpoint: &str, request: &LivenessRequest) -> ProbeOutcome {
        let probe = self.transport.probe(endpoint, request);
        match tokio::time::timeout(self.config.probe_timeout(), probe).await {
            Ok(Ok(resp)) if resp.guardian_id == request.guardian_id => ProbeOutcome::Answered(resp),
            Ok(Ok(resp)) => {
                warn!(
                    guardian_id = %request.guardian_id,
                    answered_as = %resp.guardian_id,
                    "guardian id mismatch"
                );
                ProbeOutcome::Offline
            }
            Ok(Err(e)) => {
                debug!(guardian_id = %request.guardian_id, error = %e, "probe failed");
                ProbeOutcome::Offline
            }
            Err(_) => {
                debug!(guardian_id = %request.guardian_id, "probe timed out");
                ProbeOutcome::Offline
            }
        }
    }

    async fn sync_balance_once(&self, tracker: &mut OperationTracker) {
        if self.read().map(|s| s.balance_synced).unwrap_or(false) {
            tracker.step_skipped(OperationStep::BalanceSync);
            return;
        }

        let t = Instant::now();
        match self.gateway.balance(&self.federation_id).await {
            Ok(balance_sats) => {
                if let Ok(mut state) = self.write() {
                    state.balance_sats = balance_sats;
                    state.balance_synced = true;
                }
                tracker.step_ok(OperationStep::BalanceSync, t.elapsed());
                self.events.emit(Event::BalanceSynced {
                    federation_id: self.federation_id.clone(),
                    balance_sats,
                });
            }
            Err(e) => {
                warn!(
                    op_id = %tracker.id(),
                    federation_id = %self.federation_id,
                    error = %e,
                    "balance sync failed (will retry on next connect)"
                );
                tracker.step_failed(OperationStep::BalanceSync, e, t.elapsed());
            }
        }
    }

    /// Drops the connected flag.
    pub fn disconnect(&self) {
        if let Ok(mut state) = self.write() {
            state.connected = false;
        }
        info!(federation_id = %self.federation_id, "federation disconnected");
        self.events.emit(Event::Disconnected {
            federation_id: self.federation_id.clone(),
        });
    }

    // -----------------------------------------------------------------------
    // E-cash
    // -----------------------------------------------------------------------

    /// Issues notes worth exactly `amount_sats`, debiting the balance.
    pub fn issue_ecash(&self, amount_sats: u64) -> Result<Vec<ElectronicCashNote>, SdkError> {
        if amount_sats == 0 {
            return Err(SdkError::InvalidAmount);
        }
        self.debit(amount_sats)?;

        let Some(denominations) = split_greedy(
            amount_sats,
            self.config.denominations,
            self.config.max_notes_per_issue,
        ) else {
            self.credit(amount_sats);
            return Err(SdkError::InvalidAmount);
        };

        let issued_at = now_millis();
        let expires_at = issued_at.saturating_add(self.config.note_ttl_ms());
        let notes: Vec<ElectronicCashNote> = denominations
            .into_iter()
            .map(|denomination| {
                let note_id = random_hex(32);
                ElectronicCashNote {
                    amount: denomination,
                    spend_key: self.keys.derive(&self.federation_id, &note_id),
                    note_id,
                    denomination,
                    issued_at,
                    expires_at,
                }
            })
            .collect();

        if let Err(e) = self.notes.insert_notes(&notes) {
            self.credit(amount_sats);
            return Err(e.into());
        }

        info!(
            federation_id = %self.federation_id,
            amount_sats,
            note_count = notes.len(),
            "e-cash issued"
        );
        self.events.emit(Event::EcashIssued {
            federation_id: self.federation_id.clone(),
            amount_sats,
            note_count: notes.len(),
        });
        Ok(notes)
    }

    /// Redeems a batch of notes. Either every note is accepted and the sum
    /// is credited, or nothing changes.
    ///
    /// Returns the credited amount.
    pub fn redeem_ecash(&self, notes: &[ElectronicCashNote]) -> Result<u64, SdkError> {
        self.require_connected()?;
        if notes.is_empty() {
            return Err(SdkError::EmptyBatch);
        }

        let now = now_millis();
        let mut seen = HashSet::with_capacity(notes.len());
        let mut total: u64 = 0;
        for note in notes {
            if let Some(reason) = self.check_note(note, now, &mut seen)? {
                warn!(
                    federation_id = %self.federation_id,
                    note_id = %note.note_id,
                    %reason,
                    "redemption batch rejected"
                );
                return Err(SdkError::InvalidNotes(NoteRejection {
                    note_id: note.note_id.clone(),
                    reason,
                }));
            }
            total = total.checked_add(note.amount).ok_or(SdkError::InvalidAmount)?;
        }

        let ids: Vec<&str> = notes.iter().map(|n| n.note_id.as_str()).collect();
        self.notes.mark_redeemed(&ids)?;
        self.credit(total);

        info!(
            federation_id = %self.federation_id,
            amount_sats = total,
            note_count = notes.len(),
            "e-cash redeemed"
        );
        self.events.emit(Event::EcashRedeemed {
            federation_id: self.federation_id.clone(),
            amount_sats: total,
            note_count: notes.len(),
        });
        Ok(total)
    }

    fn check_note<'a>(
        &self,
        note: &'a ElectronicCashNote,
        now_ms: u64,
        seen: &mut HashSet<&'a str>,
    ) -> Result<Option<RejectReason>, SdkError> {
        if note.is_expired(now_ms) {
            return Ok(Some(RejectReason::Expired));
        }
        if !self.config.is_denomination(note.denomination) || note.denomination != note.amount {
            return Ok(Some(RejectReason::BadDenomination));
        }
        if !seen.insert(note.note_id.as_str()) {
            return Ok(Some(RejectReason::DuplicateInBatch));
        }
        if self.notes.is_redeemed(&note.note_id)? {
            return Ok(Some(RejectReason::AlreadyRedeemed));
        }
        if let Some(held) = self.notes.get_note(&note.note_id)? {
            if held.spend_key != note.spend_key {
                return Ok(Some(RejectReason::SpendKeyMismatch));
            }
        }
        Ok(None)
    }

    // -----------------------------------------------------------------------
    // Lightning proxy
    // -----------------------------------------------------------------------

    pub async fn create_lightning_invoice(
        &self,
        amount_sats: u64,
        description: &str,
    ) -> Result<GatewayInvoice, SdkError> {
        self.require_connected()?;
        if amount_sats == 0 {
            return Err(SdkError::InvalidAmount);
        }
        let invoice = self
            .gateway
            .create_invoice(&self.federation_id, amount_sats, description)
            .await?;
        self.events.emit(Event::InvoiceCreated {
            federation_id: self.federation_id.clone(),
            amount_sats,
        });
        Ok(invoice)
    }

    /// Pays through the gateway. The amount is reserved before the call and
    /// restored if the gateway fails.
    pub async fn pay_lightning_invoice(
        &self,
        invoice: &str,
        amount_sats: u64,
    ) -> Result<GatewayPayment, SdkError> {
        if amount_sats == 0 {
            return Err(SdkError::InvalidAmount);
        }
        self.debit(amount_sats)?;

        match self
            .gateway
            .pay_invoice(&self.federation_id, invoice, amount_sats)
            .await
        {
            Ok(payment) => {
                info!(
                    federation_id = %self.federation_id,
                    amount_sats,
                    fee_sats = payment.fee_sats,
                    "invoice paid"
                );
                self.events.emit(Event::InvoicePaid {
                    federation_id: self.federation_id.clone(),
                    amount_sats,
                });
                Ok(payment)
            }
            Err(e) => {
                self.credit(amount_sats);
                warn!(federation_id = %self.federation_id, error = %e, "gateway payment failed");
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn read(&self) -> Result<RwLockReadGuard<'_, ClientState>, SdkError> {
        self.state.read().map_err(|_| SdkError::StoreFailed)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ClientState>, SdkError> {
        self.state.write().map_err(|_| SdkError::StoreFailed)
    }

    fn require_connected(&self) -> Result<(), SdkError> {
        if self.read()?.connected {
            Ok(())
        } else {
            Err(SdkError::NotConnected)
        }
    }

    /// Connected check plus balance debit, under one write lock.
    fn debit(&self, amount_sats: u64) -> Result<(), SdkError> {
        let mut state = self.write()?;
        if !state.connected {
            return Err(SdkError::NotConnected);
        }
        if amount_sats > state.balance_sats {
            return Err(SdkError::InsufficientBalance {
                requested: amount_sats,
                available: state.balance_sats,
            });
        }
        state.balance_sats -= amount_sats;
        Ok(())
    }

    fn credit(&self, amount_sats: u64) {
        if let Ok(mut state) = self.write() {
            state.balance_sats = state.balance_sats.saturating_add(amount_sats);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hearth_transport::{ProbeScript, ScriptedTransport};

    use super::*;
    use crate::events::ChannelListener;
    use crate::fake::FakeGateway;
    use crate::tracking::{InMemoryOperationStore, StepOutcome};
    use crate::ErrorKind;

    type TestClient = QuorumClient<Arc<ScriptedTransport>, Arc<FakeGateway>>;

    fn fed() -> FederationId {
        FederationId::parse("fed_1760400000000_abcdefghi").unwrap()
    }

    fn endpoints(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("http://g{i}")).collect()
    }

    fn membership(n: usize, threshold: usize) -> FederationMembershipConfig {
        FederationMembershipConfig {
            federation_id: fed(),
            guardian_endpoints: endpoints(n),
            threshold,
            total_guardians: n,
            invite_code: None,
        }
    }

    fn fast_config() -> FederationConfig {
        FederationConfig {
            probe_timeout_ms: 50,
            ..FederationConfig::DEFAULT
        }
    }

    /// `online` guardians answer, the rest are unreachable.
    fn build(
        n: usize,
        threshold: usize,
        online: usize,
        balance: u64,
    ) -> (TestClient, Arc<ScriptedTransport>, Arc<FakeGateway>) {
        let transport = Arc::new(ScriptedTransport::new());
        for (i, ep) in endpoints(n).iter().enumerate() {
            if i < online {
                transport.set(ep, ProbeScript::Online { epoch_height: 10 + i as u64 });
            }
        }
        let gateway = Arc::new(FakeGateway::with_balance(balance));
        let client = QuorumClient::new(
            &membership(n, threshold),
            fast_config(),
            transport.clone(),
            gateway.clone(),
            InMemoryNoteStore::new(),
        )
        .unwrap();
        (client, transport, gateway)
    }

    #[test]
    fn invalid_membership_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        let gateway = Arc::new(FakeGateway::with_balance(0));
        for (n, t) in [(3, 0), (3, 4)] {
            let err = TestClient::new(
                &membership(n, t),
                fast_config(),
                transport.clone(),
                gateway.clone(),
                InMemoryNoteStore::new(),
            )
            .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[tokio::test]
    async fn connect_succeeds_iff_quorum_online() {
        for n in 1..=5 {
            for t in 1..=n {
                for online in 0..=n {
                    let (client, _, _) = build(n, t, online, 0);
                    let result = client.connect().await;
                    assert_eq!(result.is_ok(), online >= t, "n={n} t={t} online={online}");
                    assert_eq!(client.is_connected(), online >= t);
                    if let Err(e) = result {
                        assert_eq!(e.kind(), ErrorKind::Connection);
                        assert_eq!(e.failed_step, OperationStep::QuorumCheck);
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn connect_reports_epoch_and_syncs_balance() {
        let (client, _, _) = build(3, 2, 3, 5_000);
        let report = client.connect().await.unwrap();
        assert_eq!(report.online, 3);
        assert_eq!(report.epoch_height, 12);
        assert_eq!(report.balance_sats, 5_000);
        assert!(client.guardians().iter().all(|g| g.last_seen.is_some()));
        assert_eq!(
            client.guardians()[0].public_key.as_deref(),
            Some("pk_guardian_0")
        );
    }

    #[tokio::test]
    async fn syncing_hanging_and_impostor_guardians_do_not_count() {
        let transport = Arc::new(ScriptedTransport::with_scripts([
            ("http://g0", ProbeScript::Online { epoch_height: 1 }),
            ("http://g1", ProbeScript::Syncing),
            ("http://g2", ProbeScript::Hang),
            ("http://g3", ProbeScript::WrongGuardian),
        ]));
        let client = QuorumClient::new(
            &membership(4, 2),
            fast_config(),
            transport,
            Arc::new(FakeGateway::with_balance(0)),
            InMemoryNoteStore::new(),
        )
        .unwrap();

        let err = client.connect().await.unwrap_err();
        assert_eq!(
            err.error,
            SdkError::QuorumUnavailable {
                online: 1,
                threshold: 2
            }
        );
        let statuses: Vec<GuardianStatus> = client.guardians().iter().map(|g| g.status).collect();
        assert_eq!(
            statuses,
            vec![
                GuardianStatus::Online,
                GuardianStatus::Syncing,
                GuardianStatus::Offline,
                GuardianStatus::Offline
            ]
        );
    }

    #[tokio::test]
    async fn probes_run_concurrently() {
        let transport = Arc::new(ScriptedTransport::new());
        for ep in endpoints(5) {
            transport.set(&ep, ProbeScript::Delayed { delay_ms: 40, epoch_height: 1 });
        }
        let client = QuorumClient::new(
            &membership(5, 5),
            FederationConfig {
                probe_timeout_ms: 150,
                ..FederationConfig::DEFAULT
            },
            transport.clone(),
            Arc::new(FakeGateway::with_balance(0)),
            InMemoryNoteStore::new(),
        )
        .unwrap();

        let started = Instant::now();
        client.connect().await.unwrap();
        assert!(started.elapsed().as_millis() < 150);
        assert_eq!(transport.probe_count(), 5);
    }

    #[tokio::test]
    async fn failed_connect_emits_connection_failed() {
        let (client, _, _) = build(3, 2, 1, 0);
        let (listener, mut rx) = ChannelListener::new();
        client.events().add("test", Arc::new(listener));
        assert!(client.connect().await.is_err());
        assert!(matches!(
            rx.recv().await.unwrap(),
            Event::ConnectionFailed { online: 1, threshold: 2, .. }
        ));
    }

    #[tokio::test]
    async fn reconnect_reprobes_every_guardian() {
        let (client, transport, _) = build(3, 2, 3, 0);
        client.connect().await.unwrap();
        transport.set("http://g0", ProbeScript::Unreachable);
        transport.set("http://g1", ProbeScript::Unreachable);
        assert!(client.connect().await.is_err());
        assert!(!client.is_connected());
        assert_eq!(transport.probe_count(), 6);
    }

    #[tokio::test]
    async fn balance_sync_failure_is_retried_next_connect() {
        let (client, _, gateway) = build(1, 1, 1, 700);
        let store = Arc::new(InMemoryOperationStore::new());
        let client = client.with_operation_store(store.clone());

        gateway.set_fail_balance(true);
        let report = client.connect().await.unwrap();
        assert_eq!(report.balance_sats, 0);

        gateway.set_fail_balance(false);
        assert_eq!(client.connect().await.unwrap().balance_sats, 700);

        // Third connect skips the sync.
        client.connect().await.unwrap();
        let ops = store.all();
        let last_sync = ops[2]
            .steps
            .iter()
            .find(|s| s.step == OperationStep::BalanceSync)
            .unwrap();
        assert_eq!(last_sync.outcome, StepOutcome::Skipped);
        assert!(ops[0].has_failures());
    }

    #[tokio::test]
    async fn issue_then_redeem_leaves_balance_unchanged() {
        let (client, _, _) = build(3, 2, 2, 200_000);
        client.connect().await.unwrap();

        for amount in [1, 7, 1_234, 65_536, 187_654] {
            let before = client.balance_sats();
            let notes = client.issue_ecash(amount).unwrap();
            assert_eq!(notes.iter().map(|n| n.amount).sum::<u64>(), amount);
            assert_eq!(client.balance_sats(), before - amount);
            assert_eq!(client.redeem_ecash(&notes).unwrap(), amount);
            assert_eq!(client.balance_sats(), before);
        }
    }

    #[tokio::test]
    async fn issued_notes_are_canonical_with_derived_keys() {
        let (client, _, _) = build(1, 1, 1, 10_000);
        let client = client.with_key_deriver(NoteKeyDeriver::from_seed([1; 32]));
        client.connect().await.unwrap();
        let notes = client.issue_ecash(1_556).unwrap();
        let deriver = NoteKeyDeriver::from_seed([1; 32]);
        for note in &notes {
            assert_eq!(note.amount, note.denomination);
            assert_eq!(note.note_id.len(), 64);
            assert_eq!(note.spend_key, deriver.derive(&fed(), &note.note_id));
            assert_eq!(note.expires_at - note.issued_at, 30 * 24 * 60 * 60 * 1_000);
        }
        assert_eq!(client.notes().total_value().unwrap(), 1_556);
    }

    #[tokio::test]
    async fn issue_requires_balance_and_connection() {
        let (client, _, _) = build(1, 1, 1, 100);
        assert_eq!(client.issue_ecash(10).unwrap_err(), SdkError::NotConnected);
        client.connect().await.unwrap();
        assert_eq!(client.issue_ecash(0).unwrap_err(), SdkError::InvalidAmount);
        assert_eq!(
            client.issue_ecash(101).unwrap_err(),
            SdkError::InsufficientBalance {
                requested: 101,
                available: 100
            }
        );
        assert_eq!(client.balance_sats(), 100);
    }

    #[tokio::test]
    async fn oversized_issue_fails_on_balance_without_splitting() {
        let (client, _, _) = build(1, 1, 1, 100);
        client.connect().await.unwrap();
        assert_eq!(
            client.issue_ecash(u64::MAX).unwrap_err(),
            SdkError::InsufficientBalance {
                requested: u64::MAX,
                available: 100
            }
        );
        assert_eq!(client.balance_sats(), 100);
        assert_eq!(client.notes().total_value().unwrap(), 0);
    }

    #[tokio::test]
    async fn issue_beyond_note_cap_restores_balance() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set(&endpoints(1)[0], ProbeScript::Online { epoch_height: 1 });
        let client = QuorumClient::new(
            &membership(1, 1),
            FederationConfig {
                max_notes_per_issue: 2,
                ..fast_config()
            },
            transport,
            Arc::new(FakeGateway::with_balance(1_000)),
            InMemoryNoteStore::new(),
        )
        .unwrap();
        client.connect().await.unwrap();

        assert_eq!(client.issue_ecash(111).unwrap_err(), SdkError::InvalidAmount);
        assert_eq!(client.balance_sats(), 1_000);
        assert_eq!(client.issue_ecash(150).unwrap().len(), 2);
        assert_eq!(client.balance_sats(), 850);
    }

    #[tokio::test]
    async fn batch_with_expired_note_is_rejected_in_full() {
        let (client, _, _) = build(1, 1, 1, 1_000);
        client.connect().await.unwrap();
        let mut notes = client.issue_ecash(600).unwrap();
        let balance = client.balance_sats();
        notes[1].expires_at = 1;

        let err = client.redeem_ecash(&notes).unwrap_err();
        assert!(matches!(
            err,
            SdkError::InvalidNotes(NoteRejection { reason: RejectReason::Expired, .. })
        ));
        assert_eq!(client.balance_sats(), balance);
        assert_eq!(client.notes().list_notes().unwrap().len(), notes.len());
    }

    #[tokio::test]
    async fn double_redemption_is_rejected() {
        let (client, _, _) = build(1, 1, 1, 1_000);
        client.connect().await.unwrap();
        let notes = client.issue_ecash(10).unwrap();
        client.redeem_ecash(&notes).unwrap();
        let balance = client.balance_sats();

        let err = client.redeem_ecash(&notes).unwrap_err();
        assert!(matches!(
            err,
            SdkError::InvalidNotes(NoteRejection { reason: RejectReason::AlreadyRedeemed, .. })
        ));
        assert_eq!(client.balance_sats(), balance);
    }

    #[tokio::test]
    async fn tampered_notes_are_rejected() {
        let (client, _, _) = build(1, 1, 1, 1_000);
        client.connect().await.unwrap();
        let notes = client.issue_ecash(55).unwrap();

        let mut forged_key = notes.clone();
        forged_key[0].spend_key = "00".repeat(32);
        let mut inflated = notes.clone();
        inflated[0].amount = 60_000;
        let mut odd = notes.clone();
        odd[0].amount = 7;
        odd[0].denomination = 7;
        let duplicated = vec![notes[0].clone(), notes[0].clone()];

        let cases = [
            (forged_key, RejectReason::SpendKeyMismatch),
            (inflated, RejectReason::BadDenomination),
            (odd, RejectReason::BadDenomination),
            (duplicated, RejectReason::DuplicateInBatch),
        ];
        for (batch, reason) in cases {
            match client.redeem_ecash(&batch) {
                Err(SdkError::InvalidNotes(rejection)) => assert_eq!(rejection.reason, reason),
                other => panic!("expected {reason:?}, got {other:?}"),
            }
        }
        assert_eq!(client.redeem_ecash(&[]).unwrap_err(), SdkError::EmptyBatch);
        assert_eq!(client.redeem_ecash(&notes).unwrap(), 55);
    }

    #[tokio::test]
    async fn gateway_payment_failure_restores_balance() {
        let (client, _, gateway) = build(1, 1, 1, 1_000);
        client.connect().await.unwrap();

        gateway.set_fail_pay(true);
        assert_eq!(
            client.pay_lightning_invoice("lnbc1", 400).await.unwrap_err(),
            SdkError::GatewayFailed
        );
        assert_eq!(client.balance_sats(), 1_000);

        gateway.set_fail_pay(false);
        client.pay_lightning_invoice("lnbc1", 400).await.unwrap();
        assert_eq!(client.balance_sats(), 600);
        assert_eq!(
            client.pay_lightning_invoice("lnbc1", 601).await.unwrap_err(),
            SdkError::InsufficientBalance {
                requested: 601,
                available: 600
            }
        );
    }

    #[tokio::test]
    async fn invoice_creation_emits_event() {
        let (client, _, _) = build(1, 1, 1, 0);
        client.connect().await.unwrap();
        let (listener, mut rx) = ChannelListener::new();
        client.events().add("test", Arc::new(listener));

        let invoice = client.create_lightning_invoice(250, "dinner").await.unwrap();
        assert_eq!(invoice.amount_sats, 250);
        assert!(matches!(
            rx.recv().await.unwrap(),
            Event::InvoiceCreated { amount_sats: 250, .. }
        ));
    }

    #[tokio::test]
    async fn disconnect_clears_connection() {
        let (client, _, _) = build(1, 1, 1, 0);
        client.connect().await.unwrap();
        client.disconnect();
        assert!(!client.is_connected());
        assert_eq!(
            client.create_lightning_invoice(1, "").await.unwrap_err(),
            SdkError::NotConnected
        );
    }
}
