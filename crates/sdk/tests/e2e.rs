//! End-to-end tests for the Hearth payment core.
//!
//! Every external system is replaced by the in-process fakes from
//! `hearth_sdk::fake` and `hearth_transport::ScriptedTransport`, so the
//! suite runs offline:
//!
//! ```bash
//! cargo test -p hearth-sdk --test e2e -- --nocapture
//! ```

use std::sync::Arc;
use std::time::Duration;

use hearth_config::{BridgeConfig, FederationConfig, RouterConfig};
use hearth_core::{BackendKind, EcashProtocol, UserRole};
use hearth_sdk::events::{ChannelListener, Event};
use hearth_sdk::fake::{FakeGateway, PrivacyMode, ScriptedBackend, ScriptedPrivacy};
use hearth_sdk::router::{LightningBackend, PolicyNodeManager};
use hearth_sdk::tracking::OperationStep;
use hearth_sdk::{
    ConversionKind, EcashBridge, ErrorKind, FederationOrchestrator, MemberContext, PaymentRouter,
    RejectReason, SdkError,
};
use hearth_transport::{ProbeScript, ScriptedTransport};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ONLINE: ProbeScript = ProbeScript::Online { epoch_height: 42 };

const FEDERATION: FederationConfig = FederationConfig {
    probe_timeout_ms: 50,
    ..FederationConfig::DEFAULT
};

type Orchestrator = FederationOrchestrator<Arc<ScriptedTransport>, Arc<FakeGateway>>;

struct Household {
    orchestrator: Orchestrator,
    transport: Arc<ScriptedTransport>,
    gateway: Arc<FakeGateway>,
}

fn endpoints(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("https://guardian{i}.hearth.test")).collect()
}

fn household(balance_sats: u64) -> Household {
    let transport = Arc::new(ScriptedTransport::new());
    let gateway = Arc::new(FakeGateway::with_balance(balance_sats));
    let orchestrator = FederationOrchestrator::new(
        FEDERATION,
        transport.clone(),
        gateway.clone(),
        CancellationToken::new(),
    );
    Household {
        orchestrator,
        transport,
        gateway,
    }
}

type Router = PaymentRouter<PolicyNodeManager, Arc<ScriptedPrivacy>>;

struct Lightning {
    router: Arc<Router>,
    privacy: Arc<ScriptedPrivacy>,
    backends: Vec<Arc<ScriptedBackend>>,
}

impl Lightning {
    fn backend(&self, kind: BackendKind) -> &ScriptedBackend {
        self.backends
            .iter()
            .find(|b| b.kind() == kind)
            .unwrap()
    }
}

fn lightning(config: RouterConfig) -> Lightning {
    let privacy = Arc::new(ScriptedPrivacy::new());
    let router = PaymentRouter::new(config, PolicyNodeManager::new(&config), privacy.clone());
    let mut backends = Vec::new();
    for kind in BackendKind::ALL {
        router.manager().register(kind, true);
        let backend = Arc::new(ScriptedBackend::new(kind));
        router.register_backend(backend.clone());
        backends.push(backend);
    }
    Lightning {
        router: Arc::new(router),
        privacy,
        backends,
    }
}

// ---------------------------------------------------------------------------
// Quorum and e-cash
// ---------------------------------------------------------------------------

#[tokio::test]
async fn quorum_needs_threshold_online_guardians() {
    let h = household(5_000);
    let eps = endpoints(5);
    let info = h
        .orchestrator
        .create_federation("Okafor family", "", &eps, 3)
        .unwrap();
    let (listener, mut rx) = ChannelListener::new();
    h.orchestrator.events().add("test", Arc::new(listener));

    h.transport.set(&eps[0], ONLINE);
    h.transport.set(&eps[1], ONLINE);
    h.transport.set(&eps[2], ProbeScript::Hang);
    let err = h.orchestrator.connect(&info.id).await.unwrap_err();
    assert_eq!(
        err,
        SdkError::QuorumUnavailable {
            online: 2,
            threshold: 3
        }
    );
    assert!(matches!(rx.try_recv(), Ok(Event::ConnectionFailed { .. })));

    h.transport.set(&eps[2], ONLINE);
    let report = h.orchestrator.connect(&info.id).await.unwrap();
    assert_eq!(report.online, 3);
    assert_eq!(report.total, 5);
    assert_eq!(report.balance_sats, 5_000);

    let health = h.orchestrator.guardian_health(&info.id).unwrap();
    assert!(health.quorum_met);
    assert!((health.online_percentage - 60.0).abs() < 1e-9);
    let stored = h.orchestrator.get_federation(&info.id).unwrap().unwrap();
    assert_eq!(stored.epoch_height, 42);
}

#[tokio::test]
async fn issued_notes_redeem_exactly_once() {
    let h = household(10_000);
    let eps = endpoints(3);
    for ep in &eps {
        h.transport.set(ep, ONLINE);
    }
    let info = h.orchestrator.create_federation("Lee", "", &eps, 2).unwrap();
    h.orchestrator.connect(&info.id).await.unwrap();
    let client = h.orchestrator.client(&info.id).unwrap();

    let notes = client.issue_ecash(1_650).unwrap();
    let denominations: Vec<u64> = notes.iter().map(|n| n.denomination).collect();
    assert_eq!(denominations, vec![1_000, 500, 100, 50]);
    assert_eq!(client.balance_sats(), 8_350);

    assert_eq!(client.redeem_ecash(&notes).unwrap(), 1_650);
    assert_eq!(client.balance_sats(), 10_000);

    let err = client.redeem_ecash(&notes[..1]).unwrap_err();
    let SdkError::InvalidNotes(rejection) = err else {
        panic!("expected InvalidNotes, got {err:?}");
    };
    assert_eq!(rejection.reason, RejectReason::AlreadyRedeemed);
    assert_eq!(client.balance_sats(), 10_000);

    let err = client.issue_ecash(20_000).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Balance);
}

#[tokio::test]
async fn one_expired_note_rejects_the_whole_batch() {
    let h = household(10_000);
    let eps = endpoints(2);
    for ep in &eps {
        h.transport.set(ep, ONLINE);
    }
    let info = h.orchestrator.create_federation("Silva", "", &eps, 2).unwrap();
    h.orchestrator.connect(&info.id).await.unwrap();
    let client = h.orchestrator.client(&info.id).unwrap();

    let mut notes = client.issue_ecash(1_100).unwrap();
    notes[1].expires_at = 1;
    let before = client.balance_sats();

    let err = client.redeem_ecash(&notes).unwrap_err();
    assert!(matches!(
        err,
        SdkError::InvalidNotes(ref r)
            if r.reason == RejectReason::Expired && r.note_id == notes[1].note_id
    ));
    assert_eq!(client.balance_sats(), before);

    // The valid note was not consumed by the failed batch.
    assert_eq!(client.redeem_ecash(&notes[..1]).unwrap(), 1_000);
}

#[tokio::test]
async fn disconnected_client_cannot_move_money() {
    let h = household(1_000);
    let eps = endpoints(1);
    h.transport.set(&eps[0], ONLINE);
    let info = h.orchestrator.create_federation("Solo", "", &eps, 1).unwrap();
    let client = h.orchestrator.client(&info.id).unwrap();

    assert_eq!(client.issue_ecash(10).unwrap_err(), SdkError::NotConnected);
    assert_eq!(
        client.create_lightning_invoice(10, "").await.unwrap_err(),
        SdkError::NotConnected
    );

    h.orchestrator.connect(&info.id).await.unwrap();
    let invoice = client.create_lightning_invoice(10, "coffee").await.unwrap();
    assert_eq!(invoice.amount_sats, 10);
    assert_eq!(h.gateway.invoice_count(), 1);
    h.orchestrator.disconnect(&info.id).unwrap();
    assert!(!client.is_connected());
}

// ---------------------------------------------------------------------------
// Registry and invites
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invites_expire_and_stay_expired() {
    let h = household(0);
    let info = h
        .orchestrator
        .create_federation("Haddad", "", &endpoints(3), 2)
        .unwrap();
    let invite = h
        .orchestrator
        .create_invite(&info.id, "mom", Some(Duration::from_millis(1)))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let code = invite.invite_code.to_string();
    assert_eq!(h.orchestrator.validate_invite(&code).unwrap(), None);
    assert_eq!(h.orchestrator.validate_invite(&code).unwrap(), None);
    assert_eq!(
        h.orchestrator.join_federation(&code).unwrap_err(),
        SdkError::InvalidInvite
    );
}

#[tokio::test]
async fn invite_joins_a_second_household() {
    let first = household(0);
    let second = household(0);
    let info = first
        .orchestrator
        .create_federation("Novak", "grandparents", &endpoints(4), 3)
        .unwrap();
    let invite = first.orchestrator.create_invite(&info.id, "grandma", None).unwrap();

    second.orchestrator.import_invite(invite.clone()).unwrap();
    let code = invite.invite_code.to_string();
    let joined = second.orchestrator.join_federation(&code).unwrap();
    assert_eq!(joined.id, info.id);
    assert_eq!(joined.threshold, 3);
    assert_eq!(joined.guardians.len(), 4);

    // Joining twice is a no-op.
    assert_eq!(second.orchestrator.join_federation(&code).unwrap().id, info.id);
    assert_eq!(second.orchestrator.discover_federations("novak").unwrap().len(), 1);

    let eps = endpoints(4);
    for ep in &eps[..3] {
        second.transport.set(ep, ONLINE);
    }
    second
        .orchestrator
        .update_guardian_endpoints(&info.id, &eps)
        .unwrap();
    let report = second.orchestrator.connect(&info.id).await.unwrap();
    assert_eq!(report.online, 3);
}

#[tokio::test]
async fn deleting_a_federation_cascades() {
    let h = household(0);
    let info = h
        .orchestrator
        .create_federation("Ito", "", &endpoints(3), 2)
        .unwrap();
    let invite = h.orchestrator.create_invite(&info.id, "dad", None).unwrap();
    let code = invite.invite_code.to_string();
    assert!(h.orchestrator.validate_invite(&code).unwrap().is_some());

    h.orchestrator.delete_federation(&info.id).unwrap();
    assert_eq!(h.orchestrator.get_federation(&info.id).unwrap(), None);
    assert!(h.orchestrator.client(&info.id).is_none());
    assert_eq!(h.orchestrator.validate_invite(&code).unwrap(), None);
    assert_eq!(
        h.orchestrator.delete_federation(&info.id).unwrap_err(),
        SdkError::UnknownFederation
    );
    assert_eq!(h.orchestrator.aggregate_health().unwrap().total_guardians, 0);
}

#[tokio::test]
async fn shutdown_rejects_further_work() {
    let h = household(0);
    h.orchestrator.cancel().cancel();
    h.orchestrator.shutdown().await;
    assert_eq!(
        h.orchestrator
            .create_federation("late", "", &endpoints(1), 1)
            .unwrap_err(),
        SdkError::Cancelled
    );
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[tokio::test]
async fn family_invoice_carries_privacy_wrap() {
    let l = lightning(RouterConfig::DEFAULT);
    let result = l.router.create_family_invoice(2_100, "chores").await.unwrap();
    let privacy = result.privacy.unwrap();
    assert!(privacy.is_privacy_enabled);
    assert_eq!(privacy.wrapped_invoice, format!("wrapped:{}", result.invoice.bolt11));

    l.privacy.set_mode(PrivacyMode::Disabled);
    let err = l.router.create_family_invoice(2_100, "chores").await.unwrap_err();
    assert_eq!(err.error, SdkError::PrivacyDisabled);
}

#[tokio::test]
async fn offspring_daily_cap() {
    let l = lightning(RouterConfig::DEFAULT);
    let kid = MemberContext::new("kid", UserRole::Offspring);
    let parent = MemberContext::new("parent", UserRole::Adult);

    l.router.pay_external_invoice(&kid, "lnbc-a", 30_000).await.unwrap();
    l.router.pay_external_invoice(&kid, "lnbc-b", 20_000).await.unwrap();
    let err = l.router.pay_external_invoice(&kid, "lnbc-c", 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SpendingLimit);
    assert_eq!(err.failed_step, OperationStep::SpendingLimit);

    l.router
        .pay_external_invoice(&parent, "lnbc-d", 5_000_000)
        .await
        .unwrap();
    assert!(l.router.validate_spending(&parent, u64::MAX).allowed);
}

#[tokio::test]
async fn fallback_walks_the_external_list() {
    let l = lightning(RouterConfig::DEFAULT);
    // external: voltage, breez, phoenixd, nwc
    l.backend(BackendKind::Voltage).set_fail_pay(true);
    l.backend(BackendKind::Breez).set_fail_pay(true);

    let adult = MemberContext::new("a", UserRole::Adult);
    let result = l.router.pay_external_invoice(&adult, "lnbc1", 500).await.unwrap();
    assert_eq!(result.routing.preferred_backend, BackendKind::Phoenixd);
    assert_eq!(result.routing.fallback_backends, vec![BackendKind::Nwc]);
    assert_eq!(l.router.active_backend(), Some(BackendKind::Phoenixd));
    assert_eq!(l.backend(BackendKind::Nwc).calls(), 0);
}

#[tokio::test]
async fn total_failure_restores_the_previous_backend() {
    let l = lightning(RouterConfig::DEFAULT);
    l.router.activate_backend(BackendKind::Lnbits).unwrap();
    for backend in &l.backends {
        backend.set_fail_create(true);
    }
    let err = l.router.create_external_invoice(100, "", false).await.unwrap_err();
    assert_eq!(err.error, SdkError::BackendFailed);
    assert_eq!(err.failed_step, OperationStep::Execute(BackendKind::Voltage));
    assert_eq!(l.router.active_backend(), Some(BackendKind::Lnbits));
}

#[tokio::test]
async fn concurrent_operations_are_rejected_busy() {
    let l = lightning(RouterConfig::DEFAULT);
    l.backend(BackendKind::Phoenixd).set_hang(true);
    let router = l.router.clone();
    let pending = tokio::spawn(async move { router.create_family_invoice(10, "").await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let adult = MemberContext::new("a", UserRole::Adult);
    let err = l
        .router
        .pay_external_invoice(&adult, "lnbc1", 10)
        .await
        .unwrap_err();
    assert_eq!(err.error, SdkError::Busy);
    pending.abort();
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn conversion_settles_and_mints() {
    let l = lightning(RouterConfig::DEFAULT);
    let bridge = EcashBridge::new(l.router.clone(), BridgeConfig::DEFAULT);
    let adult = MemberContext::new("a", UserRole::Adult);

    let result = bridge
        .convert(&adult, ConversionKind::CashuToFedimint, "cashu:2000:proofs")
        .await
        .unwrap();
    assert_eq!(result.fee_sats, 30);
    assert_eq!(result.destination_amount, 1_970);
    assert!(result.destination_token.starts_with("fedimint:1970:"));
    assert_eq!(result.settlement_invoice.amount_sats, 2_000);
    assert_eq!(result.kind.destination(), EcashProtocol::Fedimint);
}

#[tokio::test]
async fn bad_token_never_reaches_a_backend() {
    let l = lightning(RouterConfig::DEFAULT);
    let bridge = EcashBridge::new(l.router.clone(), BridgeConfig::DEFAULT);
    let adult = MemberContext::new("a", UserRole::Adult);

    for token in ["", "cashuA%%%", "fedimint:0:x", r#"{"memo":"none"}"#] {
        let err = bridge
            .convert(&adult, ConversionKind::FedimintToCashu, token)
            .await
            .unwrap_err();
        assert_eq!(err.error, SdkError::InvalidToken, "{token:?}");
    }
    assert!(l.backends.iter().all(|b| b.calls() == 0));
    assert_eq!(l.router.active_backend(), None);
}
