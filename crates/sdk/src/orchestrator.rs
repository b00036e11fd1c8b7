//! Federation orchestrator: lifecycle of federations and their clients.
//!
//! The orchestrator owns the [`FederationRegistry`] and one
//! [`QuorumClient`] per registered federation. It is `Clone` (wraps an
//! `Arc`) and every clone shares the same state, event registry and
//! cancellation token.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hearth_config::FederationConfig;
//! use hearth_sdk::federation::NoGateway;
//! use hearth_sdk::orchestrator::FederationOrchestrator;
//! use hearth_transport::ScriptedTransport;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), hearth_sdk::SdkError> {
//! let orchestrator = FederationOrchestrator::new(
//!     FederationConfig::DEFAULT,
//!     ScriptedTransport::new(),
//!     NoGateway,
//!     CancellationToken::new(),
//! );
//! let info = orchestrator.create_federation(
//!     "Nakamoto family",
//!     "household savings",
//!     &["https://g0.example".into(), "https://g1.example".into()],
//!     2,
//! )?;
//! let _ = orchestrator.connect(&info.id).await;
//! orchestrator.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use hearth_config::FederationConfig;
use hearth_core::{FederationId, InviteCode};
use hearth_transport::GuardianTransport;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::SdkError;
use crate::events::Events;
use crate::federation::{
    AggregateHealth, ConnectReport, FederationHealth, FederationMembershipConfig, Guardian,
    LightningGateway, QuorumClient,
};
use crate::notes::InMemoryNoteStore;
use crate::registry::{FEDERATION_CURRENCY, FederationInfo, FederationInvite, FederationRegistry};
use crate::tracking::{NoopOperationStore, OperationStore};
use crate::utils::now_millis;

/// Client type held by the orchestrator.
pub type OrchestratedClient<P, G> = QuorumClient<Arc<P>, Arc<G>, InMemoryNoteStore>;

struct OrchestratorInner<P, G> {
    config: FederationConfig,
    transport: Arc<P>,
    gateway: Arc<G>,
    registry: FederationRegistry,
    clients: RwLock<HashMap<FederationId, Arc<OrchestratedClient<P, G>>>>,
    events: Arc<Events>,
    operation_store: RwLock<Arc<dyn OperationStore>>,
    cancel: CancellationToken,
}

/// Entry point for federation management.
///
/// # Type Parameters
///
/// - `P`: guardian liveness transport shared by every client
/// - `G`: Lightning gateway shared by every client
pub struct FederationOrchestrator<P, G> {
    inner: Arc<OrchestratorInner<P, G>>,
}

impl<P, G> Clone for FederationOrchestrator<P, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, G> std::fmt::Debug for FederationOrchestrator<P, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationOrchestrator")
            .field("registry", &self.inner.registry)
            .field("cancelled", &self.inner.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<P, G> FederationOrchestrator<P, G>
where
    P: GuardianTransport,
    G: LightningGateway,
{
    /// No network I/O happens during construction.
    pub fn new(
        config: FederationConfig,
        transport: P,
        gateway: G,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                config,
                transport: Arc::new(transport),
                gateway: Arc::new(gateway),
                registry: FederationRegistry::new(),
                clients: RwLock::new(HashMap::new()),
                events: Arc::new(Events::new()),
                operation_store: RwLock::new(Arc::new(NoopOperationStore)),
                cancel,
            }),
        }
    }

    pub fn registry(&self) -> &FederationRegistry {
        &self.inner.registry
    }

    /// Event registry shared by every client.
    pub fn events(&self) -> &Arc<Events> {
        &self.inner.events
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    fn check_cancelled(&self) -> Result<(), SdkError> {
        if self.inner.cancel.is_cancelled() {
            Err(SdkError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Replaces the operation store handed to clients created from now on.
    pub fn set_operation_store(&self, store: Arc<dyn OperationStore>) {
        if let Ok(mut current) = self.inner.operation_store.write() {
            *current = store;
        }
    }

    pub fn operation_store(&self) -> Arc<dyn OperationStore> {
        match self.inner.operation_store.read() {
            Ok(store) => store.clone(),
            Err(_) => Arc::new(NoopOperationStore),
        }
    }

    /// Signals cancellation and disconnects every client.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        for client in self.clients() {
            client.disconnect();
        }
        tokio::task::yield_now().await;
        info!("federation orchestrator shut down");
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Registers a new federation and builds its (disconnected) client.
    ///
    /// # Errors
    ///
    /// [`SdkError::NoGuardians`] for an empty endpoint list,
    /// [`SdkError::InvalidThreshold`] for `threshold == 0` or
    /// `threshold > endpoints.len()`.
    pub fn create_federation(
        &self,
        name: &str,
        description: &str,
        guardian_endpoints: &[String],
        threshold: usize,
    ) -> Result<FederationInfo, SdkError> {
        self.check_cancelled()?;
        if guardian_endpoints.is_empty() {
            return Err(SdkError::NoGuardians);
        }

        let registry = &self.inner.registry;
        let id = registry.allocate_id()?;
        let info = FederationInfo {
            id: id.clone(),
            name: name.to_owned(),
            description: description.to_owned(),
            guardians: Guardian::from_endpoints(guardian_endpoints),
            threshold,
            currency: FEDERATION_CURRENCY.to_owned(),
            epoch_height: 0,
            created_at: now_millis(),
        };
        let client = self.build_client(&info, None)?;
        registry.register(info.clone())?;
        self.insert_client(id, client)?;

        info!(
            federation_id = %info.id,
            name,
            guardians = info.guardians.len(),
            threshold,
            "federation created"
        );
        Ok(info)
    }

    /// Joins through an invite. Unknown federations are reconstructed from
    /// the invite's metadata; their guardians have empty endpoints until
    /// [`update_guardian_endpoints`](Self::update_guardian_endpoints) is
    /// called.
    ///
    /// Joining a federation that already has a client returns its record.
    pub fn join_federation(&self, invite_code: &str) -> Result<FederationInfo, SdkError> {
        self.check_cancelled()?;
        let invite = self
            .validate_invite(invite_code)?
            .ok_or(SdkError::InvalidInvite)?;

        let registry = &self.inner.registry;
        if let Some(existing) = registry.get(&invite.federation_id)? {
            if self.client(&invite.federation_id).is_some() {
                return Ok(existing);
            }
            let client = self.build_client(&existing, Some(invite.invite_code.clone()))?;
            self.insert_client(existing.id.clone(), client)?;
            return Ok(existing);
        }

        let blank: Vec<String> = vec![String::new(); invite.guardian_count];
        let info = FederationInfo {
            id: invite.federation_id.clone(),
            name: invite.name.clone(),
            description: invite.description.clone(),
            guardians: Guardian::from_endpoints(&blank),
            threshold: invite.threshold,
            currency: FEDERATION_CURRENCY.to_owned(),
            epoch_height: 0,
            created_at: now_millis(),
        };
        let client = self.build_client(&info, Some(invite.invite_code.clone()))?;
        registry.register(info.clone())?;
        self.insert_client(info.id.clone(), client)?;

        info!(
            federation_id = %info.id,
            invite_code = %invite.invite_code,
            guardians = invite.guardian_count,
            threshold = invite.threshold,
            "federation joined from invite"
        );
        Ok(info)
    }

    /// Disconnects and discards the client, removes the federation and every
    /// invite that references it.
    pub fn delete_federation(&self, federation_id: &FederationId) -> Result<(), SdkError> {
        self.check_cancelled()?;
        let client = {
            let mut clients = self.inner.clients.write().map_err(|_| SdkError::StoreFailed)?;
            clients.remove(federation_id)
        };
        if let Some(client) = &client {
            client.disconnect();
        }
        let removed = self.inner.registry.remove(federation_id)?;
        if removed.is_none() && client.is_none() {
            return Err(SdkError::UnknownFederation);
        }
        info!(federation_id = %federation_id, "federation deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Invites
    // -----------------------------------------------------------------------

    pub fn create_invite(
        &self,
        federation_id: &FederationId,
        created_by: &str,
        ttl: Option<Duration>,
    ) -> Result<FederationInvite, SdkError> {
        self.check_cancelled()?;
        self.inner.registry.create_invite(federation_id, created_by, ttl)
    }

    /// The live invite behind `code`, or `None` when the code is malformed,
    /// unknown or expired.
    pub fn validate_invite(&self, code: &str) -> Result<Option<FederationInvite>, SdkError> {
        self.check_cancelled()?;
        let Ok(code) = InviteCode::parse(code) else {
            return Ok(None);
        };
        self.inner.registry.validate_invite(&code)
    }

    /// Stores an invite received out of band so it can be joined.
    pub fn import_invite(&self, invite: FederationInvite) -> Result<(), SdkError> {
        self.check_cancelled()?;
        self.inner.registry.import_invite(invite)
    }

    // -----------------------------------------------------------------------
    // Connectivity
    // -----------------------------------------------------------------------

    /// Connects one federation's client and records the outcome in the
    /// registry.
    pub async fn connect(&self, federation_id: &FederationId) -> Result<ConnectReport, SdkError> {
        self.check_cancelled()?;
        let client = self.client(federation_id).ok_or(SdkError::UnknownFederation)?;

        let result = tokio::select! {
            result = client.connect() => result,
            _ = self.inner.cancel.cancelled() => return Err(SdkError::Cancelled),
        };

        let guardians = client.guardians();
        let epoch_height = client.epoch_height();
        let updated = self.inner.registry.update(federation_id, |info| {
            info.guardians = guardians;
            if result.is_ok() {
                info.epoch_height = epoch_height;
            }
        });
        if let Err(e) = updated {
            warn!(
                federation_id = %federation_id,
                error = %e,
                "registry update after connect failed"
            );
        }

        Ok(result?)
    }

    pub fn disconnect(&self, federation_id: &FederationId) -> Result<(), SdkError> {
        let client = self.client(federation_id).ok_or(SdkError::UnknownFederation)?;
        client.disconnect();
        Ok(())
    }

    /// Replaces a federation's guardian endpoints. The guardian count must
    /// stay the same.
    pub fn update_guardian_endpoints(
        &self,
        federation_id: &FederationId,
        endpoints: &[String],
    ) -> Result<(), SdkError> {
        self.check_cancelled()?;
        let client = self.client(federation_id).ok_or(SdkError::UnknownFederation)?;
        client.replace_endpoints(endpoints)?;
        let guardians = client.guardians();
        self.inner
            .registry
            .update(federation_id, |info| info.guardians = guardians)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn client(&self, federation_id: &FederationId) -> Option<Arc<OrchestratedClient<P, G>>> {
        self.inner
            .clients
            .read()
            .ok()
            .and_then(|clients| clients.get(federation_id).cloned())
    }

    pub fn get_federation(
        &self,
        federation_id: &FederationId,
    ) -> Result<Option<FederationInfo>, SdkError> {
        self.inner.registry.get(federation_id)
    }

    pub fn discover_federations(&self, term: &str) -> Result<Vec<FederationInfo>, SdkError> {
        self.check_cancelled()?;
        self.inner.registry.discover(term)
    }

    pub fn guardian_health(
        &self,
        federation_id: &FederationId,
    ) -> Result<FederationHealth, SdkError> {
        let client = self.client(federation_id).ok_or(SdkError::UnknownFederation)?;
        Ok(client.health())
    }

    /// Health of every registered federation, in discovery order.
    pub fn aggregate_health(&self) -> Result<AggregateHealth, SdkError> {
        let federations = self
            .inner
            .registry
            .list()?
            .iter()
            .filter_map(|info| self.client(&info.id))
            .map(|client| client.health())
            .collect();
        Ok(AggregateHealth::from_federations(federations))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn clients(&self) -> Vec<Arc<OrchestratedClient<P, G>>> {
        self.inner
            .clients
            .read()
            .map(|clients| clients.values().cloned().collect())
            .unwrap_or_default()
    }

    fn build_client(
        &self,
        info: &FederationInfo,
        invite_code: Option<InviteCode>,
    ) -> Result<OrchestratedClient<P, G>, SdkError> {
        let membership = FederationMembershipConfig {
            federation_id: info.id.clone(),
            guardian_endpoints: info.endpoints(),
            threshold: info.threshold,
            total_guardians: info.guardians.len(),
            invite_code,
        };
        let client = QuorumClient::new(
            &membership,
            self.inner.config,
            Arc::clone(&self.inner.transport),
            Arc::clone(&self.inner.gateway),
            InMemoryNoteStore::new(),
        )?;
        Ok(client
            .with_events(Arc::clone(&self.inner.events))
            .with_operation_store(self.operation_store()))
    }

    fn insert_client(
        &self,
        federation_id: FederationId,
        client: OrchestratedClient<P, G>,
    ) -> Result<(), SdkError> {
        let mut clients = self.inner.clients.write().map_err(|_| SdkError::StoreFailed)?;
        clients.insert(federation_id, Arc::new(client));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
