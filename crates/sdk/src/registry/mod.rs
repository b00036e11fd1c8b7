//! Federation registry: known federations and their invites.
//!
//! The registry is a pair of keyed maps behind std `RwLock`s. It owns the
//! lifetime of every [`FederationInfo`] and [`FederationInvite`]; removing a
//! federation removes every invite that references it, so no invite can
//! outlive its federation.
//!
//! Invites expire lazily: the call that observes an expired invite deletes it.

mod types;

pub use types::{FEDERATION_CURRENCY, FederationInfo, FederationInvite};

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use hearth_core::{FederationId, InviteCode};
use tracing::debug;

use crate::utils::now_millis;
use crate::SdkError;

/// In-memory federation and invite registry.
#[derive(Debug, Default)]
pub struct FederationRegistry {
    federations: RwLock<HashMap<FederationId, FederationInfo>>,
    invites: RwLock<HashMap<InviteCode, FederationInvite>>,
}

impl FederationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Federations
    // -----------------------------------------------------------------------

    /// Allocates an id that is not registered yet.
    pub fn allocate_id(&self) -> Result<FederationId, SdkError> {
        let federations = self.federations.read().map_err(|_| SdkError::StoreFailed)?;
        let mut rng = rand::thread_rng();
        loop {
            let id = FederationId::generate(now_millis(), &mut rng);
            if !federations.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    /// Inserts or replaces a federation record.
    pub fn register(&self, info: FederationInfo) -> Result<(), SdkError> {
        let mut federations = self.federations.write().map_err(|_| SdkError::StoreFailed)?;
        debug!(federation_id = %info.id, name = %info.name, "federation registered");
        federations.insert(info.id.clone(), info);
        Ok(())
    }

    pub fn get(&self, id: &FederationId) -> Result<Option<FederationInfo>, SdkError> {
        let federations = self.federations.read().map_err(|_| SdkError::StoreFailed)?;
        Ok(federations.get(id).cloned())
    }

    pub fn contains(&self, id: &FederationId) -> bool {
        self.federations
            .read()
            .map(|f| f.contains_key(id))
            .unwrap_or(false)
    }

    /// Applies `f` to a registered federation.
    pub fn update<F>(&self, id: &FederationId, f: F) -> Result<(), SdkError>
    where
        F: FnOnce(&mut FederationInfo),
    {
        let mut federations = self.federations.write().map_err(|_| SdkError::StoreFailed)?;
        let info = federations.get_mut(id).ok_or(SdkError::UnknownFederation)?;
        f(info);
        Ok(())
    }

    /// Removes a federation and every invite referencing it.
    ///
    /// Returns the removed record, or `None` if it was not registered.
    pub fn remove(&self, id: &FederationId) -> Result<Option<FederationInfo>, SdkError> {
        let mut federations = self.federations.write().map_err(|_| SdkError::StoreFailed)?;
        let mut invites = self.invites.write().map_err(|_| SdkError::StoreFailed)?;
        let removed = federations.remove(id);
        let before = invites.len();
        invites.retain(|_, invite| &invite.federation_id != id);
        debug!(
            federation_id = %id,
            invites_removed = before - invites.len(),
            "federation removed"
        );
        Ok(removed)
    }

    /// Federations whose name or description contains `term`, ignoring
    /// case. An empty term matches everything.
    ///
    /// Sorted by `created_at`, then id.
    pub fn discover(&self, term: &str) -> Result<Vec<FederationInfo>, SdkError> {
        let federations = self.federations.read().map_err(|_| SdkError::StoreFailed)?;
        let mut found: Vec<FederationInfo> = federations
            .values()
            .filter(|info| info.matches_term(term))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    pub fn list(&self) -> Result<Vec<FederationInfo>, SdkError> {
        self.discover("")
    }

    // -----------------------------------------------------------------------
    // Invites
    // -----------------------------------------------------------------------

    /// Issues an invite for a registered federation.
    ///
    /// `ttl = None` produces an invite that never expires.
    pub fn create_invite(
        &self,
        federation_id: &FederationId,
        created_by: &str,
        ttl: Option<Duration>,
    ) -> Result<FederationInvite, SdkError> {
        // Same lock order as `remove`, held until the invite is in.
        let federations = self.federations.read().map_err(|_| SdkError::StoreFailed)?;
        let info = federations
            .get(federation_id)
            .ok_or(SdkError::UnknownFederation)?;
        let mut invites = self.invites.write().map_err(|_| SdkError::StoreFailed)?;

        let now = now_millis();
        let mut rng = rand::thread_rng();
        let invite_code = loop {
            let code = InviteCode::generate(now, &mut rng);
            if !invites.contains_key(&code) {
                break code;
            }
        };
        let invite = FederationInvite {
            federation_id: info.id.clone(),
            name: info.name.clone(),
            description: info.description.clone(),
            invite_code: invite_code.clone(),
            guardian_count: info.guardians.len(),
            threshold: info.threshold,
            expires_at: ttl.map(|ttl| now.saturating_add(ttl.as_millis() as u64)),
            created_by: created_by.to_owned(),
        };
        invites.insert(invite_code, invite.clone());
        Ok(invite)
    }

    /// Stores an invite received out of band. An existing invite with the
    /// same code is replaced.
    pub fn import_invite(&self, invite: FederationInvite) -> Result<(), SdkError> {
        let mut invites = self.invites.write().map_err(|_| SdkError::StoreFailed)?;
        invites.insert(invite.invite_code.clone(), invite);
        Ok(())
    }

    /// Looks up a live invite. An expired invite is deleted and reported as
    /// absent.
    pub fn validate_invite(
        &self,
        code: &InviteCode,
    ) -> Result<Option<FederationInvite>, SdkError> {
        let mut invites = self.invites.write().map_err(|_| SdkError::StoreFailed)?;
        let now = now_millis();
        let Some(invite) = invites.get(code).cloned() else {
            return Ok(None);
        };
        if invite.is_expired(now) {
            debug!(invite_code = %code, "invite expired");
            invites.remove(code);
            return Ok(None);
        }
        Ok(Some(invite))
    }

    /// Invites referencing `federation_id`, expired ones included.
    pub fn invites_for(
        &self,
        federation_id: &FederationId,
    ) -> Result<Vec<FederationInvite>, SdkError> {
        let invites = self.invites.read().map_err(|_| SdkError::StoreFailed)?;
        Ok(invites
            .values()
            .filter(|invite| &invite.federation_id == federation_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::Guardian;

    fn register(
        registry: &FederationRegistry,
        name: &str,
        description: &str,
        created_at: u64,
    ) -> FederationId {
        let id = registry.allocate_id().unwrap();
        registry
            .register(FederationInfo {
                id: id.clone(),
                name: name.into(),
                description: description.into(),
                guardians: Guardian::from_endpoints(&["http://a", "http://b", "http://c"]),
                threshold: 2,
                currency: FEDERATION_CURRENCY.into(),
                epoch_height: 0,
                created_at,
            })
            .unwrap();
        id
    }

    #[test]
    fn invite_carries_federation_metadata() {
        let registry = FederationRegistry::new();
        let id = register(&registry, "Nakamoto", "family savings", 1);
        let invite = registry.create_invite(&id, "alice", None).unwrap();
        assert_eq!(invite.federation_id, id);
        assert_eq!(invite.guardian_count, 3);
        assert_eq!(invite.threshold, 2);
        assert_eq!(invite.expires_at, None);
        assert_eq!(
            registry.validate_invite(&invite.invite_code).unwrap(),
            Some(invite)
        );
    }

    #[test]
    fn invite_for_unknown_federation_fails() {
        let registry = FederationRegistry::new();
        let id = FederationId::parse("fed_1_abcdefghi").unwrap();
        assert_eq!(
            registry.create_invite(&id, "alice", None).unwrap_err(),
            SdkError::UnknownFederation
        );
    }

    #[test]
    fn expired_invite_is_deleted_on_validation() {
        let registry = FederationRegistry::new();
        let id = register(&registry, "Nakamoto", "", 1);
        let invite = registry
            .create_invite(&id, "alice", Some(Duration::from_millis(1)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(registry.validate_invite(&invite.invite_code).unwrap(), None);
        assert_eq!(registry.validate_invite(&invite.invite_code).unwrap(), None);
        assert!(registry.invites_for(&id).unwrap().is_empty());
    }

    #[test]
    fn removal_cascades_to_invites() {
        let registry = FederationRegistry::new();
        let keep = register(&registry, "Keep", "", 1);
        let gone = register(&registry, "Drop", "", 2);
        let kept = registry.create_invite(&keep, "alice", None).unwrap();
        let dropped = registry.create_invite(&gone, "alice", None).unwrap();

        assert!(registry.remove(&gone).unwrap().is_some());
        assert!(registry.get(&gone).unwrap().is_none());
        assert_eq!(registry.validate_invite(&dropped.invite_code).unwrap(), None);
        assert!(registry.validate_invite(&kept.invite_code).unwrap().is_some());
        assert!(registry.remove(&gone).unwrap().is_none());
    }

    #[test]
    fn concurrent_removal_never_leaves_orphan_invites() {
        let registry = FederationRegistry::new();
        for round in 0..200 {
            let id = register(&registry, "Racy", "", round);
            let created = std::thread::scope(|scope| {
                let issuer = scope.spawn(|| registry.create_invite(&id, "alice", None));
                registry.remove(&id).unwrap();
                issuer.join().unwrap()
            });
            match created {
                Ok(_) | Err(SdkError::UnknownFederation) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
            assert!(registry.get(&id).unwrap().is_none());
            assert!(registry.invites_for(&id).unwrap().is_empty(), "round {round}");
        }
    }

    #[test]
    fn discover_filters_and_orders() {
        let registry = FederationRegistry::new();
        let later = register(&registry, "Beta", "Bitcoin circle", 20);
        let earlier = register(&registry, "Alpha bitcoiners", "", 10);
        register(&registry, "Gamma", "gold", 30);

        let found: Vec<FederationId> = registry
            .discover("BITCOIN")
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(found, vec![earlier, later]);
        assert_eq!(registry.list().unwrap().len(), 3);
    }

    #[test]
    fn update_touches_only_known_federations() {
        let registry = FederationRegistry::new();
        let id = register(&registry, "Nakamoto", "", 1);
        registry.update(&id, |info| info.epoch_height = 42).unwrap();
        assert_eq!(registry.get(&id).unwrap().unwrap().epoch_height, 42);

        let unknown = FederationId::parse("fed_1_zzzzzzzzz").unwrap();
        assert_eq!(
            registry.update(&unknown, |_| {}).unwrap_err(),
            SdkError::UnknownFederation
        );
    }
}
