//! Registry records.

use hearth_core::{FederationId, InviteCode};
use serde::{Deserialize, Serialize};

use crate::federation::Guardian;

/// Unit every federation balance is denominated in.
pub const FEDERATION_CURRENCY: &str = "sat";

/// A federation known to this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationInfo {
    pub id: FederationId,
    pub name: String,
    pub description: String,
    pub guardians: Vec<Guardian>,
    /// `1 <= threshold <= guardians.len()`.
    pub threshold: usize,
    pub currency: String,
    /// Highest epoch reported by an online guardian on the last connect.
    pub epoch_height: u64,
    /// Unix ms.
    pub created_at: u64,
}

impl FederationInfo {
    /// Guardian endpoints in index order.
    pub fn endpoints(&self) -> Vec<String> {
        self.guardians.iter().map(|g| g.endpoint.clone()).collect()
    }

    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }

    pub(crate) fn matches_term(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        needle.is_empty() || self.matches(&needle)
    }
}

/// An invitation to join a federation.
///
/// Carries enough metadata to reconstruct the federation on a node that has
/// never seen it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationInvite {
    pub federation_id: FederationId,
    pub name: String,
    pub description: String,
    pub invite_code: InviteCode,
    pub guardian_count: usize,
    pub threshold: usize,
    /// Unix ms. `None` never expires.
    pub expires_at: Option<u64>,
    pub created_by: String,
}

impl FederationInvite {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_ms)
    }
}
