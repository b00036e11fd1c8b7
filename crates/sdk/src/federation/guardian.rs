//! Guardian liveness records.

use serde::{Deserialize, Serialize};

/// Liveness of one guardian as of its last probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardianStatus {
    Online,
    Offline,
    Syncing,
}

/// One guardian of a federation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guardian {
    /// `guardian_<index>`.
    pub id: String,

    /// Base URL of the guardian's API. Empty for guardians reconstructed
    /// from an invite.
    pub endpoint: String,

    /// Learned from the first successful probe.
    pub public_key: Option<String>,

    pub status: GuardianStatus,

    /// Unix-ms time of the last probe that got an accepted response.
    pub last_seen: Option<u64>,
}

/// Canonical id of the guardian at `index`.
pub fn guardian_id(index: usize) -> String {
    format!("guardian_{index}")
}

impl Guardian {
    /// An offline, never-seen guardian.
    pub fn new(index: usize, endpoint: impl Into<String>) -> Self {
        Self {
            id: guardian_id(index),
            endpoint: endpoint.into(),
            public_key: None,
            status: GuardianStatus::Offline,
            last_seen: None,
        }
    }

    /// Builds the initial guardian list for a set of endpoints.
    pub fn from_endpoints<S: AsRef<str>>(endpoints: &[S]) -> Vec<Self> {
        endpoints
            .iter()
            .enumerate()
            .map(|(i, ep)| Self::new(i, ep.as_ref()))
            .collect()
    }

    pub fn is_online(&self) -> bool {
        self.status == GuardianStatus::Online
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_index() {
        let guardians = Guardian::from_endpoints(&["http://a", "http://b"]);
        assert_eq!(guardians[0].id, "guardian_0");
        assert_eq!(guardians[1].id, "guardian_1");
        assert!(guardians.iter().all(|g| g.status == GuardianStatus::Offline));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&GuardianStatus::Syncing).unwrap(),
            "\"syncing\""
        );
    }
}
