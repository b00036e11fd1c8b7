//! Guardian health snapshots.

use hearth_core::FederationId;
use serde::Serialize;

use super::guardian::{Guardian, GuardianStatus};

/// Health of one federation as of its last connect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationHealth {
    pub federation_id: FederationId,
    pub online: usize,
    pub syncing: usize,
    pub total: usize,
    pub threshold: usize,
    /// `online / total * 100`, or 0.0 without guardians.
    pub online_percentage: f64,
    pub quorum_met: bool,
}

impl FederationHealth {
    pub fn from_guardians(
        federation_id: FederationId,
        guardians: &[Guardian],
        threshold: usize,
    ) -> Self {
        let online = count(guardians, GuardianStatus::Online);
        let syncing = count(guardians, GuardianStatus::Syncing);
        let total = guardians.len();
        Self {
            federation_id,
            online,
            syncing,
            total,
            threshold,
            online_percentage: percentage(online, total),
            quorum_met: online >= threshold,
        }
    }
}

/// Health across every registered federation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateHealth {
    pub federations: Vec<FederationHealth>,
    pub total_guardians: usize,
    pub online_guardians: usize,
    pub online_percentage: f64,
}

impl AggregateHealth {
    pub fn from_federations(federations: Vec<FederationHealth>) -> Self {
        let total_guardians = federations.iter().map(|f| f.total).sum();
        let online_guardians = federations.iter().map(|f| f.online).sum();
        Self {
            online_percentage: percentage(online_guardians, total_guardians),
            federations,
            total_guardians,
            online_guardians,
        }
    }
}

fn count(guardians: &[Guardian], status: GuardianStatus) -> usize {
    guardians.iter().filter(|g| g.status == status).count()
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fed(n: u64) -> FederationId {
        FederationId::parse(&format!("fed_{n}_abcdefghi")).unwrap()
    }

    fn guardians(statuses: &[GuardianStatus]) -> Vec<Guardian> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, s)| Guardian {
                status: *s,
                ..Guardian::new(i, "")
            })
            .collect()
    }

    #[test]
    fn syncing_is_not_online() {
        use GuardianStatus::*;
        let statuses = guardians(&[Online, Syncing, Offline, Online]);
        let health = FederationHealth::from_guardians(fed(1), &statuses, 3);
        assert_eq!(health.online, 2);
        assert_eq!(health.syncing, 1);
        assert_eq!(health.online_percentage, 50.0);
        assert!(!health.quorum_met);
    }

    #[test]
    fn empty_is_zero_percent() {
        let health = FederationHealth::from_guardians(fed(1), &[], 1);
        assert_eq!(health.online_percentage, 0.0);
        let agg = AggregateHealth::from_federations(vec![]);
        assert_eq!(agg.online_percentage, 0.0);
    }

    #[test]
    fn aggregate_weights_by_guardian() {
        use GuardianStatus::*;
        let a = FederationHealth::from_guardians(fed(1), &guardians(&[Online, Online]), 1);
        let b = FederationHealth::from_guardians(fed(2), &guardians(&[Offline, Offline]), 1);
        let agg = AggregateHealth::from_federations(vec![a, b]);
        assert_eq!(agg.total_guardians, 4);
        assert_eq!(agg.online_guardians, 2);
        assert_eq!(agg.online_percentage, 50.0);
    }
}
