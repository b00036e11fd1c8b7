//! Role-based spending limits.
//!
//! Only the offspring role is limited: a fixed daily cap per member, reset at
//! UTC midnight. Spend is recorded after a payment succeeds, so a refused or
//! failed payment never consumes allowance. Receiving is never limited.

use std::collections::HashMap;
use std::sync::Mutex;

use hearth_core::UserRole;
use serde::Serialize;

use crate::utils::{DAY_MS, now_millis};

/// The limit that applies to a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "capSats")]
pub enum SpendingLimit {
    Unlimited,
    Daily(u64),
}

/// Outcome of a spending check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingDecision {
    pub allowed: bool,
    /// Set when the amount could go through with a steward's approval.
    pub requires_approval: bool,
    pub limit: SpendingLimit,
    /// Allowance left today before this payment. `None` when unlimited.
    pub remaining: Option<u64>,
}

/// Who is spending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberContext {
    pub member_id: String,
    pub role: UserRole,
}

impl MemberContext {
    pub fn new(member_id: impl Into<String>, role: UserRole) -> Self {
        Self {
            member_id: member_id.into(),
            role,
        }
    }
}

/// Per-member daily spend ledger.
#[derive(Debug)]
pub struct SpendingTracker {
    offspring_daily_cap_sats: u64,
    // member -> (day index, spent that day)
    spent: Mutex<HashMap<String, (u64, u64)>>,
}

impl SpendingTracker {
    pub fn new(offspring_daily_cap_sats: u64) -> Self {
        Self {
            offspring_daily_cap_sats,
            spent: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit_for(&self, role: UserRole) -> SpendingLimit {
        match role {
            UserRole::Offspring => SpendingLimit::Daily(self.offspring_daily_cap_sats),
            UserRole::Private | UserRole::Adult | UserRole::Steward | UserRole::Guardian => {
                SpendingLimit::Unlimited
            }
        }
    }

    pub fn check(&self, member: &MemberContext, amount_sats: u64) -> SpendingDecision {
        self.check_at(member, amount_sats, now_millis())
    }

    pub fn record(&self, member: &MemberContext, amount_sats: u64) {
        self.record_at(member, amount_sats, now_millis());
    }

    /// Today's spend of `member_id`.
    pub fn spent_today(&self, member_id: &str) -> u64 {
        self.spent_on(member_id, now_millis() / DAY_MS)
    }

    fn spent_on(&self, member_id: &str, day: u64) -> u64 {
        let Ok(spent) = self.spent.lock() else {
            return 0;
        };
        match spent.get(member_id) {
            Some(&(d, amount)) if d == day => amount,
            _ => 0,
        }
    }

    fn check_at(&self, member: &MemberContext, amount_sats: u64, now_ms: u64) -> SpendingDecision {
        let limit = self.limit_for(member.role);
        let SpendingLimit::Daily(cap) = limit else {
            return SpendingDecision {
                allowed: true,
                requires_approval: false,
                limit,
                remaining: None,
            };
        };

        let remaining = cap.saturating_sub(self.spent_on(&member.member_id, now_ms / DAY_MS));
        let allowed = amount_sats <= remaining;
        SpendingDecision {
            allowed,
            requires_approval: !allowed,
            limit,
            remaining: Some(remaining),
        }
    }

    fn record_at(&self, member: &MemberContext, amount_sats: u64, now_ms: u64) {
        if self.limit_for(member.role) == SpendingLimit::Unlimited {
            return;
        }
        let day = now_ms / DAY_MS;
        if let Ok(mut spent) = self.spent.lock() {
            let entry = spent.entry(member.member_id.clone()).or_insert((day, 0));
            if entry.0 != day {
                *entry = (day, 0);
            }
            entry.1 = entry.1.saturating_add(amount_sats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: u64 = 50_000;

    fn kid() -> MemberContext {
        MemberContext::new("kid", UserRole::Offspring)
    }

    #[test]
    fn unlimited_roles_are_always_allowed() {
        let tracker = SpendingTracker::new(CAP);
        for role in [UserRole::Private, UserRole::Adult, UserRole::Steward, UserRole::Guardian] {
            let decision = tracker.check(&MemberContext::new("m", role), u64::MAX);
            assert!(decision.allowed);
            assert!(!decision.requires_approval);
            assert_eq!(decision.limit, SpendingLimit::Unlimited);
            assert_eq!(decision.remaining, None);
        }
    }

    #[test]
    fn offspring_over_cap_requires_approval() {
        let tracker = SpendingTracker::new(CAP);
        let decision = tracker.check(&kid(), CAP + 1);
        assert!(!decision.allowed);
        assert!(decision.requires_approval);
        assert_eq!(decision.limit, SpendingLimit::Daily(CAP));
        assert_eq!(decision.remaining, Some(CAP));
        assert!(tracker.check(&kid(), CAP).allowed);
    }

    #[test]
    fn recorded_spend_reduces_allowance() {
        let tracker = SpendingTracker::new(CAP);
        tracker.record(&kid(), 30_000);
        assert_eq!(tracker.spent_today("kid"), 30_000);
        let decision = tracker.check(&kid(), 20_001);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, Some(20_000));
        assert!(tracker.check(&MemberContext::new("sibling", UserRole::Offspring), 50_000).allowed);
    }

    #[test]
    fn allowance_resets_each_day() {
        let tracker = SpendingTracker::new(CAP);
        let day0 = 10 * DAY_MS + 5;
        tracker.record_at(&kid(), CAP, day0);
        assert!(!tracker.check_at(&kid(), 1, day0).allowed);
        assert!(tracker.check_at(&kid(), CAP, day0 + DAY_MS).allowed);

        tracker.record_at(&kid(), 1, day0 + DAY_MS);
        assert_eq!(tracker.spent_on("kid", 11), 1);
    }

    #[test]
    fn unlimited_spend_is_not_tracked() {
        let tracker = SpendingTracker::new(CAP);
        tracker.record(&MemberContext::new("mom", UserRole::Adult), 1_000_000);
        assert_eq!(tracker.spent_today("mom"), 0);
    }
}
