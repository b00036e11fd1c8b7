//! Node manager: backend inventory, security checks and routing decisions.
//!
//! [`NodeManager`] is the seam between the router and whatever decides which
//! Lightning node serves a payment. [`PolicyNodeManager`] is the bundled
//! implementation:
//!
//! 1. Classify the request: family, e-cash settlement, internal, external
//! 2. Keep the active backends from that class's preference list, in order
//! 3. At or above the large-payment threshold, stable-sort by success rate
//! 4. First candidate is preferred, the rest are fallbacks

use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use hearth_config::{RouterConfig, RoutingPreferences};
use hearth_core::{BackendKind, PaymentType};
use serde::Serialize;
use tracing::debug;

use crate::SdkError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Recorded health of one backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHealth {
    pub successes: u64,
    pub failures: u64,
    pub last_latency_ms: Option<u64>,
    pub last_error: Option<String>,
}

impl BackendHealth {
    /// Fraction of successful attempts. An untried backend scores 1.0.
    pub fn success_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            1.0
        } else {
            self.successes as f64 / total as f64
        }
    }
}

/// A backend as known to the node manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendInfo {
    pub kind: BackendKind,
    pub is_active: bool,
    pub health: BackendHealth,
}

/// Outcome of one attempt, reported after it finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthUpdate {
    pub success: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// What the router asks the node manager to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingRequest {
    pub is_internal: bool,
    pub is_family: bool,
    pub amount_sats: u64,
    pub payment_type: PaymentType,
}

/// A routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRouting {
    pub preferred_backend: BackendKind,
    pub fallback_backends: Vec<BackendKind>,
    pub reason: String,
}

impl PaymentRouting {
    /// Preferred backend followed by fallbacks, each at most once.
    pub fn candidates(&self) -> Vec<BackendKind> {
        let mut out = Vec::with_capacity(1 + self.fallback_backends.len());
        let ordered = std::iter::once(self.preferred_backend)
            .chain(self.fallback_backends.iter().copied());
        for kind in ordered {
            if !out.contains(&kind) {
                out.push(kind);
            }
        }
        out
    }
}

/// Route class a request falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Family,
    Ecash,
    Internal,
    External,
}

impl RouteClass {
    pub fn of(request: &RoutingRequest) -> Self {
        if request.is_family {
            Self::Family
        } else if request.payment_type.is_ecash_bridge() {
            Self::Ecash
        } else if request.is_internal {
            Self::Internal
        } else {
            Self::External
        }
    }

    fn preferences(self, prefs: &RoutingPreferences) -> &'static [BackendKind] {
        match self {
            Self::Family => prefs.family,
            Self::Ecash => prefs.ecash,
            Self::Internal => prefs.internal,
            Self::External => prefs.external,
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Family => write!(f, "family"),
            Self::Ecash => write!(f, "ecash"),
            Self::Internal => write!(f, "internal"),
            Self::External => write!(f, "external"),
        }
    }
}

// ---------------------------------------------------------------------------
// NodeManager trait
// ---------------------------------------------------------------------------

/// Backend inventory and routing policy consumed by the router.
pub trait NodeManager: Send + Sync {
    fn list_backends(&self) -> Vec<BackendInfo>;

    fn get_backend(&self, kind: BackendKind) -> Option<BackendInfo>;

    /// Whether the backend may be activated.
    fn validate_security(&self, kind: BackendKind) -> bool;

    /// # Errors
    ///
    /// [`SdkError::InactiveBackend`] when no backend can serve the request.
    fn resolve_routing(&self, request: &RoutingRequest) -> Result<PaymentRouting, SdkError>;

    fn update_health(&self, kind: BackendKind, update: HealthUpdate);
}

// ---------------------------------------------------------------------------
// PolicyNodeManager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Entry {
    info: BackendInfo,
    secure: bool,
}

/// Preference-list node manager.
#[derive(Debug)]
pub struct PolicyNodeManager {
    preferences: RoutingPreferences,
    large_payment_threshold_sats: u64,
    backends: RwLock<BTreeMap<BackendKind, Entry>>,
}

impl PolicyNodeManager {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            preferences: config.preferences,
            large_payment_threshold_sats: config.large_payment_threshold_sats,
            backends: RwLock::new(BTreeMap::new()),
        }
    }

    /// Adds or replaces a backend. Health starts empty.
    pub fn register(&self, kind: BackendKind, is_active: bool) {
        if let Ok(mut backends) = self.backends.write() {
            backends.insert(
                kind,
                Entry {
                    info: BackendInfo {
                        kind,
                        is_active,
                        health: BackendHealth::default(),
                    },
                    secure: true,
                },
            );
        }
    }

    /// Returns `false` if the backend is unknown.
    pub fn set_active(&self, kind: BackendKind, is_active: bool) -> bool {
        self.with_entry(kind, |entry| entry.info.is_active = is_active)
    }

    /// Makes `validate_security` refuse the backend.
    pub fn mark_insecure(&self, kind: BackendKind) -> bool {
        self.with_entry(kind, |entry| entry.secure = false)
    }

    fn with_entry(&self, kind: BackendKind, f: impl FnOnce(&mut Entry)) -> bool {
        let Ok(mut backends) = self.backends.write() else {
            return false;
        };
        match backends.get_mut(&kind) {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }
}

impl NodeManager for PolicyNodeManager {
    fn list_backends(&self) -> Vec<BackendInfo> {
        self.backends
            .read()
            .map(|b| b.values().map(|e| e.info.clone()).collect())
            .unwrap_or_default()
    }

    fn get_backend(&self, kind: BackendKind) -> Option<BackendInfo> {
        self.backends.read().ok()?.get(&kind).map(|e| e.info.clone())
    }

    fn validate_security(&self, kind: BackendKind) -> bool {
        self.backends
            .read()
            .ok()
            .and_then(|b| b.get(&kind).map(|e| e.secure))
            .unwrap_or(false)
    }

    fn resolve_routing(&self, request: &RoutingRequest) -> Result<PaymentRouting, SdkError> {
        let class = RouteClass::of(request);
        let backends = self.backends.read().map_err(|_| SdkError::StoreFailed)?;

        let mut candidates: Vec<(BackendKind, f64)> = class
            .preferences(&self.preferences)
            .iter()
            .filter_map(|kind| backends.get(kind))
            .filter(|entry| entry.info.is_active)
            .map(|entry| (entry.info.kind, entry.info.health.success_rate()))
            .collect();
        drop(backends);

        let large = request.amount_sats >= self.large_payment_threshold_sats;
        if large {
            candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        }

        let mut kinds = candidates.into_iter().map(|(kind, _)| kind);
        let preferred_backend = kinds.next().ok_or(SdkError::InactiveBackend)?;
        let fallback_backends: Vec<BackendKind> = kinds.collect();
        let reason = if large {
            format!("{class} route, large payment sorted by success rate")
        } else {
            format!("{class} route, preference order")
        };

        debug!(
            class = %class,
            preferred = %preferred_backend,
            fallbacks = fallback_backends.len(),
            amount_sats = request.amount_sats,
            "routing resolved"
        );
        Ok(PaymentRouting {
            preferred_backend,
            fallback_backends,
            reason,
        })
    }

    fn update_health(&self, kind: BackendKind, update: HealthUpdate) {
        self.with_entry(kind, |entry| {
            let health = &mut entry.info.health;
            if update.success {
                health.successes += 1;
            } else {
                health.failures += 1;
            }
            health.last_latency_ms = Some(update.latency_ms);
            if update.error.is_some() {
                health.last_error = update.error;
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
