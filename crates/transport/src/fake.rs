//! Deterministic in-process guardians.
//!
//! [`ScriptedTransport`] answers probes from a per-endpoint script instead of
//! the network. Endpoints without a script are unreachable.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::liveness::{
    GuardianTransport, LivenessRequest, LivenessResponse, LivenessState, TransportError,
};

/// How a scripted guardian answers a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeScript {
    /// Answers `online` at the given epoch.
    Online { epoch_height: u64 },
    /// Answers `syncing`.
    Syncing,
    /// Fails with a network error.
    Unreachable,
    /// Never answers.
    Hang,
    /// Answers `online` after sleeping.
    Delayed { delay_ms: u64, epoch_height: u64 },
    /// Answers `online` under a different guardian id.
    WrongGuardian,
}

/// Liveness transport driven by scripts.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: RwLock<HashMap<String, ProbeScript>>,
    probes: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a transport from `(endpoint, script)` pairs.
    pub fn with_scripts<'a>(scripts: impl IntoIterator<Item = (&'a str, ProbeScript)>) -> Self {
        let transport = Self::new();
        for (endpoint, script) in scripts {
            transport.set(endpoint, script);
        }
        transport
    }

    /// Replaces the script of `endpoint`.
    pub fn set(&self, endpoint: &str, script: ProbeScript) {
        if let Ok(mut scripts) = self.scripts.write() {
            scripts.insert(endpoint.to_owned(), script);
        }
    }

    /// Total number of probes received.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    fn script_for(&self, endpoint: &str) -> ProbeScript {
        self.scripts
            .read()
            .ok()
            .and_then(|scripts| scripts.get(endpoint).copied())
            .unwrap_or(ProbeScript::Unreachable)
    }
}

fn online(request: &LivenessRequest, epoch_height: u64) -> LivenessResponse {
    LivenessResponse {
        guardian_id: request.guardian_id.clone(),
        state: LivenessState::Online,
        epoch_height,
        public_key: Some(format!("pk_{}", request.guardian_id)),
    }
}

impl GuardianTransport for ScriptedTransport {
    async fn probe(
        &self,
        endpoint: &str,
        request: &LivenessRequest,
    ) -> Result<LivenessResponse, TransportError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match self.script_for(endpoint) {
            ProbeScript::Online { epoch_height } => Ok(online(request, epoch_height)),
            ProbeScript::Syncing => Ok(LivenessResponse {
                state: LivenessState::Syncing,
                ..online(request, 0)
            }),
            ProbeScript::Unreachable => Err(TransportError::Network(format!(
                "{endpoint} unreachable"
            ))),
            ProbeScript::Hang => std::future::pending().await,
            ProbeScript::Delayed {
                delay_ms,
                epoch_height,
            } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(online(request, epoch_height))
            }
            ProbeScript::WrongGuardian => Ok(LivenessResponse {
                guardian_id: format!("{}_impostor", request.guardian_id),
                ..online(request, 0)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(guardian: &str) -> LivenessRequest {
        LivenessRequest {
            federation_id: "fed_1_abcdefghi".into(),
            guardian_id: guardian.into(),
            nonce: "00".into(),
        }
    }

    #[tokio::test]
    async fn scripted_responses() {
        let transport = ScriptedTransport::with_scripts([
            ("g0", ProbeScript::Online { epoch_height: 3 }),
            ("g1", ProbeScript::Syncing),
        ]);

        let r0 = transport.probe("g0", &request("guardian_0")).await.unwrap();
        assert_eq!(r0.state, LivenessState::Online);
        assert_eq!(r0.epoch_height, 3);
        assert_eq!(r0.guardian_id, "guardian_0");

        let r1 = transport.probe("g1", &request("guardian_1")).await.unwrap();
        assert_eq!(r1.state, LivenessState::Syncing);

        let err = transport.probe("g2", &request("guardian_2")).await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
        assert_eq!(transport.probe_count(), 3);
    }

    #[tokio::test]
    async fn wrong_guardian_answers_under_another_id() {
        let transport = ScriptedTransport::with_scripts([("g0", ProbeScript::WrongGuardian)]);
        let resp = transport.probe("g0", &request("guardian_0")).await.unwrap();
        assert_ne!(resp.guardian_id, "guardian_0");
    }

    #[tokio::test]
    async fn hang_never_resolves() {
        let transport = ScriptedTransport::with_scripts([("g0", ProbeScript::Hang)]);
        let req = request("guardian_0");
        let result =
            tokio::time::timeout(Duration::from_millis(20), transport.probe("g0", &req)).await;
        assert!(result.is_err());
    }
}
