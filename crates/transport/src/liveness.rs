//! Guardian liveness contract.
//!
//! A probe is a JSON `POST` to `<endpoint>/v1/liveness`:
//!
//! ```text
//! -> {"federationId": "fed_...", "guardianId": "guardian_0", "nonce": "9f3c..."}
//! <- {"guardianId": "guardian_0", "state": "online", "epochHeight": 42, "publicKey": "02ab..."}
//! ```
//!
//! `state` is `online` or `syncing`. `publicKey` may be omitted.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Path appended to a guardian endpoint for liveness probes.
pub const LIVENESS_PATH: &str = "/v1/liveness";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of a liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessRequest {
    pub federation_id: String,
    pub guardian_id: String,
    /// Random hex nonce, unique per probe.
    pub nonce: String,
}

/// State a guardian reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessState {
    Online,
    Syncing,
}

/// Body of a successful liveness response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessResponse {
    pub guardian_id: String,
    pub state: LivenessState,
    pub epoch_height: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from a single liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The endpoint is empty or not a usable base URL.
    InvalidEndpoint(String),

    /// The request never produced a response (refused, reset, DNS, TLS).
    Network(String),

    /// The guardian answered with a non-2xx status.
    Status { code: u16 },

    /// The response body is not a valid liveness response.
    Decode(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEndpoint(url) => write!(f, "invalid guardian endpoint '{url}'"),
            Self::Network(reason) => write!(f, "network error: {reason}"),
            Self::Status { code } => write!(f, "guardian returned HTTP {code}"),
            Self::Decode(reason) => write!(f, "undecodable liveness response: {reason}"),
        }
    }
}

impl std::error::Error for TransportError {}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Carries one liveness probe to one guardian.
///
/// Implementations must not retry and must not apply their own quorum
/// logic. The caller bounds each call with its probe timeout.
pub trait GuardianTransport: Send + Sync {
    fn probe(
        &self,
        endpoint: &str,
        request: &LivenessRequest,
    ) -> impl Future<Output = Result<LivenessResponse, TransportError>> + Send;
}

impl<T: GuardianTransport> GuardianTransport for Arc<T> {
    fn probe(
        &self,
        endpoint: &str,
        request: &LivenessRequest,
    ) -> impl Future<Output = Result<LivenessResponse, TransportError>> + Send {
        (**self).probe(endpoint, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case() {
        let req = LivenessRequest {
            federation_id: "fed_1_abcdefghi".into(),
            guardian_id: "guardian_0".into(),
            nonce: "00".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["federationId"], "fed_1_abcdefghi");
        assert_eq!(json["guardianId"], "guardian_0");
    }

    #[test]
    fn response_public_key_is_optional() {
        let resp: LivenessResponse = serde_json::from_str(
            r#"{"guardianId":"guardian_1","state":"syncing","epochHeight":7}"#,
        )
        .unwrap();
        assert_eq!(resp.state, LivenessState::Syncing);
        assert_eq!(resp.epoch_height, 7);
        assert!(resp.public_key.is_none());
    }

    #[test]
    fn unknown_state_is_rejected() {
        let result = serde_json::from_str::<LivenessResponse>(
            r#"{"guardianId":"guardian_1","state":"offline","epochHeight":7}"#,
        );
        assert!(result.is_err());
    }
}
