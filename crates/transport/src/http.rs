//! HTTP liveness transport.
//!
//! [`HttpGuardianTransport`] posts the liveness request as JSON to
//! `<endpoint>/v1/liveness` using one shared `reqwest` client. The client is
//! connection-pooled, so probing the same guardians on every connect reuses
//! their connections.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::liveness::{
    GuardianTransport, LIVENESS_PATH, LivenessRequest, LivenessResponse, TransportError,
};

/// Liveness transport over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpGuardianTransport {
    client: Client,
}

impl HttpGuardianTransport {
    /// Builds a transport whose requests give up after `timeout`.
    ///
    /// The quorum client applies its own probe timeout on top; this one
    /// only stops abandoned sockets from lingering.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn liveness_url(endpoint: &str) -> Result<String, TransportError> {
    let base = endpoint.trim().trim_end_matches('/');
    if base.is_empty() || !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(TransportError::InvalidEndpoint(endpoint.to_owned()));
    }
    Ok(format!("{base}{LIVENESS_PATH}"))
}

impl GuardianTransport for HttpGuardianTransport {
    async fn probe(
        &self,
        endpoint: &str,
        request: &LivenessRequest,
    ) -> Result<LivenessResponse, TransportError> {
        let url = liveness_url(endpoint)?;
        debug!(%url, guardian_id = %request.guardian_id, "probing guardian");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                code: status.as_u16(),
            });
        }

        response
            .json::<LivenessResponse>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        assert_eq!(
            liveness_url("http://127.0.0.1:8080/").unwrap(),
            "http://127.0.0.1:8080/v1/liveness"
        );
        assert_eq!(
            liveness_url("https://g0.example").unwrap(),
            "https://g0.example/v1/liveness"
        );
    }

    #[test]
    fn empty_or_schemeless_endpoint_is_invalid() {
        assert!(matches!(
            liveness_url(""),
            Err(TransportError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            liveness_url("g0.example:8080"),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }
}
