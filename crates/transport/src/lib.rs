//! Transport layer for guardian liveness probing.
//!
//! A quorum client asks every guardian of its federation whether it is alive
//! before declaring itself connected. This crate defines that exchange and the
//! transports that carry it.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`liveness`] | Request/response contract, [`GuardianTransport`], [`TransportError`] |
//! | [`http`] | [`HttpGuardianTransport`]: JSON over HTTP via `reqwest` |
//! | [`fake`] | [`ScriptedTransport`]: deterministic in-process guardians for tests |
//!
//! Probe timeouts are enforced by the caller. Transports report only what
//! happened on the wire.

pub mod fake;
pub mod http;
pub mod liveness;

pub use fake::{ProbeScript, ScriptedTransport};
pub use http::HttpGuardianTransport;
pub use liveness::{
    GuardianTransport, LIVENESS_PATH, LivenessRequest, LivenessResponse, LivenessState,
    TransportError,
};
