//! Hearth payment core: federations, routing and e-cash conversion.
//!
//! The SDK combines four collaborating subsystems:
//! - **Quorum client** (`QuorumClient`): guardian liveness, threshold
//!   connectivity and the federation's e-cash notes
//! - **Orchestrator** (`FederationOrchestrator`): registry, invites and one
//!   quorum client per federation
//! - **Router** (`PaymentRouter`): Lightning operations over several
//!   backends with privacy wrapping, spending limits and fallback
//! - **Bridge** (`EcashBridge`): token conversions settled through the router
//!
//! # Architecture
//!
//! Every multi-step operation runs under an [`tracking::OperationTracker`].
//! Failures come back as [`tracking::OperationError`], naming the step that
//! failed and the steps that completed before it. Each step is logged with
//! `tracing` and persisted to an optional [`tracking::OperationStore`].
//!
//! External systems sit behind traits:
//! - [`hearth_transport::GuardianTransport`] for guardian probes
//! - [`federation::LightningGateway`] for federation balance and Lightning
//! - [`router::LightningBackend`] for each Lightning node
//! - [`router::PrivacyService`] for invoice wrapping
//!
//! [`fake`] provides deterministic implementations of each.
//!
//! # Usage
//!
//! ```no_run
//! use hearth_config::HearthConfig;
//! use hearth_sdk::FederationOrchestrator;
//! use hearth_sdk::fake::FakeGateway;
//! use hearth_transport::{ProbeScript, ScriptedTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), hearth_sdk::SdkError> {
//! let online = ProbeScript::Online { epoch_height: 7 };
//! let transport = ScriptedTransport::with_scripts([
//!     ("https://g1.example", online),
//!     ("https://g2.example", online),
//! ]);
//! let cancel = CancellationToken::new();
//! let orchestrator = FederationOrchestrator::new(
//!     HearthConfig::DEFAULT.federation,
//!     transport,
//!     FakeGateway::with_balance(10_000),
//!     cancel.clone(),
//! );
//!
//! let endpoints = ["https://g1.example".to_owned(), "https://g2.example".to_owned()];
//! let info = orchestrator.create_federation("family", "", &endpoints, 2)?;
//! let report = orchestrator.connect(&info.id).await?;
//! assert!(report.online >= report.threshold);
//!
//! // Clones share state.
//! let handle = orchestrator.clone();
//! cancel.cancel();
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod error;
pub mod events;
pub mod fake;
pub mod federation;
pub mod notes;
pub mod orchestrator;
pub mod registry;
pub mod router;
pub mod tracking;
pub(crate) mod utils;

pub use bridge::{ConversionKind, ConversionResult, EcashBridge};
pub use error::{ErrorKind, NoteRejection, RejectReason, SdkError};
pub use federation::{FederationMembershipConfig, QuorumClient};
pub use orchestrator::FederationOrchestrator;
pub use registry::FederationRegistry;
pub use router::{MemberContext, PaymentRouter};
