//! Guardian quorum client and its collaborators.
//!
//! - [`QuorumClient`]: one federation membership (liveness, notes, gateway proxy)
//! - [`Guardian`]: per-guardian liveness record
//! - [`LightningGateway`]: the federation's Lightning gateway
//! - [`FederationHealth`] / [`AggregateHealth`]: health snapshots

mod client;
mod gateway;
mod guardian;
mod health;

pub use client::{ConnectReport, FederationMembershipConfig, QuorumClient};
pub use gateway::{GatewayInvoice, GatewayPayment, LightningGateway, NoGateway};
pub use guardian::{Guardian, GuardianStatus, guardian_id};
pub use health::{AggregateHealth, FederationHealth};
