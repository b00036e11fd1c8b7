//! Shared storage primitives for Hearth.
//!
//! This crate provides the common [`StorageError`] type returned by the keyed
//! stores in the workspace. The store traits themselves live next to the
//! domain types they hold (`hearth-sdk` owns `NoteStore` and the registry
//! maps) so this crate stays free of domain models.
//!
//! - **Stores are single-owner.** A note store belongs to one quorum client,
//!   the registry maps belong to one orchestrator.
//! - **Errors cover store failures only.** Bad amounts, expired notes and
//!   malformed ids are rejected by the caller before reaching a store.

mod error;

pub use error::StorageError;
