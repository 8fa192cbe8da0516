//! Job status persistence for the Photoreel engine.
//!
//! The engine treats job persistence as an external key-value collaborator:
//! this crate defines the [`JobStore`] contract and ships an in-memory
//! implementation for tests and embedded use.

pub mod error;
pub mod store;

pub use error::{JobStoreError, JobStoreResult};
pub use store::{JobRecord, JobStore, MemoryJobStore, StatusPatch};
