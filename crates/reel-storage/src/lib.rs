//! Blob storage for the Photoreel engine.
//!
//! This crate provides:
//! - The [`ObjectStore`] trait the engine programs against
//! - An S3-compatible client ([`S3Store`]) for R2/MinIO-style services
//! - A filesystem-backed store ([`FsStore`]) for tests and local setups

pub mod client;
pub mod error;
pub mod fs;
pub mod store;

pub use client::{S3Config, S3Store};
pub use error::{StorageError, StorageResult};
pub use fs::FsStore;
pub use store::ObjectStore;
