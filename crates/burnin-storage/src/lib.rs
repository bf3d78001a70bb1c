//! Object storage for staged sources and published results.
//!
//! This crate provides:
//! - The `ObjectStore` seam used by the worker
//! - An S3-compatible implementation (R2, MinIO, GCS interop)
//! - Public URL generation for uploaded objects

pub mod client;
pub mod error;
pub mod store;

pub use client::{S3Config, S3Store};
pub use error::{StorageError, StorageResult};
pub use store::ObjectStore;
