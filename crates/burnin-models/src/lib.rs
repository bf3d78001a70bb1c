//! Shared data models for the burnin transcode worker.
//!
//! This crate provides Serde-serializable types for:
//! - Transcode job messages
//! - Storage-relative object paths
//! - Fetched artifacts
//! - Overlay encoding parameters

pub mod artifact;
pub mod encoding;
pub mod job;
pub mod path;

// Re-export common types
pub use artifact::Artifact;
pub use encoding::OverlayEncoding;
pub use job::{JobDecodeError, TranscodeJob};
pub use path::{PathError, StoragePath};
