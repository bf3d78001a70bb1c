#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for overlay burn-in.
//!
//! This crate provides:
//! - Argument-vector invocation of external tools (no shell)
//! - Job-scoped scratch files removed on every exit path
//! - Resolution probing from FFprobe output
//! - Overlay preparation (EXIF orientation, stretch to frame) and compositing

pub mod command;
pub mod error;
pub mod overlay;
pub mod probe;
pub mod scratch;

pub use command::{ExternalTool, FfmpegCommand, ToolOutput, FFPROBE_SIZE_ARGS};
pub use error::{MediaError, MediaResult};
pub use overlay::{prepare_overlay, Compositor, OverlayCompositor};
pub use probe::{parse_resolution, Resolution, ResolutionProber, MAX_DIMENSION};
pub use scratch::{ScratchFile, ScratchSpace};
