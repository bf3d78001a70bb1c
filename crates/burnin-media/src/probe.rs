//! Video resolution probing.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::command::ExternalTool;
use crate::error::{MediaError, MediaResult};
use crate::scratch::ScratchSpace;

/// Frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Largest accepted frame side. Anything above is a misread, and would make
/// the overlay resize allocate without bound.
pub const MAX_DIMENSION: u32 = 16_384;

fn resolution_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Leading boundary only: "640x480," and "640x480 [SAR" must match,
    // while codec tags like "0x31637661" must not. ASCII digits only.
    PATTERN.get_or_init(|| Regex::new(r"\b([0-9]{2,10})x([0-9]{2,10})").expect("static regex"))
}

/// Extract the first `WIDTHxHEIGHT` token from probe output.
pub fn parse_resolution(text: &str) -> MediaResult<Resolution> {
    let captures = resolution_pattern()
        .captures(text)
        .ok_or_else(|| MediaError::probe_parse(text))?;

    let width: u32 = captures[1].parse().map_err(|_| MediaError::probe_parse(text))?;
    let height: u32 = captures[2].parse().map_err(|_| MediaError::probe_parse(text))?;

    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(MediaError::probe_parse(text));
    }

    Ok(Resolution::new(width, height))
}

/// Finds the resolution of in-memory video bytes with an external probe tool.
#[derive(Debug, Clone)]
pub struct ResolutionProber {
    tool: ExternalTool,
    scratch: ScratchSpace,
}

impl ResolutionProber {
    pub fn new(tool: ExternalTool, scratch: ScratchSpace) -> Self {
        Self { tool, scratch }
    }

    /// Probe `video`. The scratch copy is removed before returning.
    pub async fn probe(&self, video: &[u8]) -> MediaResult<Resolution> {
        let input = self.scratch.file_with(".video", video).await?;

        let result = self.tool.run([input.path()]).await;

        let path = input.path().to_path_buf();
        if let Err(e) = input.close() {
            warn!("Failed to remove probe input {}: {}", path.display(), e);
        }

        // The tool may echo the input path, which can contain WxH-like text
        let output = result?
            .combined()
            .replace(path.to_string_lossy().as_ref(), "");
        let resolution = parse_resolution(&output)?;
        debug!("Probed resolution {}", resolution);
        Ok(resolution)
    }
}
