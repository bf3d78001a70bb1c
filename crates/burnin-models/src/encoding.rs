//! Overlay encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default target video bitrate
pub const DEFAULT_VIDEO_BITRATE: &str = "2048k";
/// Default rate-control buffer size
pub const DEFAULT_BUFFER_SIZE: &str = "500k";
/// Allows the experimental AAC encoder on older FFmpeg builds
pub const DEFAULT_STRICT: &str = "-2";
/// Overlay placed at the top-left corner, covering the frame once resized
pub const FULL_FRAME_OVERLAY_FILTER: &str = "overlay=0:0";

/// Fixed parameter set used when burning an overlay into a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OverlayEncoding {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Target video bitrate
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,

    /// Rate-control buffer size
    #[serde(default = "default_buffer_size")]
    pub buffer_size: String,

    /// Value passed to `-strict`
    #[serde(default = "default_strict")]
    pub strict: String,

    /// Filter graph combining the video (input 0) and overlay (input 1)
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_video_bitrate() -> String {
    DEFAULT_VIDEO_BITRATE.to_string()
}
fn default_buffer_size() -> String {
    DEFAULT_BUFFER_SIZE.to_string()
}
fn default_strict() -> String {
    DEFAULT_STRICT.to_string()
}
fn default_filter() -> String {
    FULL_FRAME_OVERLAY_FILTER.to_string()
}

impl Default for OverlayEncoding {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            video_bitrate: default_video_bitrate(),
            buffer_size: default_buffer_size(),
            strict: default_strict(),
            filter: default_filter(),
        }
    }
}

impl OverlayEncoding {
    /// Codec arguments, placed between the inputs and the filter.
    pub fn codec_args(&self) -> Vec<String> {
        vec![
            "-strict".to_string(),
            self.strict.clone(),
            "-codec:v".to_string(),
            self.codec.clone(),
            "-b:v".to_string(),
            self.video_bitrate.clone(),
            "-bufsize".to_string(),
            self.buffer_size.clone(),
        ]
    }

    /// Codec arguments followed by the filter expression.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = self.codec_args();
        args.push("-filter_complex".to_string());
        args.push(self.filter.clone());
        args
    }
}
