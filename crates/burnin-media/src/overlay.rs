//! Burning an overlay image into a video.
//!
//! The overlay is stretched to the probed frame size and composited at the
//! top-left corner, so it always covers the full frame. The video itself is
//! never scaled.

use std::io::Cursor;
use std::time::Instant;

use async_trait::async_trait;
use burnin_models::OverlayEncoding;
use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat};
use tracing::{debug, info};

use crate::command::{ExternalTool, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::probe::{Resolution, ResolutionProber};
use crate::scratch::{close_all, ScratchFile, ScratchSpace};

/// Something that burns an overlay image into a video.
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Composite `overlay` over every frame of `video`, returning the new video.
    async fn composite(&self, video: &[u8], overlay: &[u8]) -> MediaResult<Vec<u8>>;
}

/// Decode an overlay, honour its EXIF orientation, stretch it to `size` and
/// encode it as PNG.
pub fn prepare_overlay(bytes: &[u8], size: Resolution) -> MediaResult<Vec<u8>> {
    let image =
        image::load_from_memory(bytes).map_err(|e| MediaError::invalid_overlay(e.to_string()))?;

    let image = match exif_orientation(bytes) {
        Some(orientation) => apply_orientation(image, orientation),
        None => image,
    };

    let resized = image.resize_exact(size.width, size.height, FilterType::Lanczos3);

    let mut png = Cursor::new(Vec::new());
    resized
        .write_to(&mut png, ImageOutputFormat::Png)
        .map_err(|e| MediaError::invalid_overlay(e.to_string()))?;

    Ok(png.into_inner())
}

/// EXIF orientation tag, if the image carries one.
fn exif_orientation(bytes: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0)
}

/// Rotate so the image displays upright. Mirrored orientations are left as is.
fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        3 => image.rotate180(),
        6 => image.rotate90(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// [`Compositor`] backed by FFmpeg.
#[derive(Debug, Clone)]
pub struct OverlayCompositor {
    prober: ResolutionProber,
    tool: ExternalTool,
    scratch: ScratchSpace,
    encoding: OverlayEncoding,
}

impl OverlayCompositor {
    pub fn new(prober: ResolutionProber, tool: ExternalTool, scratch: ScratchSpace) -> Self {
        Self {
            prober,
            tool,
            scratch,
            encoding: OverlayEncoding::default(),
        }
    }

    /// FFmpeg and FFprobe from PATH, scratch files under `scratch`.
    pub fn ffmpeg(scratch: ScratchSpace) -> Self {
        let prober = ResolutionProber::new(ExternalTool::ffprobe(), scratch.clone());
        Self::new(prober, ExternalTool::ffmpeg(), scratch)
    }

    /// Argument vector for one composite run.
    pub fn build_command(
        &self,
        video: &ScratchFile,
        overlay: &ScratchFile,
        output: &ScratchFile,
    ) -> FfmpegCommand {
        FfmpegCommand::new(output.path())
            .input(video.path())
            .input(overlay.path())
            .output_args(self.encoding.to_args())
    }

    async fn render(
        &self,
        video: &ScratchFile,
        overlay: &ScratchFile,
        output: &ScratchFile,
    ) -> MediaResult<Vec<u8>> {
        let args = self.build_command(video, overlay, output).build_args();
        let started = Instant::now();

        let result = self.tool.run(&args).await?;
        if !result.success() {
            return Err(MediaError::compositor_failed(
                result.exit_code,
                result.stdout,
                result.stderr,
            ));
        }

        let data = output.read().await?;
        debug!(
            "{} finished in {:.2}s, {} bytes",
            self.tool.name(),
            started.elapsed().as_secs_f64(),
            data.len()
        );
        Ok(data)
    }
}

#[async_trait]
impl Compositor for OverlayCompositor {
    async fn composite(&self, video: &[u8], overlay: &[u8]) -> MediaResult<Vec<u8>> {
        let resolution = self.prober.probe(video).await?;
        // Decode and Lanczos resize are CPU bound
        let overlay = overlay.to_vec();
        let overlay_png = tokio::task::spawn_blocking(move || prepare_overlay(&overlay, resolution))
            .await
            .map_err(|e| MediaError::Io(std::io::Error::other(e)))??;
        info!("Compositing {} overlay", resolution);

        let video_file = self.scratch.file_with(".video", video).await?;
        let overlay_file = self.scratch.file_with(".png", &overlay_png).await?;
        // The container format is picked from this suffix
        let output_file = self.scratch.file(".mp4")?;

        let result = self.render(&video_file, &overlay_file, &output_file).await;
        close_all([video_file, overlay_file, output_file]);
        result
    }
}
