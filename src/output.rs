//! Output types returned by the renderer.

use crate::config::Engine;
use crate::error::{StageFailure, TexRenderError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Result of one render call.
///
/// A render never returns `Err`. Check [`RenderOutput::success`] (or call
/// [`RenderOutput::into_result`]) to decide whether the image is usable.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// The decoded bitmap. `None` when no PNG was produced or it did not decode.
    pub image: Option<DynamicImage>,
    /// False if any required stage failed or the image is missing.
    pub success: bool,
    /// Every failure recorded during the call, in stage order.
    pub failures: Vec<StageFailure>,
    /// Timing and size information.
    pub stats: RenderStats,
}

impl RenderOutput {
    /// Convert to a hard result: the image on success, else the first
    /// recorded failure as a [`TexRenderError`].
    pub fn into_result(self) -> Result<DynamicImage, TexRenderError> {
        match (self.success, self.image) {
            (true, Some(img)) => Ok(img),
            (_, image) => Err(self
                .failures
                .into_iter()
                .next()
                .map(TexRenderError::from)
                .unwrap_or_else(|| {
                    if image.is_none() {
                        TexRenderError::DecodeFailed("no image produced".into())
                    } else {
                        TexRenderError::Internal("render flagged as failed".into())
                    }
                })),
        }
    }

    /// PNG-encode the image, if any.
    pub fn to_png_bytes(&self) -> Option<Result<Vec<u8>, image::ImageError>> {
        self.image.as_ref().map(|img| {
            let mut buf = Vec::new();
            img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
            Ok(buf)
        })
    }

    /// Serialisable summary with the PNG inlined as base64.
    pub fn summary(&self) -> Result<RenderSummary, image::ImageError> {
        let png_base64 = match self.to_png_bytes() {
            Some(bytes) => Some(STANDARD.encode(bytes?)),
            None => None,
        };
        Ok(RenderSummary {
            success: self.success,
            failures: self.failures.clone(),
            stats: self.stats.clone(),
            png_base64,
        })
    }
}

/// Timing and size information for one render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderStats {
    /// Engine used.
    pub engine: Engine,
    /// Wall-clock time of the whole call.
    pub total_duration_ms: u64,
    /// Time spent in the engine process.
    pub engine_duration_ms: u64,
    /// Time spent in `dvips` and the raster converter.
    pub conversion_duration_ms: u64,
    /// Image width in pixels (0 when there is no image).
    pub width: u32,
    /// Image height in pixels (0 when there is no image).
    pub height: u32,
}

/// JSON-friendly view of a [`RenderOutput`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSummary {
    pub success: bool,
    pub failures: Vec<StageFailure>,
    pub stats: RenderStats,
    /// Base64 PNG data, absent when no image was produced.
    pub png_base64: Option<String>,
}

/// Resolution state of one external tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStatus {
    pub name: String,
    /// Resolved executable, `None` when missing.
    pub path: Option<PathBuf>,
    /// Whether the configured engine needs this tool.
    pub required: bool,
}

/// Availability report for the configured toolchain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolchainReport {
    pub engine: Engine,
    pub available: bool,
    pub ghostscript_available: bool,
    /// Description of the first missing tool, if any.
    pub first_problem: Option<String>,
    pub tools: Vec<ToolStatus>,
}

/// Write `bytes` to `path` through a sibling `.tmp` file and a rename, so a
/// reader never sees a partial file. Missing parent directories are created.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    tokio::fs::rename(&tmp_path, path).await
}
