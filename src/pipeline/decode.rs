//! Decode the final PNG into a `DynamicImage`.

use crate::error::StageFailure;
use image::DynamicImage;
use std::path::Path;
use tracing::debug;

/// Load and decode the PNG at `path`.
///
/// A missing file, a decode error and a zero-sized image are all
/// [`StageFailure::DecodeFailed`].
pub fn load_png(path: &Path) -> Result<DynamicImage, StageFailure> {
    let bytes = std::fs::read(path).map_err(|e| StageFailure::DecodeFailed {
        detail: format!("{}: {}", path.display(), e),
    })?;
    let img = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png).map_err(|e| {
        StageFailure::DecodeFailed {
            detail: e.to_string(),
        }
    })?;
    if img.width() == 0 || img.height() == 0 {
        return Err(StageFailure::DecodeFailed {
            detail: "image is empty".into(),
        });
    }
    debug!("Decoded {} → {}x{} px", path.display(), img.width(), img.height());
    Ok(img)
}
