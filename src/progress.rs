//! Progress-callback trait for per-stage render events.
//!
//! Inject an [`Arc<dyn RenderProgressCallback>`] via
//! [`crate::config::RenderConfigBuilder::progress_callback`] to observe a
//! render as it moves through its external-tool stages. The CLI uses this to
//! drive a spinner; a GUI could forward it to a status bar.
//!
//! # Example
//!
//! ```rust
//! use texrender::{RenderConfig, RenderProgressCallback, RenderStage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct StageCounter {
//!     done: AtomicUsize,
//! }
//!
//! impl RenderProgressCallback for StageCounter {
//!     fn on_stage_complete(&self, stage: RenderStage, elapsed_ms: u64) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage} took {elapsed_ms}ms");
//!     }
//! }
//!
//! let config = RenderConfig::builder()
//!     .progress_callback(Arc::new(StageCounter { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One step of the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderStage {
    /// Writing the assembled document to the temp file.
    Assemble,
    /// Running the LaTeX engine.
    Compile,
    /// `dvips`: DVI → PS.
    PostScript,
    /// Raster converter: PDF/PS → PNG.
    Rasterise,
    /// Loading the PNG into memory.
    Decode,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RenderStage::Assemble => "assemble",
            RenderStage::Compile => "compile",
            RenderStage::PostScript => "dvips",
            RenderStage::Rasterise => "rasterise",
            RenderStage::Decode => "decode",
        };
        f.write_str(s)
    }
}

/// Called by the render pipeline as it runs each stage.
///
/// Implementations must be `Send + Sync`: [`crate::TexRenderer::render_many`]
/// drives several renders at once, so events from different renders may
/// interleave. All methods default to no-ops.
pub trait RenderProgressCallback: Send + Sync {
    /// Called once per render, before the temp file is created.
    fn on_render_start(&self, markup: &str) {
        let _ = markup;
    }

    /// Called when a stage begins.
    fn on_stage_start(&self, stage: RenderStage) {
        let _ = stage;
    }

    /// Called when a stage finishes without a recorded failure.
    fn on_stage_complete(&self, stage: RenderStage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called when a stage records a failure.
    fn on_stage_failed(&self, stage: RenderStage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once per render, after all artifacts are cleaned up.
    fn on_render_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RenderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RenderConfig`].
pub type ProgressCallback = Arc<dyn RenderProgressCallback>;
