//! # texrender
//!
//! Render LaTeX markup to bitmaps by driving an installed TeX toolchain.
//!
//! ## Why this crate?
//!
//! Formula labels, plot annotations and worksheet cells want typeset maths
//! as an image. Rather than reimplementing TeX, this crate writes a complete
//! document, runs a real engine on it, and rasterises the result with
//! ImageMagick, cleaning up every intermediate file on the way out.
//!
//! ## Pipeline Overview
//!
//! ```text
//! markup + Formatting
//!  │
//!  ├─ 1. Assemble   complete LaTeX source (colour, size, font family)
//!  ├─ 2. Workspace  uniquely named texrender_XXXXXX.tex in /dev/shm or $TMPDIR
//!  ├─ 3. Compile    pdflatex / xelatex / lualatex → .pdf, latex → .dvi
//!  ├─ 4. PostScript dvips -E → .ps (latex only)
//!  ├─ 5. Rasterise  convert -density DxD → .png
//!  └─ 6. Decode     PNG → DynamicImage + per-stage stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use texrender::{Formatting, FontColor, RenderConfig, TexRenderer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let renderer = TexRenderer::new(RenderConfig::default());
//!     renderer.check()?;
//!
//!     let fmt = Formatting {
//!         font_color: FontColor::rgb(0x20, 0x40, 0xa0),
//!         dpi: 300,
//!         ..Formatting::default()
//!     };
//!     let output = renderer.render(r"\int_0^1 x^2\,dx", &fmt).await;
//!     println!("success={} {}ms", output.success, output.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `texrender` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! texrender = { version = "0.3", default-features = false }
//! ```
//!
//! ## Choosing an Engine
//!
//! | Engine | Output | Font family | Needs |
//! |--------|--------|-------------|-------|
//! | `pdflatex` | PDF | no  | convert + ghostscript |
//! | `xelatex`  | PDF | yes | convert + ghostscript |
//! | `lualatex` | PDF | yes | convert + ghostscript |
//! | `latex`    | DVI | no  | dvips + convert + ghostscript |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod render;
pub mod resolver;
pub mod settings;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Engine, FontColor, Formatting, RenderConfig, RenderConfigBuilder};
pub use error::{StageFailure, TexRenderError};
pub use output::{RenderOutput, RenderStats, RenderSummary, ToolStatus, ToolchainReport};
pub use process::{Invocation, ProcessOutcome, ProcessRunner, SystemProcessRunner};
pub use progress::{NoopProgressCallback, ProgressCallback, RenderProgressCallback, RenderStage};
pub use render::{is_available, render, render_sync, TexRenderer};
pub use resolver::EngineResolver;
pub use settings::SettingsStore;
pub use tex_toolchain::{PlatformInfo, SystemLocator, ToolLocator, ToolchainError};
