//! Error types for the texrender library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`TexRenderError`]: **Fatal**: something outside a single render went
//!   wrong (missing toolchain, invalid configuration, unreadable settings),
//!   or a caller asked for a hard result via
//!   [`crate::output::RenderOutput::into_result`].
//!
//! * [`StageFailure`]: **Recorded**: one stage of a render failed. A render
//!   call never returns `Err`; it returns a
//!   [`crate::output::RenderOutput`] whose `success` flag is false and whose
//!   `failures` list says which stage broke and why.
//!
//! Nothing is retried. A missing tool is a permanent precondition failure and
//! is best detected up front with [`crate::TexRenderer::is_available`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the texrender library.
#[derive(Debug, Error)]
pub enum TexRenderError {
    // ── Toolchain errors ──────────────────────────────────────────────────
    /// A required external program could not be resolved.
    #[error("Required program '{tool}' is not available.\n{hint}")]
    ToolNotFound { tool: String, hint: String },

    // ── Working-file errors ───────────────────────────────────────────────
    /// The temporary source file could not be created or written.
    #[error("Cannot create temporary file in '{dir}': {source}")]
    TempFile {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Document errors ───────────────────────────────────────────────────
    /// Markup contains `\begin{document}` but no `\end{document}` after it.
    #[error("Markup contains \\begin{{document}} without a matching \\end{{document}}")]
    MissingEndDocument,

    // ── Process errors ────────────────────────────────────────────────────
    /// The engine did not exit within the bounded wait.
    #[error("{engine} did not finish within {secs}s")]
    EngineTimeout { engine: String, secs: u64 },

    /// The engine reported errors (nonzero exit or could not be started).
    #[error("{engine} failed (exit code {code:?}){}", format_diagnostics(.diagnostics))]
    EngineFailed {
        engine: String,
        code: Option<i32>,
        diagnostics: Vec<String>,
    },

    /// `dvips` or the raster converter failed.
    #[error("Conversion with '{tool}' failed: {detail}")]
    ConversionFailed { tool: String, detail: String },

    /// The final PNG could not be decoded.
    #[error("Rendered image could not be decoded: {0}")]
    DecodeFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the rendered PNG to its destination.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The settings file exists but could not be read or parsed.
    #[error("Settings file '{path}' is unusable: {detail}")]
    Settings { path: PathBuf, detail: String },

    /// Builder or formatting validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_diagnostics(lines: &[String]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        format!(":\n  {}", lines.join("\n  "))
    }
}

/// A failure recorded against one stage of a render.
///
/// Stored in [`crate::output::RenderOutput::failures`]. Apart from
/// [`StageFailure::EngineExit`] every variant ends the render early.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum StageFailure {
    /// The uniquely named working file could not be created or written.
    #[error("temporary file: {detail}")]
    TempFile { detail: String },

    /// The formatting parameters were rejected before any file was written.
    #[error("invalid formatting: {detail}")]
    InvalidFormatting { detail: String },

    /// Full-document markup without a closing `\end{document}`.
    #[error("document assembly: missing \\end{{document}}")]
    MissingEndDocument,

    /// The markup could not be turned into a document for another reason.
    #[error("document assembly: {detail}")]
    Assembly { detail: String },

    /// A program could not be started at all.
    #[error("{program}: could not start: {detail}")]
    Spawn { program: String, detail: String },

    /// The engine outlived the bounded wait.
    #[error("{engine}: timed out after {secs}s")]
    EngineTimeout { engine: String, secs: u64 },

    /// The engine exited nonzero. The pipeline still tries to convert
    /// whatever output it left behind.
    #[error("{engine}: exit code {code:?}")]
    EngineExit {
        engine: String,
        code: Option<i32>,
        diagnostics: Vec<String>,
    },

    /// `dvips` or the raster converter did not complete successfully.
    #[error("{tool}: {detail}")]
    ConversionFailed { tool: String, detail: String },

    /// The PNG was missing or undecodable.
    #[error("decode: {detail}")]
    DecodeFailed { detail: String },
}

impl From<StageFailure> for TexRenderError {
    fn from(f: StageFailure) -> Self {
        match f {
            StageFailure::TempFile { detail } => TexRenderError::TempFile {
                dir: PathBuf::new(),
                source: std::io::Error::other(detail),
            },
            StageFailure::InvalidFormatting { detail } => TexRenderError::InvalidConfig(detail),
            StageFailure::MissingEndDocument => TexRenderError::MissingEndDocument,
            StageFailure::Assembly { detail } => TexRenderError::Internal(detail),
            StageFailure::Spawn { program, detail } => TexRenderError::ToolNotFound {
                tool: program,
                hint: format!("could not start: {detail}"),
            },
            StageFailure::EngineTimeout { engine, secs } => {
                TexRenderError::EngineTimeout { engine, secs }
            }
            StageFailure::EngineExit {
                engine,
                code,
                diagnostics,
            } => TexRenderError::EngineFailed {
                engine,
                code,
                diagnostics,
            },
            StageFailure::ConversionFailed { tool, detail } => {
                TexRenderError::ConversionFailed { tool, detail }
            }
            StageFailure::DecodeFailed { detail } => TexRenderError::DecodeFailed(detail),
        }
    }
}
