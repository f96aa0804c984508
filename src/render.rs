//! Render entry points.
//!
//! [`TexRenderer`] chains the pipeline stages for one engine configuration.
//! The free functions [`render`] and [`render_sync`] build a renderer from
//! the persisted settings for one-off use.
//!
//! ## Program resolution
//!
//! Each stage starts its program by the path the [`ToolLocator`] resolves,
//! never by bare name, so a tool found only on `TEXRENDER_EXTRA_PATH` is the
//! one that runs. A tool that does not resolve is recorded as
//! [`StageFailure::Spawn`] without starting anything.
//!
//! ## Failure bookkeeping
//!
//! A render never returns `Err`. Each stage that fails pushes a
//! [`StageFailure`] and, except for a nonzero engine exit, ends the render.
//! The workspace guard is dropped before [`TexRenderer::render`] returns, so
//! intermediate files are gone on every path.

use crate::config::{Formatting, RenderConfig};
use crate::error::{StageFailure, TexRenderError};
use crate::output::{self, RenderOutput, RenderStats, ToolchainReport};
use crate::pipeline::workspace::{self, Workspace};
use crate::pipeline::{compile, decode, document, rasterise};
use crate::process::{ProcessRunner, SystemProcessRunner};
use crate::progress::{RenderProgressCallback, RenderStage};
use crate::resolver::EngineResolver;
use crate::settings::SettingsStore;
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tex_toolchain::{SystemLocator, ToolLocator};
use tracing::{debug, info, warn};

/// Renders LaTeX markup to bitmaps with one engine configuration.
///
/// Cheap to clone; clones share the runner and locator.
///
/// # Example
/// ```rust,no_run
/// use texrender::{Formatting, RenderConfig, TexRenderer};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let renderer = TexRenderer::new(RenderConfig::default());
/// if renderer.is_available() {
///     let image = renderer
///         .render("E=mc^2", &Formatting::default())
///         .await
///         .into_result()?;
///     println!("{}x{}", image.width(), image.height());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TexRenderer {
    config: RenderConfig,
    runner: Arc<dyn ProcessRunner>,
    locator: Arc<dyn ToolLocator>,
}

impl std::fmt::Debug for TexRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TexRenderer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TexRenderer {
    /// Renderer using real processes and the host search path.
    pub fn new(config: RenderConfig) -> Self {
        Self::with_capabilities(
            config,
            Arc::new(SystemProcessRunner),
            Arc::new(SystemLocator::new()),
        )
    }

    /// Renderer with explicit process-runner and tool-locator capabilities.
    pub fn with_capabilities(
        config: RenderConfig,
        runner: Arc<dyn ProcessRunner>,
        locator: Arc<dyn ToolLocator>,
    ) -> Self {
        Self {
            config,
            runner,
            locator,
        }
    }

    /// Renderer whose engine comes from `Settings_Worksheet/LaTeXEngine`.
    pub fn from_settings(store: &SettingsStore) -> Result<Self, TexRenderError> {
        Ok(Self::new(RenderConfig::from_settings(store).build()?))
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn resolver(&self) -> EngineResolver {
        EngineResolver::new(&self.config, Arc::clone(&self.locator))
    }

    /// True when every tool the configured engine needs resolves.
    pub fn is_available(&self) -> bool {
        self.resolver().is_available()
    }

    /// Like [`TexRenderer::is_available`], naming the first missing tool.
    pub fn check(&self) -> Result<(), TexRenderError> {
        self.resolver().check()
    }

    /// Availability of every relevant tool.
    pub fn toolchain_report(&self) -> ToolchainReport {
        self.resolver().report()
    }

    /// The LaTeX source a render would compile. Runs no tools.
    pub fn document_source(
        &self,
        markup: &str,
        formatting: &Formatting,
    ) -> Result<String, TexRenderError> {
        formatting.validate()?;
        document::assemble(markup, formatting, self.config.engine)
    }

    /// Render `markup` to a bitmap.
    ///
    /// Returns the image (possibly `None`) and a success flag; see
    /// [`RenderOutput`].
    pub async fn render(&self, markup: &str, formatting: &Formatting) -> RenderOutput {
        let start = Instant::now();
        let engine = self.config.engine;
        info!("Rendering {} bytes of markup with {}", markup.len(), engine);
        if let Some(cb) = self.callback() {
            cb.on_render_start(markup);
        }

        let mut failures = Vec::new();
        let mut stats = RenderStats {
            engine,
            ..RenderStats::default()
        };
        let image = self
            .run_stages(markup, formatting, &mut failures, &mut stats)
            .await;

        if let Some(ref img) = image {
            stats.width = img.width();
            stats.height = img.height();
        }
        stats.total_duration_ms = elapsed_ms(start);
        let success = image.is_some() && failures.is_empty();

        if success {
            info!(
                "Rendered {}x{} px in {}ms",
                stats.width, stats.height, stats.total_duration_ms
            );
        } else {
            warn!(
                "Render finished with {} failure(s) in {}ms",
                failures.len(),
                stats.total_duration_ms
            );
        }
        if let Some(cb) = self.callback() {
            cb.on_render_complete(success);
        }

        RenderOutput {
            image,
            success,
            failures,
            stats,
        }
    }

    /// Render several requests concurrently, at most
    /// [`RenderConfig::concurrency`] at a time. Outputs are in input order.
    pub async fn render_many(&self, requests: &[(String, Formatting)]) -> Vec<RenderOutput> {
        let mut indexed: Vec<(usize, RenderOutput)> =
            stream::iter(requests.iter().enumerate().map(|(i, (markup, fmt))| async move {
                (i, self.render(markup, fmt).await)
            }))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, out)| out).collect()
    }

    /// Render and write the PNG to `path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn render_to_file(
        &self,
        markup: &str,
        formatting: &Formatting,
        path: impl AsRef<Path>,
    ) -> Result<RenderStats, TexRenderError> {
        let path = path.as_ref();
        let output = self.render(markup, formatting).await;
        let stats = output.stats.clone();
        let image = output.into_result()?;

        let write_err = |source: std::io::Error| TexRenderError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        output::write_atomic(path, &png).await.map_err(write_err)?;

        Ok(stats)
    }

    /// Synchronous wrapper around [`TexRenderer::render`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn render_sync(
        &self,
        markup: &str,
        formatting: &Formatting,
    ) -> Result<RenderOutput, TexRenderError> {
        Ok(tokio::runtime::Runtime::new()
            .map_err(|e| TexRenderError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.render(markup, formatting)))
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn callback(&self) -> Option<&dyn RenderProgressCallback> {
        self.config.progress_callback.as_deref()
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.process_timeout_secs)
    }

    /// Path of `name` as the locator resolves it.
    fn resolve(&self, name: &str) -> Result<PathBuf, StageFailure> {
        self.locator.require(name).map_err(|e| {
            warn!("{}", e);
            StageFailure::Spawn {
                program: name.to_string(),
                detail: e.to_string(),
            }
        })
    }

    fn stage_start(&self, stage: RenderStage) -> Instant {
        debug!("Stage {} started", stage);
        if let Some(cb) = self.callback() {
            cb.on_stage_start(stage);
        }
        Instant::now()
    }

    fn stage_done(&self, stage: RenderStage, started: Instant) {
        if let Some(cb) = self.callback() {
            cb.on_stage_complete(stage, elapsed_ms(started));
        }
    }

    /// Record `failure` against `stage`.
    fn record(&self, stage: RenderStage, failure: StageFailure, failures: &mut Vec<StageFailure>) {
        if let Some(cb) = self.callback() {
            cb.on_stage_failed(stage, &failure.to_string());
        }
        failures.push(failure);
    }

    /// Record a terminal failure; always `None`.
    fn abort(
        &self,
        stage: RenderStage,
        failure: StageFailure,
        failures: &mut Vec<StageFailure>,
    ) -> Option<DynamicImage> {
        self.record(stage, failure, failures);
        None
    }

    async fn run_stages(
        &self,
        markup: &str,
        formatting: &Formatting,
        failures: &mut Vec<StageFailure>,
        stats: &mut RenderStats,
    ) -> Option<DynamicImage> {
        let engine = self.config.engine;
        let timeout = self.timeout();

        // ── Step 1: Working file ─────────────────────────────────────────
        let started = self.stage_start(RenderStage::Assemble);
        if let Err(e) = formatting.validate() {
            let detail = match e {
                TexRenderError::InvalidConfig(detail) => detail,
                other => other.to_string(),
            };
            return self.abort(
                RenderStage::Assemble,
                StageFailure::InvalidFormatting { detail },
                failures,
            );
        }
        let dir = workspace::temp_dir(self.config.temp_dir.as_deref());
        let mut ws = match Workspace::create(&dir) {
            Ok(ws) => ws,
            Err(e) => {
                warn!("Couldn't create a temporary file in {}: {}", dir.display(), e);
                return self.abort(
                    RenderStage::Assemble,
                    StageFailure::TempFile {
                        detail: format!("{}: {}", dir.display(), e),
                    },
                    failures,
                );
            }
        };

        // ── Step 2: Document source ──────────────────────────────────────
        let source = match document::assemble(markup, formatting, engine) {
            Ok(s) => s,
            Err(e) => {
                let failure = match e {
                    TexRenderError::MissingEndDocument => StageFailure::MissingEndDocument,
                    other => StageFailure::Assembly {
                        detail: other.to_string(),
                    },
                };
                return self.abort(RenderStage::Assemble, failure, failures);
            }
        };
        if let Err(e) = ws.write_source(&source) {
            return self.abort(
                RenderStage::Assemble,
                StageFailure::TempFile {
                    detail: format!("{}: {}", ws.source_path().display(), e),
                },
                failures,
            );
        }
        self.stage_done(RenderStage::Assemble, started);

        // ── Step 3: Engine ───────────────────────────────────────────────
        let started = self.stage_start(RenderStage::Compile);
        let program = match self.resolve(engine.executable()) {
            Ok(p) => p,
            Err(f) => return self.abort(RenderStage::Compile, f, failures),
        };
        let compiled =
            compile::compile(self.runner.as_ref(), engine, &program, &ws, timeout).await;
        stats.engine_duration_ms = elapsed_ms(started);
        match compiled {
            Err(f) => return self.abort(RenderStage::Compile, f, failures),
            Ok(Some(f)) => self.record(RenderStage::Compile, f, failures),
            Ok(None) => self.stage_done(RenderStage::Compile, started),
        }

        // ── Step 4: DVI → PS (latex only) ────────────────────────────────
        let conversion_start = Instant::now();
        let raster_input = if engine.produces_dvi() {
            let started = self.stage_start(RenderStage::PostScript);
            let converted = match self.resolve(&self.config.dvips) {
                Ok(dvips) => {
                    let inv = rasterise::dvips_invocation(&dvips, &ws);
                    rasterise::run_conversion(self.runner.as_ref(), &inv, timeout).await
                }
                Err(f) => Err(f),
            };
            if let Err(f) = converted {
                stats.conversion_duration_ms = elapsed_ms(conversion_start);
                ws.remove(&[engine.output_extension()]);
                return self.abort(RenderStage::PostScript, f, failures);
            }
            self.stage_done(RenderStage::PostScript, started);
            "ps"
        } else {
            engine.output_extension()
        };

        // ── Step 5: → PNG ────────────────────────────────────────────────
        let started = self.stage_start(RenderStage::Rasterise);
        let converted = match self.resolve(&self.config.converter) {
            Ok(converter) => {
                let inv = rasterise::convert_invocation(
                    &converter,
                    &ws,
                    raster_input,
                    formatting.dpi,
                    self.locator.converter_env(),
                );
                rasterise::run_conversion(self.runner.as_ref(), &inv, timeout).await
            }
            Err(f) => Err(f),
        };
        stats.conversion_duration_ms = elapsed_ms(conversion_start);
        if let Err(f) = converted {
            ws.remove(&["pdf", "dvi", "ps"]);
            return self.abort(RenderStage::Rasterise, f, failures);
        }
        self.stage_done(RenderStage::Rasterise, started);

        // ── Step 6: Decode, final clean up ───────────────────────────────
        let started = self.stage_start(RenderStage::Decode);
        let decoded = decode::load_png(&ws.artifact("png"));
        ws.remove(&["png", "pdf", "dvi", "ps"]);
        match decoded {
            Ok(img) => {
                self.stage_done(RenderStage::Decode, started);
                Some(img)
            }
            Err(f) => self.abort(RenderStage::Decode, f, failures),
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Render with the engine configured in the default settings file.
///
/// # Errors
/// Only for an unreadable settings file or an unknown engine name; render
/// failures are reported through [`RenderOutput`].
pub async fn render(markup: &str, formatting: &Formatting) -> Result<RenderOutput, TexRenderError> {
    let store = SettingsStore::load_default()?;
    let renderer = TexRenderer::from_settings(&store)?;
    Ok(renderer.render(markup, formatting).await)
}

/// Synchronous wrapper around [`render`].
pub fn render_sync(markup: &str, formatting: &Formatting) -> Result<RenderOutput, TexRenderError> {
    let store = SettingsStore::load_default()?;
    TexRenderer::from_settings(&store)?.render_sync(markup, formatting)
}

/// Whether the toolchain for the configured engine is installed.
pub fn is_available() -> bool {
    match SettingsStore::load_default().and_then(|s| TexRenderer::from_settings(&s)) {
        Ok(renderer) => renderer.is_available(),
        Err(e) => {
            warn!("Cannot determine LaTeX engine: {}", e);
            false
        }
    }
}
