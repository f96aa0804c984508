//! CLI binary for texrender.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RenderConfig` / `Formatting` and writes PNG files.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use texrender::{
    FontColor, Formatting, ProgressCallback, RenderConfig, RenderOutput, RenderProgressCallback,
    RenderStage, SettingsStore, TexRenderer, ToolchainReport,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

/// Shorten `s` to `max` chars for one-line display.
fn ellipsize(s: &str, max: usize) -> String {
    let one_line = s.replace('\n', " ");
    if one_line.chars().count() > max {
        let head: String = one_line.chars().take(max.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    } else {
        one_line
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the current stage, plus one
/// log line per finished render. Renders may complete out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    done: AtomicUsize,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  {pos}/{len}  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Rendering");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            done: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        let total = self.done.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} rendered successfully", green("✔"), bold(&total.to_string()));
        } else {
            eprintln!(
                "{} {}/{} rendered  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&(total - failed).to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

impl RenderProgressCallback for CliProgressCallback {
    fn on_render_start(&self, markup: &str) {
        self.bar.set_message(ellipsize(markup, 40));
    }

    fn on_stage_start(&self, stage: RenderStage) {
        self.bar.set_prefix(stage.to_string());
    }

    fn on_stage_failed(&self, stage: RenderStage, error: &str) {
        self.bar
            .println(format!("  {} {:<9} {}", red("✗"), stage, red(&ellipsize(error, 80))));
    }

    fn on_render_complete(&self, success: bool) {
        self.done.fetch_add(1, Ordering::SeqCst);
        if !success {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render one formula to formula.png
  texrender 'E=mc^2'

  # Blue, 24 pt, 300 DPI, to a chosen file
  texrender --color '#2040a0' --font-size 24 --dpi 300 -o euler.png 'e^{i\pi}+1=0'

  # Complete document from a file (or '-' for stdin)
  texrender -f label.tex -o label.png

  # Several formulas into a directory (formula-1.png, formula-2.png, …)
  texrender -o out/ 'a^2+b^2=c^2' '\sum_{k=1}^n k'

  # Check the installed toolchain
  texrender --check --engine latex

  # Show the LaTeX source that would be compiled
  texrender --print-document --engine xelatex --font-family 'Linux Libertine O' 'x'

ENGINES:
  Engine      Output  Font family  Needs
  ─────────   ──────  ───────────  ─────────────────────────────
  pdflatex    PDF     no           convert, ghostscript (default)
  xelatex     PDF     yes          convert, ghostscript
  lualatex    PDF     yes          convert, ghostscript
  latex       DVI     no           dvips, convert, ghostscript

ENVIRONMENT VARIABLES:
  TEXRENDER_SETTINGS      Settings file (default <config dir>/texrender/settings.toml)
  TEXRENDER_ENGINE        Override the engine from the settings file
  TEXRENDER_EXTRA_PATH    Extra directories searched before PATH
  RUST_LOG                Log filter (overrides -v / -q)
"#;

/// Render LaTeX formulas and documents to PNG.
#[derive(Parser, Debug)]
#[command(
    name = "texrender",
    version,
    about = "Render LaTeX formulas and documents to PNG",
    long_about = "Render LaTeX markup to PNG by running an installed TeX engine \
(pdflatex, xelatex, lualatex or latex) and ImageMagick. Bare formulas are wrapped in a \
standalone document; complete documents are compiled with the formatting preamble injected.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// LaTeX markup: a bare formula or a complete document.
    markup: Vec<String>,

    /// Read markup from a file ('-' for stdin).
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Output PNG, or directory when rendering several inputs.
    #[arg(short, long, env = "TEXRENDER_OUTPUT")]
    output: Option<PathBuf>,

    /// Engine: pdflatex, xelatex, lualatex, latex. Default: from settings.
    #[arg(long, env = "TEXRENDER_ENGINE")]
    engine: Option<String>,

    /// Raster density (10–2400).
    #[arg(long, env = "TEXRENDER_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(10..=2400))]
    dpi: u32,

    /// Font size in points.
    #[arg(long, env = "TEXRENDER_FONT_SIZE", default_value_t = 12,
          value_parser = clap::value_parser!(u32).range(1..))]
    font_size: u32,

    /// Main font family (xelatex / lualatex only).
    #[arg(long, env = "TEXRENDER_FONT_FAMILY")]
    font_family: Option<String>,

    /// Text colour as #rrggbb.
    #[arg(long, env = "TEXRENDER_COLOR", default_value = "#000000")]
    color: String,

    /// Bounded wait per external process, in seconds.
    #[arg(long, env = "TEXRENDER_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Directory for intermediate files.
    #[arg(long, env = "TEXRENDER_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Settings file to read the engine from.
    #[arg(long, env = "TEXRENDER_SETTINGS")]
    settings: Option<PathBuf>,

    /// Maximum concurrent renders.
    #[arg(short, long, env = "TEXRENDER_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Report toolchain availability and exit.
    #[arg(long)]
    check: bool,

    /// Print the assembled LaTeX source instead of rendering.
    #[arg(long)]
    print_document: bool,

    /// Print a JSON summary (with base64 PNG) per render instead of writing files.
    #[arg(long, env = "TEXRENDER_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "TEXRENDER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TEXRENDER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TEXRENDER_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level library logs unless -v is given.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && !cli.check && !cli.print_document;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let inputs = collect_inputs(&cli)?;
    let formatting = build_formatting(&cli)?;

    let progress: Option<Arc<CliProgressCallback>> = if show_progress && !inputs.is_empty() {
        Some(CliProgressCallback::new(inputs.len()))
    } else {
        None
    };
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as ProgressCallback),
    )?;
    let renderer = TexRenderer::new(config);

    // ── Check mode ───────────────────────────────────────────────────────
    if cli.check {
        let report = renderer.toolchain_report();
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?
            );
        } else {
            print_report(&report);
        }
        if !report.available {
            std::process::exit(1);
        }
        return Ok(());
    }

    if inputs.is_empty() {
        anyhow::bail!("No markup given. Pass a formula, or -f FILE (see --help)");
    }

    // ── Print-document mode ──────────────────────────────────────────────
    if cli.print_document {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for markup in &inputs {
            let source = renderer
                .document_source(markup, &formatting)
                .context("Failed to assemble document")?;
            handle
                .write_all(source.as_bytes())
                .context("Failed to write to stdout")?;
            handle.write_all(b"\n").ok();
        }
        return Ok(());
    }

    // ── Render ───────────────────────────────────────────────────────────
    let requests: Vec<(String, Formatting)> = inputs
        .into_iter()
        .map(|m| (m, formatting.clone()))
        .collect();
    let outputs = renderer.render_many(&requests).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }

    let failed = outputs.iter().filter(|o| !o.success).count();

    if cli.json {
        for output in &outputs {
            let summary = output.summary().context("Failed to encode PNG")?;
            println!(
                "{}",
                serde_json::to_string(&summary).context("Failed to serialise output")?
            );
        }
    } else {
        let targets = output_paths(cli.output.as_deref(), outputs.len());
        for (output, path) in outputs.iter().zip(&targets) {
            write_output(output, path, cli.quiet).await?;
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} renders failed", failed, outputs.len());
    }
    Ok(())
}

/// Positional markup plus `--file`, in that order.
fn collect_inputs(cli: &Cli) -> Result<Vec<String>> {
    let mut inputs = cli.markup.clone();
    if let Some(ref path) = cli.file {
        let text = if path.as_os_str() == "-" {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read markup from stdin")?;
            buf
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read markup from {:?}", path))?
        };
        inputs.push(text);
    }
    Ok(inputs)
}

fn build_formatting(cli: &Cli) -> Result<Formatting> {
    let font_color: FontColor = cli.color.parse().context("Invalid --color")?;
    let formatting = Formatting {
        font_color,
        font_size: cli.font_size,
        font_family: cli.font_family.clone(),
        dpi: cli.dpi,
    };
    formatting.validate().context("Invalid formatting")?;
    Ok(formatting)
}

/// Map CLI args and the settings file to `RenderConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RenderConfig> {
    let store = match cli.settings {
        Some(ref path) => SettingsStore::load_from_file(path),
        None => SettingsStore::load_default(),
    }
    .context("Failed to load settings")?;

    let mut builder = RenderConfig::from_settings(&store)
        .process_timeout_secs(cli.timeout)
        .concurrency(cli.concurrency);

    if let Some(ref engine) = cli.engine {
        builder = builder.engine_name(engine.clone());
    }
    if let Some(ref dir) = cli.temp_dir {
        builder = builder.temp_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// One path per render: `-o` (default `formula.png`) for a single input,
/// `<dir>/formula-N.png` for several.
fn output_paths(output: Option<&Path>, count: usize) -> Vec<PathBuf> {
    if count == 1 {
        return vec![output.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("formula.png"))];
    }
    let dir = output.unwrap_or_else(|| Path::new("."));
    (1..=count)
        .map(|i| dir.join(format!("formula-{i}.png")))
        .collect()
}

/// Write the image atomically (temp file + rename) and log the outcome.
async fn write_output(output: &RenderOutput, path: &Path, quiet: bool) -> Result<()> {
    let Some(png) = output.to_png_bytes() else {
        if !quiet {
            eprintln!("{} {}  no image", red("✘"), path.display());
            for failure in &output.failures {
                eprintln!("   {}", dim(&failure.to_string()));
            }
        }
        return Ok(());
    };
    let png = png.context("Failed to encode PNG")?;

    texrender::output::write_atomic(path, &png)
        .await
        .with_context(|| format!("Failed to write {:?}", path))?;

    if !quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {}x{} px  {}ms  →  {}",
            if output.success { green("✔") } else { cyan("⚠") },
            stats.width,
            stats.height,
            stats.total_duration_ms,
            bold(&path.display().to_string()),
        );
        for failure in &output.failures {
            eprintln!("   {}", dim(&failure.to_string()));
        }
    }
    Ok(())
}

fn print_report(report: &ToolchainReport) {
    println!("Engine:       {}", report.engine);
    for tool in &report.tools {
        let mark = match (&tool.path, tool.required) {
            (Some(_), _) => green("✓"),
            (None, true) => red("✗"),
            (None, false) => dim("-"),
        };
        let location = tool
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "not found".to_string());
        println!("  {} {:<10} {}", mark, tool.name, dim(&location));
    }
    println!(
        "Ghostscript:  {}",
        if report.ghostscript_available { green("found") } else { red("missing") }
    );
    match report.first_problem {
        Some(ref problem) => println!("{} {}", red("✘"), problem),
        None => println!("{} toolchain available", green("✔")),
    }
}
