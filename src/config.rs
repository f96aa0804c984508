//! Configuration types for TeX rendering.
//!
//! Two structs split the knobs by lifetime:
//!
//! * [`Formatting`]: per-call typography (colour, size, family, DPI). Cheap
//!   to clone, serialisable, passed to every render.
//! * [`RenderConfig`]: per-renderer setup (engine, tool names, timeout,
//!   temp location), built via [`RenderConfigBuilder`] and validated once.

use crate::error::TexRenderError;
use crate::progress::RenderProgressCallback;
use crate::settings::SettingsStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

// ── Engine ───────────────────────────────────────────────────────────────

/// LaTeX-compatible typesetting program used to compile the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// `pdflatex`: TeX → PDF. (default)
    #[default]
    PdfLatex,
    /// `xelatex`: TeX → PDF with system fonts.
    XeLatex,
    /// `lualatex`: TeX → PDF with system fonts.
    LuaLatex,
    /// `latex`: TeX → DVI, then `dvips` → PS.
    Latex,
}

impl Engine {
    /// All engines in preference order for auto-detection.
    pub const ALL: [Engine; 4] = [
        Engine::PdfLatex,
        Engine::XeLatex,
        Engine::LuaLatex,
        Engine::Latex,
    ];

    /// Executable name looked up on the search path.
    pub fn executable(&self) -> &'static str {
        match self {
            Engine::PdfLatex => "pdflatex",
            Engine::XeLatex => "xelatex",
            Engine::LuaLatex => "lualatex",
            Engine::Latex => "latex",
        }
    }

    /// True for the plain `latex` engine, whose output is DVI.
    pub fn produces_dvi(&self) -> bool {
        matches!(self, Engine::Latex)
    }

    /// True for engines that can load system fonts via `fontspec`.
    pub fn supports_font_family(&self) -> bool {
        matches!(self, Engine::XeLatex | Engine::LuaLatex)
    }

    /// Extension of the file the engine writes next to the source.
    pub fn output_extension(&self) -> &'static str {
        if self.produces_dvi() {
            "dvi"
        } else {
            "pdf"
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.executable())
    }
}

impl FromStr for Engine {
    type Err = TexRenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdflatex" => Ok(Engine::PdfLatex),
            "xelatex" => Ok(Engine::XeLatex),
            "lualatex" => Ok(Engine::LuaLatex),
            "latex" => Ok(Engine::Latex),
            other => Err(TexRenderError::InvalidConfig(format!(
                "Unknown LaTeX engine '{other}' (expected pdflatex, xelatex, lualatex or latex)"
            ))),
        }
    }
}

// ── Colour ───────────────────────────────────────────────────────────────

/// Font colour as an 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FontColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl FontColor {
    pub const BLACK: FontColor = FontColor::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn red_f(&self) -> f64 {
        f64::from(self.r) / 255.0
    }

    pub fn green_f(&self) -> f64 {
        f64::from(self.g) / 255.0
    }

    pub fn blue_f(&self) -> f64 {
        f64::from(self.b) / 255.0
    }
}

impl fmt::Display for FontColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for FontColor {
    type Err = TexRenderError;

    /// Parse `#rrggbb` or `rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || TexRenderError::InvalidConfig(format!("Invalid colour '{s}', expected #rrggbb"));
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

// ── Formatting ───────────────────────────────────────────────────────────

/// Typography applied to a single render call.
///
/// # Example
/// ```rust
/// use texrender::{FontColor, Formatting};
///
/// let fmt = Formatting {
///     font_color: FontColor::rgb(200, 0, 0),
///     font_size: 14,
///     dpi: 300,
///     ..Formatting::default()
/// };
/// assert!(fmt.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formatting {
    /// Colour applied via `\definecolor{fontcolor}`. Default: black.
    pub font_color: FontColor,
    /// Point size for `\fontsize{N}{N}`. Default: 12.
    pub font_size: u32,
    /// Main font family, honoured by `xelatex`/`lualatex` only.
    pub font_family: Option<String>,
    /// Raster density passed to the converter. Default: 150.
    pub dpi: u32,
}

impl Default for Formatting {
    fn default() -> Self {
        Self {
            font_color: FontColor::BLACK,
            font_size: 12,
            font_family: None,
            dpi: 150,
        }
    }
}

impl Formatting {
    pub const MIN_DPI: u32 = 10;
    pub const MAX_DPI: u32 = 2400;

    /// Check size and density bounds.
    pub fn validate(&self) -> Result<(), TexRenderError> {
        if self.dpi < Self::MIN_DPI || self.dpi > Self::MAX_DPI {
            return Err(TexRenderError::InvalidConfig(format!(
                "DPI must be {}–{}, got {}",
                Self::MIN_DPI,
                Self::MAX_DPI,
                self.dpi
            )));
        }
        if self.font_size == 0 {
            return Err(TexRenderError::InvalidConfig(
                "Font size must be ≥ 1".into(),
            ));
        }
        Ok(())
    }

    /// The font family if one is set and non-empty.
    pub fn family(&self) -> Option<&str> {
        self.font_family.as_deref().filter(|f| !f.trim().is_empty())
    }
}

// ── RenderConfig ─────────────────────────────────────────────────────────

/// Configuration for a [`crate::TexRenderer`].
///
/// # Example
/// ```rust
/// use texrender::{Engine, RenderConfig};
///
/// let config = RenderConfig::builder()
///     .engine(Engine::XeLatex)
///     .process_timeout_secs(60)
///     .build()
///     .unwrap();
/// assert_eq!(config.engine, Engine::XeLatex);
/// ```
#[derive(Clone)]
pub struct RenderConfig {
    /// Typesetting engine. Default: [`Engine::PdfLatex`].
    pub engine: Engine,

    /// Raster converter executable (ImageMagick). Default: `convert`.
    pub converter: String,

    /// DVI → PostScript executable. Default: `dvips`.
    pub dvips: String,

    /// Bounded wait for each external process, in seconds. Default: 30.
    pub process_timeout_secs: u64,

    /// Directory for intermediate files. `None` picks `/dev/shm` when present,
    /// else the platform temp dir.
    pub temp_dir: Option<PathBuf>,

    /// Maximum renders in flight for [`crate::TexRenderer::render_many`]. Default: 4.
    pub concurrency: usize,

    /// Optional stage-progress observer.
    pub progress_callback: Option<Arc<dyn RenderProgressCallback>>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            converter: "convert".to_string(),
            dvips: "dvips".to_string(),
            process_timeout_secs: 30,
            temp_dir: None,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("engine", &self.engine)
            .field("converter", &self.converter)
            .field("dvips", &self.dvips)
            .field("process_timeout_secs", &self.process_timeout_secs)
            .field("temp_dir", &self.temp_dir)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RenderProgressCallback>"),
            )
            .finish()
    }
}

impl RenderConfig {
    /// Create a new builder for `RenderConfig`.
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
            engine_name: None,
        }
    }

    /// Builder seeded with the engine stored under
    /// `Settings_Worksheet/LaTeXEngine`.
    pub fn from_settings(store: &SettingsStore) -> RenderConfigBuilder {
        let mut builder = Self::builder();
        builder.engine_name = Some(store.latex_engine());
        builder
    }
}

/// Builder for [`RenderConfig`].
pub struct RenderConfigBuilder {
    config: RenderConfig,
    /// Unparsed engine name; validated in `build()`.
    engine_name: Option<String>,
}

impl fmt::Debug for RenderConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfigBuilder")
            .field("config", &self.config)
            .field("engine_name", &self.engine_name)
            .finish()
    }
}

impl RenderConfigBuilder {
    pub fn engine(mut self, engine: Engine) -> Self {
        self.config.engine = engine;
        self.engine_name = None;
        self
    }

    /// Set the engine by executable name; unknown names fail in `build()`.
    pub fn engine_name(mut self, name: impl Into<String>) -> Self {
        self.engine_name = Some(name.into());
        self
    }

    pub fn converter(mut self, exe: impl Into<String>) -> Self {
        self.config.converter = exe.into();
        self
    }

    pub fn dvips(mut self, exe: impl Into<String>) -> Self {
        self.config.dvips = exe.into();
        self
    }

    pub fn process_timeout_secs(mut self, secs: u64) -> Self {
        self.config.process_timeout_secs = secs.max(1);
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn RenderProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<RenderConfig, TexRenderError> {
        if let Some(name) = self.engine_name.take() {
            self.config.engine = name.parse()?;
        }
        let c = &self.config;
        if c.converter.trim().is_empty() {
            return Err(TexRenderError::InvalidConfig(
                "Converter executable name is empty".into(),
            ));
        }
        if c.dvips.trim().is_empty() {
            return Err(TexRenderError::InvalidConfig(
                "dvips executable name is empty".into(),
            ));
        }
        if let Some(ref dir) = c.temp_dir {
            if !dir.is_dir() {
                return Err(TexRenderError::InvalidConfig(format!(
                    "Temp dir '{}' is not a directory",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}
