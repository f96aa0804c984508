//! Engine resolver: is the configured toolchain usable on this host?
//!
//! Checks run in a fixed order and stop at the first missing tool:
//!
//! 1. the configured engine (`pdflatex`, `xelatex`, `lualatex` or `latex`)
//! 2. the raster converter (`convert`)
//! 3. `dvips`, only for the DVI-producing `latex` engine
//! 4. Ghostscript, on platforms whose locator requires it
//!
//! Nothing here spawns a process; it is path lookups only.

use crate::config::{Engine, RenderConfig};
use crate::error::TexRenderError;
use crate::output::{ToolStatus, ToolchainReport};
use std::sync::Arc;
use tex_toolchain::ToolLocator;
use tracing::warn;

/// Pseudo tool name used for the Ghostscript check.
pub const GHOSTSCRIPT: &str = "ghostscript";

/// Availability check for one engine + tool-name configuration.
#[derive(Clone)]
pub struct EngineResolver {
    engine: Engine,
    converter: String,
    dvips: String,
    locator: Arc<dyn ToolLocator>,
}

impl EngineResolver {
    pub fn new(config: &RenderConfig, locator: Arc<dyn ToolLocator>) -> Self {
        Self {
            engine: config.engine,
            converter: config.converter.clone(),
            dvips: config.dvips.clone(),
            locator,
        }
    }

    /// The tools this configuration needs, in check order.
    pub fn required_tools(&self) -> Vec<String> {
        let mut tools = vec![self.engine.executable().to_string(), self.converter.clone()];
        if self.engine.produces_dvi() {
            tools.push(self.dvips.clone());
        }
        tools.push(GHOSTSCRIPT.to_string());
        tools
    }

    /// True when every required tool resolves.
    pub fn is_available(&self) -> bool {
        match self.check() {
            Ok(()) => true,
            Err(e) => {
                warn!("TeX rendering unavailable: {}", e);
                false
            }
        }
    }

    /// Like [`EngineResolver::is_available`], naming the first missing tool.
    pub fn check(&self) -> Result<(), TexRenderError> {
        for tool in self.required_tools() {
            if tool == GHOSTSCRIPT {
                if !self.locator.ghostscript_available() {
                    return Err(TexRenderError::ToolNotFound {
                        tool,
                        hint: "Install Ghostscript (gswin64c / gswin32c) so the converter can read PDF and PostScript.".into(),
                    });
                }
                continue;
            }
            if self.locator.find_executable(&tool).is_none() {
                return Err(TexRenderError::ToolNotFound {
                    hint: install_hint(&tool).to_string(),
                    tool,
                });
            }
        }
        Ok(())
    }

    /// Status of every tool relevant to any engine, for diagnostics.
    pub fn report(&self) -> ToolchainReport {
        let tools: Vec<ToolStatus> = Engine::ALL
            .iter()
            .map(|e| e.executable().to_string())
            .chain([self.converter.clone(), self.dvips.clone()])
            .map(|name| {
                let path = self.locator.find_executable(&name);
                ToolStatus {
                    required: self.required_tools().contains(&name),
                    name,
                    path,
                }
            })
            .collect();

        let ghostscript_available = self.locator.ghostscript_available();
        let missing = self.check().err().map(|e| e.to_string());
        ToolchainReport {
            engine: self.engine,
            available: missing.is_none(),
            ghostscript_available,
            first_problem: missing,
            tools,
        }
    }
}

fn install_hint(tool: &str) -> &'static str {
    match tool {
        "pdflatex" | "xelatex" | "lualatex" | "latex" | "dvips" => {
            "Install a TeX distribution (TeX Live, MiKTeX, MacTeX) and make sure its bin directory is on PATH."
        }
        "convert" | "magick" => "Install ImageMagick and make sure `convert` is on PATH.",
        _ => "Make sure the program is installed and on PATH.",
    }
}
