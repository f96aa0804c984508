//! # tex-toolchain
//!
//! Find the external programs a LaTeX-to-bitmap pipeline shells out to:
//! the typesetting engine (`pdflatex`, `xelatex`, `lualatex`, `latex`),
//! `dvips`, ImageMagick's `convert` and, on Windows, Ghostscript.
//!
//! ## How it works
//!
//! [`SystemLocator`] walks a search path built from:
//!
//! 1. `TEXRENDER_EXTRA_PATH`: extra directories searched first (same
//!    separator rules as `PATH`).
//! 2. `PATH`.
//!
//! On Windows every candidate is also tried with each `PATHEXT` extension,
//! and Ghostscript counts as installed when either its console binary is on
//! the search path or a `gs` directory exists below `%PROGRAMFILES%`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tex_toolchain::{SystemLocator, ToolLocator};
//!
//! let locator = SystemLocator::new();
//! if let Some(path) = locator.find_executable("pdflatex") {
//!     println!("pdflatex at {}", path.display());
//! }
//! let gs_ok = locator.ghostscript_available();
//! ```
//!
//! ## Platform support
//!
//! | OS      | Arch            | Ghostscript lookup                             |
//! |---------|-----------------|------------------------------------------------|
//! | Windows | x86_64, aarch64 | `gswin64c`, `%PROGRAMFILES%\gs`, `%PROGRAMFILES(X86)%\gs` |
//! | Windows | x86             | `gswin32c`, `%PROGRAMFILES%\gs`                |
//! | other   | any             | none (ImageMagick finds `gs` itself)           |

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Directories listed here are searched before `PATH`.
pub const EXTRA_PATH_ENV: &str = "TEXRENDER_EXTRA_PATH";

/// Environment variable ImageMagick reads to find its coder modules.
pub const MAGICK_MODULE_ENV: &str = "MAGICK_CODER_MODULE_PATH";

/// Directory below `%PROGRAMFILES%` holding the bundled ImageMagick coders.
const MAGICK_MODULE_SUBDIR: &str = "texrender";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by tex-toolchain lookups.
#[derive(Error, Debug)]
pub enum ToolchainError {
    /// The named executable is not on the search path.
    #[error("Program '{tool}' not found in {searched} search directories")]
    NotFound { tool: String, searched: usize },

    /// Ghostscript is required on this platform but no installation was found.
    #[error("Ghostscript not found (looked for {candidates})")]
    GhostscriptMissing { candidates: String },
}

// ── Platform metadata ────────────────────────────────────────────────────────

/// Per-platform knowledge about where the conversion helpers live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Ghostscript console executables to try. Empty when no lookup is needed.
    pub ghostscript_executables: &'static [&'static str],
    /// Environment variables naming "Program Files" style roots that may
    /// contain a `gs` install directory.
    pub program_files_vars: &'static [&'static str],
    /// Whether `convert` needs [`MAGICK_MODULE_ENV`] pointed at the install dir.
    pub needs_magick_module_path: bool,
    /// Whether executable names are completed with `PATHEXT` extensions.
    pub uses_pathext: bool,
}

impl PlatformInfo {
    /// Platform info for an explicit `(os, arch)` pair as reported by
    /// [`std::env::consts`].
    pub fn for_target(os: &str, arch: &str) -> Self {
        match (os, arch) {
            ("windows", "x86_64") | ("windows", "aarch64") => Self {
                ghostscript_executables: &["gswin64c"],
                program_files_vars: &["PROGRAMFILES", "PROGRAMFILES(X86)"],
                needs_magick_module_path: true,
                uses_pathext: true,
            },
            ("windows", _) => Self {
                ghostscript_executables: &["gswin32c"],
                program_files_vars: &["PROGRAMFILES"],
                needs_magick_module_path: true,
                uses_pathext: true,
            },
            _ => Self {
                ghostscript_executables: &[],
                program_files_vars: &[],
                needs_magick_module_path: false,
                uses_pathext: false,
            },
        }
    }

    /// Platform info for the running host.
    pub fn current() -> Self {
        Self::for_target(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// True when this platform needs an explicit Ghostscript lookup.
    pub fn requires_ghostscript(&self) -> bool {
        !self.ghostscript_executables.is_empty()
    }
}

// ── Locator capability ───────────────────────────────────────────────────────

/// Resolves external tools by name.
///
/// The rendering pipeline only talks to this trait so tests can swap in a
/// fake that reports any toolchain they like.
pub trait ToolLocator: Send + Sync {
    /// Full path of `name` if it resolves to an executable.
    fn find_executable(&self, name: &str) -> Option<PathBuf>;

    /// Whether Ghostscript is usable for PostScript/PDF rasterisation.
    fn ghostscript_available(&self) -> bool;

    /// Extra environment for the raster converter subprocess.
    fn converter_env(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Like [`ToolLocator::find_executable`] but with a descriptive error.
    fn require(&self, name: &str) -> Result<PathBuf, ToolchainError> {
        self.find_executable(name)
            .ok_or_else(|| ToolchainError::NotFound {
                tool: name.to_string(),
                searched: 0,
            })
    }
}

/// Locator backed by the host file system and environment.
#[derive(Debug, Clone)]
pub struct SystemLocator {
    platform: PlatformInfo,
    search_dirs: Vec<PathBuf>,
    pathext: Vec<String>,
}

impl Default for SystemLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemLocator {
    /// Build a locator from `TEXRENDER_EXTRA_PATH`, `PATH` and (on Windows)
    /// `PATHEXT` as they are right now.
    pub fn new() -> Self {
        let mut search_dirs = Vec::new();
        for var in [EXTRA_PATH_ENV, "PATH"] {
            if let Some(value) = std::env::var_os(var) {
                search_dirs.extend(std::env::split_paths(&value));
            }
        }
        Self::with_search_path(PlatformInfo::current(), search_dirs)
    }

    /// Build a locator over an explicit directory list.
    pub fn with_search_path(platform: PlatformInfo, search_dirs: Vec<PathBuf>) -> Self {
        let pathext = if platform.uses_pathext {
            std::env::var("PATHEXT")
                .unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string())
                .split(';')
                .filter(|e| !e.is_empty())
                .map(|e| e.to_ascii_lowercase())
                .collect()
        } else {
            Vec::new()
        };
        let search_dirs = search_dirs
            .into_iter()
            .filter(|d| !d.as_os_str().is_empty())
            .collect();
        Self {
            platform,
            search_dirs,
            pathext,
        }
    }

    /// The platform this locator was configured for.
    pub fn platform(&self) -> &PlatformInfo {
        &self.platform
    }

    /// Directories searched, in order.
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    fn candidates(&self, name: &str) -> Vec<OsString> {
        let mut names = vec![OsString::from(name)];
        if Path::new(name).extension().is_none() {
            for ext in &self.pathext {
                names.push(OsString::from(format!("{name}{ext}")));
            }
        }
        names
    }

    fn program_files_dirs(&self) -> Vec<PathBuf> {
        self.platform
            .program_files_vars
            .iter()
            .filter_map(|var| std::env::var_os(var))
            .map(PathBuf::from)
            .collect()
    }
}

impl ToolLocator for SystemLocator {
    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }

        // A name with a directory component is checked as-is.
        let as_path = Path::new(name);
        if as_path.components().count() > 1 {
            return is_executable(as_path).then(|| as_path.to_path_buf());
        }

        let candidates = self.candidates(name);
        self.search_dirs.iter().find_map(|dir| {
            candidates
                .iter()
                .map(|c| dir.join(c))
                .find(|p| is_executable(p))
        })
    }

    fn ghostscript_available(&self) -> bool {
        if !self.platform.requires_ghostscript() {
            return true;
        }
        if self
            .platform
            .ghostscript_executables
            .iter()
            .any(|exe| self.find_executable(exe).is_some())
        {
            return true;
        }
        self.program_files_dirs()
            .iter()
            .any(|root| root.join("gs").is_dir())
    }

    fn converter_env(&self) -> Vec<(String, String)> {
        if !self.platform.needs_magick_module_path {
            return Vec::new();
        }
        match std::env::var("PROGRAMFILES") {
            Ok(root) if !root.is_empty() => vec![(
                MAGICK_MODULE_ENV.to_string(),
                format!("{root}\\{MAGICK_MODULE_SUBDIR}"),
            )],
            _ => Vec::new(),
        }
    }

    fn require(&self, name: &str) -> Result<PathBuf, ToolchainError> {
        if name == "ghostscript" {
            return if self.ghostscript_available() {
                Ok(PathBuf::new())
            } else {
                Err(ToolchainError::GhostscriptMissing {
                    candidates: self.platform.ghostscript_executables.join(", "),
                })
            };
        }
        self.find_executable(name)
            .ok_or_else(|| ToolchainError::NotFound {
                tool: name.to_string(),
                searched: self.search_dirs.len(),
            })
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────────

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn unix_platform() -> PlatformInfo {
        PlatformInfo::for_target("linux", "x86_64")
    }

    #[cfg(unix)]
    fn make_exe(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let p = dir.join(name);
        std::fs::write(&p, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&p, std::fs::Permissions::from_mode(0o755)).unwrap();
        p
    }

    #[test]
    fn windows_64_looks_for_gswin64c() {
        let info = PlatformInfo::for_target("windows", "x86_64");
        assert_eq!(info.ghostscript_executables, &["gswin64c"]);
        assert!(info.program_files_vars.contains(&"PROGRAMFILES(X86)"));
        assert!(info.requires_ghostscript());
        assert!(info.needs_magick_module_path);
    }

    #[test]
    fn windows_32_looks_for_gswin32c() {
        let info = PlatformInfo::for_target("windows", "x86");
        assert_eq!(info.ghostscript_executables, &["gswin32c"]);
        assert_eq!(info.program_files_vars, &["PROGRAMFILES"]);
    }

    #[test]
    fn unix_needs_no_ghostscript_lookup() {
        let info = unix_platform();
        assert!(!info.requires_ghostscript());
        let locator = SystemLocator::with_search_path(info, vec![]);
        assert!(locator.ghostscript_available());
        assert!(locator.converter_env().is_empty());
    }

    #[test]
    fn empty_name_is_never_found() {
        let locator = SystemLocator::with_search_path(unix_platform(), vec![]);
        assert!(locator.find_executable("").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn finds_executable_in_search_dir() {
        let dir = tempfile::tempdir().unwrap();
        let exe = make_exe(dir.path(), "pdflatex");
        let locator =
            SystemLocator::with_search_path(unix_platform(), vec![dir.path().to_path_buf()]);
        assert_eq!(locator.find_executable("pdflatex"), Some(exe));
        assert!(locator.find_executable("xelatex").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn first_search_dir_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let expected = make_exe(first.path(), "convert");
        make_exe(second.path(), "convert");
        let locator = SystemLocator::with_search_path(
            unix_platform(),
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
        );
        assert_eq!(locator.find_executable("convert"), Some(expected));
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dvips"), "not a program").unwrap();
        let locator =
            SystemLocator::with_search_path(unix_platform(), vec![dir.path().to_path_buf()]);
        assert!(locator.find_executable("dvips").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn absolute_path_is_checked_directly() {
        let dir = tempfile::tempdir().unwrap();
        let exe = make_exe(dir.path(), "lualatex");
        let locator = SystemLocator::with_search_path(unix_platform(), vec![]);
        let name = exe.to_str().unwrap();
        assert_eq!(locator.find_executable(name), Some(exe.clone()));
    }

    #[test]
    fn require_reports_missing_tool() {
        let locator = SystemLocator::with_search_path(unix_platform(), vec![]);
        let err = locator.require("latex").unwrap_err();
        assert!(err.to_string().contains("latex"), "got: {err}");
    }

    #[test]
    fn windows_without_gs_reports_missing_ghostscript() {
        let info = PlatformInfo::for_target("windows", "x86");
        let locator = SystemLocator::with_search_path(info, vec![]);
        // No search dirs; only passes if a real %PROGRAMFILES%\gs exists.
        if std::env::var_os("PROGRAMFILES").is_none() {
            assert!(!locator.ghostscript_available());
            assert!(matches!(
                locator.require("ghostscript"),
                Err(ToolchainError::GhostscriptMissing { .. })
            ));
        }
    }
}
