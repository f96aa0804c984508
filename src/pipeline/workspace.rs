//! Per-render working files.
//!
//! Each render owns one [`Workspace`]: a uniquely named `texrender_XXXXXX.tex`
//! source plus every sibling the tools derive from its stem (`.aux`, `.log`,
//! `.pdf`, `.dvi`, `.ps`, `.png`). Unique stems keep concurrent renders in
//! the same directory apart without any locking.
//!
//! Dropping the workspace removes the source and every `<stem>.*` file in
//! the directory, so no exit path (early return, error, panic) leaves
//! artifacts behind.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const SHM_DIR: &str = "/dev/shm";
const FILE_PREFIX: &str = "texrender_";

static SHM_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Directory for intermediate files: `preferred` if given, else the
/// in-memory `/dev/shm` when present, else the platform temp dir.
pub fn temp_dir(preferred: Option<&Path>) -> PathBuf {
    if let Some(dir) = preferred {
        return dir.to_path_buf();
    }
    let shm = *SHM_AVAILABLE.get_or_init(|| cfg!(target_os = "linux") && Path::new(SHM_DIR).is_dir());
    if shm {
        PathBuf::from(SHM_DIR)
    } else {
        std::env::temp_dir()
    }
}

/// Scoped owner of one render's intermediate files.
#[derive(Debug)]
pub struct Workspace {
    source: NamedTempFile,
    dir: PathBuf,
    stem: String,
}

impl Workspace {
    /// Create a uniquely named empty `.tex` file in `dir`.
    pub fn create(dir: &Path) -> std::io::Result<Self> {
        let source = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(".tex")
            .tempfile_in(dir)?;
        let stem = source
            .path()
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| std::io::Error::other("temp file name is not valid UTF-8"))?;
        debug!("Workspace {} in {}", stem, dir.display());
        Ok(Self {
            source,
            dir: dir.to_path_buf(),
            stem,
        })
    }

    /// Write the document source and flush it to disk.
    pub fn write_source(&mut self, text: &str) -> std::io::Result<()> {
        let file = self.source.as_file_mut();
        file.write_all(text.as_bytes())?;
        file.flush()?;
        file.sync_data()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn source_path(&self) -> &Path {
        self.source.path()
    }

    /// `<stem>.<ext>` as a bare file name, the form the tools are given.
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}.{}", self.stem, ext)
    }

    /// Absolute path of the `<stem>.<ext>` sibling.
    pub fn artifact(&self, ext: &str) -> PathBuf {
        self.dir.join(self.file_name(ext))
    }

    /// Remove the listed siblings if present.
    pub fn remove(&self, exts: &[&str]) {
        for ext in exts {
            remove_quietly(&self.artifact(ext));
        }
    }

    /// Every `<stem>.*` file in the directory except the source.
    fn leftovers(&self) -> Vec<PathBuf> {
        let prefix = format!("{}.", self.stem);
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_str().is_some_and(|n| n.starts_with(&prefix)))
            .map(|e| e.path())
            .filter(|p| p != self.source.path())
            .collect()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        for path in self.leftovers() {
            remove_quietly(&path);
        }
        // `NamedTempFile` removes the source itself.
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}
