//! Engine stage: run the LaTeX engine on the workspace source.
//!
//! The engine runs in batch mode with the workspace directory as its working
//! directory and the bare source file name as its argument, so its `.aux`,
//! `.log` and `.pdf`/`.dvi` land next to the source. `.aux` and `.log` are removed before this stage returns, whatever
//! the outcome.
//!
//! A nonzero exit is recorded but does not stop the pipeline. LaTeX exits
//! nonzero on many recoverable errors and still writes usable output, so the
//! caller goes on to convert whatever was produced.

use crate::config::Engine;
use crate::error::StageFailure;
use crate::pipeline::workspace::Workspace;
use crate::process::{Invocation, ProcessOutcome, ProcessRunner};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// TeX error lines start with `! `.
static TEX_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^! (.+)$").unwrap());

/// Diagnostics kept per failed compile.
const MAX_DIAGNOSTICS: usize = 5;

/// Scratch files the engine leaves next to its output.
const ENGINE_SCRATCH: &[&str] = &["aux", "log"];

/// Build the engine invocation for the resolved engine `program`.
pub fn invocation(program: &Path, ws: &Workspace) -> Invocation {
    Invocation::new(program.to_string_lossy(), ws.dir())
        .arg("-interaction=batchmode")
        .arg(ws.file_name("tex"))
}

/// Run the engine.
///
/// * `Ok(None)`: exit code 0.
/// * `Ok(Some(EngineExit))`: nonzero exit; the caller should still convert.
/// * `Err(_)`: the engine could not start or timed out; stop here.
pub async fn compile(
    runner: &dyn ProcessRunner,
    engine: Engine,
    program: &Path,
    ws: &Workspace,
    timeout: Duration,
) -> Result<Option<StageFailure>, StageFailure> {
    let inv = invocation(program, ws);
    let outcome = runner.run(&inv, timeout).await;

    let result = match outcome {
        Err(e) => {
            warn!("{} could not be started: {}", engine, e);
            Err(StageFailure::Spawn {
                program: engine.executable().to_string(),
                detail: e.to_string(),
            })
        }
        Ok(ProcessOutcome::TimedOut) => {
            warn!("{} process did not finish within {:?}", engine, timeout);
            Err(StageFailure::EngineTimeout {
                engine: engine.executable().to_string(),
                secs: timeout.as_secs(),
            })
        }
        Ok(outcome) if outcome.is_success() => {
            info!("{} finished", engine);
            Ok(None)
        }
        Ok(ProcessOutcome::Exited { code, .. }) => {
            let diagnostics = read_diagnostics(ws);
            warn!("{} exit code = {:?}", engine, code);
            for line in &diagnostics {
                debug!("{}: {}", engine, line);
            }
            Ok(Some(StageFailure::EngineExit {
                engine: engine.executable().to_string(),
                code,
                diagnostics,
            }))
        }
    };

    ws.remove(ENGINE_SCRATCH);
    result
}

/// Error lines from the engine log, if it wrote one.
fn read_diagnostics(ws: &Workspace) -> Vec<String> {
    match std::fs::read(ws.artifact("log")) {
        Ok(bytes) => extract_errors(&String::from_utf8_lossy(&bytes)),
        Err(_) => Vec::new(),
    }
}

/// Pull up to [`MAX_DIAGNOSTICS`] `! ...` lines out of a TeX log.
pub fn extract_errors(log: &str) -> Vec<String> {
    TEX_ERROR
        .captures_iter(log)
        .filter_map(|c| c.get(1))
        .map(|m| format!("! {}", m.as_str().trim_end()))
        .take(MAX_DIAGNOSTICS)
        .collect()
}
