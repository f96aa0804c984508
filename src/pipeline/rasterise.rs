//! Conversion stages: DVI → PS (`dvips`) and PDF/PS → PNG (raster converter).
//!
//! Both run in the workspace directory on bare `<stem>.<ext>` names. A stage
//! fails when its program cannot start, outlives the bounded wait, or exits
//! nonzero; cleaning up the inputs is left to the caller, which knows which
//! artifacts exist at that point.

use crate::error::StageFailure;
use crate::pipeline::workspace::Workspace;
use crate::process::{Invocation, ProcessOutcome, ProcessRunner};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// `dvips -E -o <stem>.ps <stem>.dvi`
pub fn dvips_invocation(dvips: &Path, ws: &Workspace) -> Invocation {
    Invocation::new(dvips.to_string_lossy(), ws.dir())
        .arg("-E")
        .arg("-o")
        .arg(ws.file_name("ps"))
        .arg(ws.file_name("dvi"))
}

/// `convert -density DxD <stem>.<input_ext> <stem>.png`
pub fn convert_invocation(
    converter: &Path,
    ws: &Workspace,
    input_ext: &str,
    dpi: u32,
    env: Vec<(String, String)>,
) -> Invocation {
    Invocation::new(converter.to_string_lossy(), ws.dir())
        .arg("-density")
        .arg(format!("{dpi}x{dpi}"))
        .arg(ws.file_name(input_ext))
        .arg(ws.file_name("png"))
        .env(env)
}

/// Run one conversion invocation to completion.
pub async fn run_conversion(
    runner: &dyn ProcessRunner,
    inv: &Invocation,
    timeout: Duration,
) -> Result<(), StageFailure> {
    let tool = inv.tool_name();
    let failed = |detail: String| StageFailure::ConversionFailed {
        tool: tool.to_string(),
        detail,
    };

    match runner.run(inv, timeout).await {
        Ok(outcome) if outcome.is_success() => {
            info!("{} finished", tool);
            Ok(())
        }
        Ok(ProcessOutcome::Exited { code, stderr }) => {
            warn!("{} process failed (exit code {:?})", tool, code);
            let stderr = stderr.trim();
            Err(failed(if stderr.is_empty() {
                format!("exit code {code:?}")
            } else {
                format!("exit code {code:?}: {stderr}")
            }))
        }
        Ok(ProcessOutcome::TimedOut) => {
            warn!("{} process did not finish within {:?}", tool, timeout);
            Err(failed(format!("timed out after {}s", timeout.as_secs())))
        }
        Err(e) => {
            warn!("{} could not be started: {}", inv.program, e);
            Err(StageFailure::Spawn {
                program: tool.to_string(),
                detail: e.to_string(),
            })
        }
    }
}
