use anyhow::{Result, bail};

use fwgen_lib::Pipeline;
use fwgen_lib::source::CleanupOutcome;

use crate::output::{OutputFormat, print_info, print_json, print_success};

pub async fn cmd_clean(pipeline: &Pipeline, build_id: &str, output: OutputFormat) -> Result<()> {
  let outcome = pipeline.cleanup_build(build_id).await?;

  if output.is_json() {
    let status = match &outcome {
      CleanupOutcome::Removed => "removed",
      CleanupOutcome::Missing => "missing",
      CleanupOutcome::Failed { .. } => "failed",
    };
    print_json(&serde_json::json!({ "build_id": build_id, "status": status }))?;
  }

  match outcome {
    CleanupOutcome::Failed { reason } => bail!("Failed to remove build {build_id}: {reason}"),
    _ if output.is_json() => {}
    CleanupOutcome::Removed => print_success(&format!("Removed build {build_id}")),
    CleanupOutcome::Missing => print_info(&format!("Build {build_id} not found, nothing to remove")),
  }

  Ok(())
}
