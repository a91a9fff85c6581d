use std::path::Path;

use anyhow::{Context, Result};

use fwgen_lib::Pipeline;

use crate::output::{OutputFormat, format_size, print_json, print_success};

pub async fn cmd_path(pipeline: &Pipeline, build_id: &str, copy_to: Option<&Path>, output: OutputFormat) -> Result<()> {
  let binary = pipeline.binary_path(build_id)?;

  let copied = match copy_to {
    Some(dest) => {
      let bytes = tokio::fs::copy(&binary, dest)
        .await
        .with_context(|| format!("Failed to copy {} to {}", binary.display(), dest.display()))?;
      Some((dest, bytes))
    }
    None => None,
  };

  if output.is_json() {
    print_json(&serde_json::json!({
      "build_id": build_id,
      "binary_path": binary,
      "copied_to": copied.map(|(dest, _)| dest),
    }))?;
    return Ok(());
  }

  match copied {
    Some((dest, bytes)) => print_success(&format!(
      "Copied {} ({}) to {}",
      binary.display(),
      format_size(bytes),
      dest.display()
    )),
    None => println!("{}", binary.display()),
  }

  Ok(())
}
