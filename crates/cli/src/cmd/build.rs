use std::time::Instant;

use anyhow::{Context, Result};

use fwgen_lib::Pipeline;

use super::RequestArgs;
use crate::output::{
  OutputFormat, format_elapsed, format_size, print_info, print_json, print_stat, print_success, print_warnings,
};

pub async fn cmd_build(pipeline: &Pipeline, args: RequestArgs, output: OutputFormat) -> Result<()> {
  let request = args.load()?;
  let cancel = args.cancellation();
  let start = Instant::now();

  if !output.is_json() {
    print_info(&format!("Building firmware for {}", request.ip));
  }

  let result = pipeline
    .generate(&cancel, &request)
    .await
    .context("Firmware generation failed")?;

  if output.is_json() {
    print_json(&result)?;
  } else {
    print_warnings(&result.warnings);
    print_success("Firmware built");
    print_stat("Build id", result.build_id.as_str());
    print_stat("Tool", &result.tool_name);
    print_stat("Board", &result.board);
    print_stat("Binary", &result.binary_path.display().to_string());
    print_stat("Size", &format_size(result.binary_size));
    print_stat("Duration", &format_elapsed(start.elapsed()));
  }

  Ok(())
}
