use std::time::Instant;

use anyhow::{Context, Result};

use fwgen_lib::Pipeline;

use super::RequestArgs;
use crate::output::{
  OutputFormat, format_elapsed, format_size, print_info, print_json, print_stat, print_success, print_warnings,
};

pub async fn cmd_upload(
  pipeline: &Pipeline,
  args: RequestArgs,
  device_ip: Option<String>,
  output: OutputFormat,
) -> Result<()> {
  let request = args.load()?;
  let target = device_ip.unwrap_or_else(|| request.ip.clone());
  let cancel = args.cancellation();
  let start = Instant::now();

  if !output.is_json() {
    print_info(&format!("Building and flashing firmware to {target}"));
  }

  let result = pipeline
    .upload(&cancel, &request, &target)
    .await
    .with_context(|| format!("OTA update of {target} failed"))?;

  if output.is_json() {
    print_json(&result)?;
  } else {
    print_warnings(&result.warnings);
    print_success(&format!("Firmware flashed to {}", result.target));
    print_stat("Build id", result.build_id.as_str());
    print_stat("Tool", &result.tool_name);
    print_stat("Size", &format_size(result.binary_size));
    print_stat("Duration", &format_elapsed(start.elapsed()));
  }

  Ok(())
}
