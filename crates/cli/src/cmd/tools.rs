use anyhow::Result;
use serde::Serialize;

use fwgen_lib::Pipeline;

use crate::output::{OutputFormat, print_info, print_json, print_stat};

#[derive(Serialize)]
struct ToolStatus {
  name: String,
  available: bool,
}

pub fn cmd_tools(pipeline: &Pipeline, output: OutputFormat) -> Result<()> {
  let available = pipeline.available_tools();
  let tools: Vec<ToolStatus> = pipeline
    .registry()
    .names()
    .map(|name| ToolStatus {
      name: name.to_string(),
      available: available.iter().any(|a| a == name),
    })
    .collect();

  if output.is_json() {
    print_json(&tools)?;
    return Ok(());
  }

  if available.is_empty() {
    print_info("No build tools found. Install PlatformIO or Arduino CLI.");
  }
  for tool in &tools {
    print_stat(&tool.name, if tool.available { "installed" } else { "not found" });
  }

  Ok(())
}
