//! PlatformIO (`pio run`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::artifact::discover_artifact;
use super::{
  BuildResult, BuildStrategy, ToolchainError, ToolchainOptions, UploadResult, artifact_size, check_compile,
  check_upload, locate_tool,
};
use crate::process::{self, ToolCommand};

pub const NAME: &str = "platformio";

const ALIASES: &[&str] = &["pio", "platformio"];
const PREFERRED_ARTIFACTS: &[&str] = &["firmware.bin"];

pub struct PlatformIo {
  /// Environment passed as `-e`; all environments are built when unset.
  environment: Option<String>,
  command: Option<ToolCommand>,
}

impl PlatformIo {
  pub fn new(options: &ToolchainOptions) -> Self {
    // An FQBN is an arduino-cli board id, not a PlatformIO environment.
    let environment = options.board.as_ref().filter(|board| !board.contains(':')).cloned();
    Self {
      environment,
      command: None,
    }
  }

  pub fn with_command(mut self, command: ToolCommand) -> Self {
    self.command = Some(command);
    self
  }

  fn tool(&self) -> Result<ToolCommand, ToolchainError> {
    locate_tool(self.command.as_ref(), ALIASES).ok_or_else(|| ToolchainError::Unavailable { tool: NAME.to_string() })
  }

  fn run_command(&self, tool: &ToolCommand, dir: &Path) -> tokio::process::Command {
    let mut command = tool.command();
    command.arg("run").arg("-d").arg(dir).current_dir(dir);
    if let Some(env) = &self.environment {
      command.arg("-e").arg(env);
    }
    command
  }
}

#[async_trait]
impl BuildStrategy for PlatformIo {
  fn name(&self) -> &str {
    NAME
  }

  fn is_available(&self) -> bool {
    locate_tool(self.command.as_ref(), ALIASES).is_some()
  }

  async fn build(&self, cancel: &CancellationToken, dir: &Path) -> Result<BuildResult, ToolchainError> {
    let tool = self.tool()?;
    info!(project_dir = %dir.display(), environment = ?self.environment, "building firmware with PlatformIO");

    let output = process::run(self.run_command(&tool, dir), cancel)
      .await
      .map_err(|e| ToolchainError::from_process(NAME, e))?;
    let output = check_compile(NAME, output)?;
    debug!(output_tail = %output.tail(), "PlatformIO build succeeded");

    let binary_path = discover_artifact(&self.artifact_dir(dir), "bin", PREFERRED_ARTIFACTS)?;
    let size = artifact_size(&binary_path).await?;

    // .pio/build/<env>/firmware.bin
    let board = binary_path
      .parent()
      .and_then(|env| env.file_name())
      .map(|env| env.to_string_lossy().into_owned())
      .or_else(|| self.environment.clone())
      .unwrap_or_default();

    Ok(BuildResult {
      binary_path,
      board,
      size,
      warnings: Vec::new(),
    })
  }

  async fn upload(&self, cancel: &CancellationToken, dir: &Path, target: &str) -> Result<UploadResult, ToolchainError> {
    let tool = self.tool()?;
    info!(project_dir = %dir.display(), device_ip = target, "uploading firmware via PlatformIO OTA");

    let mut command = self.run_command(&tool, dir);
    command.args(["--target", "upload", "--upload-port", target]);

    let output = process::run(command, cancel)
      .await
      .map_err(|e| ToolchainError::from_process(NAME, e))?;
    check_upload(NAME, output)?;
    info!(device_ip = target, "PlatformIO OTA upload succeeded");

    let binary_path = discover_artifact(&self.artifact_dir(dir), "bin", PREFERRED_ARTIFACTS).ok();
    Ok(UploadResult {
      tool: NAME.to_string(),
      target: target.to_string(),
      binary_path,
      warnings: Vec::new(),
    })
  }

  fn artifact_dir(&self, workspace: &Path) -> PathBuf {
    workspace.join(".pio").join("build")
  }

  fn preferred_artifacts(&self) -> &[&str] {
    PREFERRED_ARTIFACTS
  }
}
