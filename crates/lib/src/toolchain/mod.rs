//! Compiler toolchains behind one interface.
//!
//! A [`BuildStrategy`] wraps a single external toolchain: it knows how to tell
//! whether the toolchain is installed, how to compile a workspace with it, where
//! the produced binary ends up, and how to flash that binary over the network.
//! Strategies are picked per request by the [`registry::StrategyRegistry`].

pub mod arduino;
pub mod artifact;
pub mod ota;
pub mod platformio;
pub mod registry;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::process::{ProcessError, ProcessOutput, ToolCommand};
use crate::warning::PipelineWarning;

pub use registry::{ResolveError, StrategyRegistry};

#[derive(Debug, Error)]
pub enum ToolchainError {
  #[error("{tool} is not installed")]
  Unavailable { tool: String },

  #[error("{tool} was cancelled")]
  Cancelled { tool: String },

  #[error("failed to run {tool}: {source}")]
  Process {
    tool: String,
    #[source]
    source: ProcessError,
  },

  #[error("{tool} exited with {code:?}:\n{tail}")]
  CompileFailed {
    tool: String,
    code: Option<i32>,
    tail: String,
  },

  #[error("no .{extension} artifact found in {}", .dir.display())]
  ArtifactNotFound { dir: PathBuf, extension: String },

  #[error("{context}: {source}")]
  Io {
    context: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{utility} not found, cannot perform OTA upload")]
  UtilityNotFound { utility: String },

  #[error("{tool} upload exited with {code:?}:\n{tail}")]
  UploadFailed {
    tool: String,
    code: Option<i32>,
    tail: String,
  },
}

impl ToolchainError {
  /// Map a subprocess failure, keeping cancellation distinguishable.
  pub(crate) fn from_process(tool: &str, error: ProcessError) -> Self {
    match error {
      ProcessError::Cancelled { .. } => ToolchainError::Cancelled { tool: tool.to_string() },
      source => ToolchainError::Process {
        tool: tool.to_string(),
        source,
      },
    }
  }

  pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
    ToolchainError::Io {
      context: context.into(),
      source,
    }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, ToolchainError::Cancelled { .. })
  }
}

/// Turn a finished compile into an error if the compiler failed.
pub(crate) fn check_compile(tool: &str, output: ProcessOutput) -> Result<ProcessOutput, ToolchainError> {
  if output.success() {
    return Ok(output);
  }
  Err(ToolchainError::CompileFailed {
    tool: tool.to_string(),
    code: output.code,
    tail: output.tail().to_string(),
  })
}

pub(crate) fn check_upload(tool: &str, output: ProcessOutput) -> Result<ProcessOutput, ToolchainError> {
  if output.success() {
    return Ok(output);
  }
  Err(ToolchainError::UploadFailed {
    tool: tool.to_string(),
    code: output.code,
    tail: output.tail().to_string(),
  })
}

/// A compiled firmware image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
  /// Absolute path of the produced binary.
  pub binary_path: PathBuf,
  /// Board (FQBN or PlatformIO environment) the binary was built for.
  pub board: String,
  /// Binary size in bytes.
  pub size: u64,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<PipelineWarning>,
}

/// A successful network flash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
  pub tool: String,
  pub target: String,
  /// Binary that was flashed, when the toolchain reports it.
  pub binary_path: Option<PathBuf>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<PipelineWarning>,
}

/// Per-request knobs handed to strategy constructors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainOptions {
  /// Board identifier: an FQBN for arduino-cli, an environment for PlatformIO.
  pub board: Option<String>,
}

#[async_trait]
pub trait BuildStrategy: Send + Sync {
  /// Registry key, e.g. `platformio`.
  fn name(&self) -> &str;

  /// Whether the toolchain can be run right now. Probed live on every call.
  fn is_available(&self) -> bool;

  /// Compile the workspace at `dir` and locate the produced binary.
  async fn build(&self, cancel: &CancellationToken, dir: &Path) -> Result<BuildResult, ToolchainError>;

  /// Flash the workspace's firmware to the device at `target`.
  async fn upload(&self, cancel: &CancellationToken, dir: &Path, target: &str) -> Result<UploadResult, ToolchainError>;

  /// Directory under `workspace` where this toolchain writes its binaries.
  fn artifact_dir(&self, workspace: &Path) -> PathBuf;

  /// File names that mark the application image among other binaries.
  fn preferred_artifacts(&self) -> &[&str] {
    &[]
  }
}

/// Resolve the command for a toolchain.
///
/// An explicit command is used as long as its program can be found;
/// otherwise the aliases are looked up on `PATH` in order.
pub(crate) fn locate_tool(explicit: Option<&ToolCommand>, aliases: &[&str]) -> Option<ToolCommand> {
  match explicit {
    Some(command) => which::which(command.program()).ok().map(|_| command.clone()),
    None => aliases
      .iter()
      .find_map(|alias| which::which(alias).ok())
      .map(ToolCommand::new),
  }
}

/// Size of a produced binary.
pub(crate) async fn artifact_size(path: &Path) -> Result<u64, ToolchainError> {
  let metadata = tokio::fs::metadata(path)
    .await
    .map_err(|e| ToolchainError::io(format!("cannot stat binary '{}'", path.display()), e))?;
  Ok(metadata.len())
}
