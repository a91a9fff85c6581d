//! Arduino CLI (`arduino-cli compile`).
//!
//! The firmware template is laid out as a PlatformIO project (`src/main.cpp`,
//! `include/`, `lib/`). Arduino CLI wants a sketch directory holding an
//! `.ino` of the same name, so a wrapper sketch including `main.cpp` is
//! synthesized when the workspace has none.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::artifact::discover_artifact;
use super::ota::{ESPOTA, EspOta};
use super::{
  BuildResult, BuildStrategy, ToolchainError, ToolchainOptions, UploadResult, artifact_size, check_compile,
  locate_tool,
};
use crate::consts::MAIN_SOURCE;
use crate::process::{self, ToolCommand};
use crate::warning::PipelineWarning;

pub const NAME: &str = "arduino-cli";

/// ESP32 DevKit V1.
pub const DEFAULT_FQBN: &str = "esp32:esp32:esp32";

const ALIASES: &[&str] = &["arduino-cli"];
const REQUIRED_LIBRARIES: &[&str] = &["ArduinoJson"];
const SKETCH_NAME: &str = "arduino_sketch";

/// Board manager index for the vendor part of an FQBN.
fn board_index_url(vendor: &str) -> Option<&'static str> {
  match vendor {
    "esp32" => Some("https://raw.githubusercontent.com/espressif/arduino-esp32/gh-pages/package_esp32_index.json"),
    "esp8266" => Some("https://arduino.esp8266.com/stable/package_esp8266com_index.json"),
    _ => None,
  }
}

pub struct ArduinoCli {
  fqbn: String,
  command: Option<ToolCommand>,
  ota: EspOta,
}

impl ArduinoCli {
  pub fn new(options: &ToolchainOptions) -> Self {
    Self {
      fqbn: options.board.clone().unwrap_or_else(|| DEFAULT_FQBN.to_string()),
      command: None,
      ota: EspOta::new(),
    }
  }

  pub fn with_command(mut self, command: ToolCommand) -> Self {
    self.command = Some(command);
    self
  }

  pub fn with_ota(mut self, ota: EspOta) -> Self {
    self.ota = ota;
    self
  }

  pub fn fqbn(&self) -> &str {
    &self.fqbn
  }

  fn tool(&self) -> Result<ToolCommand, ToolchainError> {
    locate_tool(self.command.as_ref(), ALIASES).ok_or_else(|| ToolchainError::Unavailable { tool: NAME.to_string() })
  }

  /// Install the board core and libraries the firmware needs.
  ///
  /// Every step is best effort: failures come back as warnings, usually
  /// because the package is already installed or the host is offline.
  /// Cancellation still aborts.
  async fn prime(
    &self,
    cancel: &CancellationToken,
    tool: &ToolCommand,
  ) -> Result<Vec<PipelineWarning>, ToolchainError> {
    let mut warnings = Vec::new();
    let mut parts = self.fqbn.splitn(3, ':');
    let (vendor, arch) = match (parts.next(), parts.next()) {
      (Some(vendor), Some(arch)) if !vendor.is_empty() && !arch.is_empty() => (vendor, arch),
      _ => {
        warnings.push(PipelineWarning::PrimingFailed {
          step: "core install".to_string(),
          reason: format!("invalid FQBN: {}", self.fqbn),
        });
        return Ok(warnings);
      }
    };

    if let Some(url) = board_index_url(vendor) {
      self
        .prime_step(cancel, tool, &["config", "add", "board_manager.additional_urls", url], &mut warnings)
        .await?;
      self.prime_step(cancel, tool, &["core", "update-index"], &mut warnings).await?;
    }

    let core = format!("{vendor}:{arch}");
    self
      .prime_step(cancel, tool, &["core", "install", core.as_str()], &mut warnings)
      .await?;

    for &library in REQUIRED_LIBRARIES {
      self
        .prime_step(cancel, tool, &["lib", "install", library], &mut warnings)
        .await?;
    }

    Ok(warnings)
  }

  async fn prime_step(
    &self,
    cancel: &CancellationToken,
    tool: &ToolCommand,
    args: &[&str],
    warnings: &mut Vec<PipelineWarning>,
  ) -> Result<(), ToolchainError> {
    let step = args.join(" ");
    let mut command = tool.command();
    command.args(args);

    let reason = match process::run(command, cancel).await {
      Ok(output) if output.success() => {
        debug!(step = %step, "priming step succeeded");
        return Ok(());
      }
      Ok(output) => format!("exit code {:?}: {}", output.code, output.tail().trim()),
      Err(e) => match ToolchainError::from_process(NAME, e) {
        cancelled @ ToolchainError::Cancelled { .. } => return Err(cancelled),
        other => other.to_string(),
      },
    };

    warn!(step = %step, reason = %reason, "arduino-cli priming step failed (may already be installed)");
    warnings.push(PipelineWarning::PrimingFailed { step, reason });
    Ok(())
  }

  /// Directory to hand to `arduino-cli compile`.
  async fn sketch_dir(&self, dir: &Path) -> Result<PathBuf, ToolchainError> {
    let mut entries = tokio::fs::read_dir(dir)
      .await
      .map_err(|e| ToolchainError::io(format!("cannot read workspace '{}'", dir.display()), e))?;
    while let Some(entry) = entries
      .next_entry()
      .await
      .map_err(|e| ToolchainError::io(format!("cannot read workspace '{}'", dir.display()), e))?
    {
      if entry.path().extension().is_some_and(|ext| ext == "ino") {
        return Ok(dir.to_path_buf());
      }
    }

    let sketch_dir = dir.join(SKETCH_NAME);
    tokio::fs::create_dir_all(&sketch_dir)
      .await
      .map_err(|e| ToolchainError::io("failed to create sketch directory", e))?;

    let wrapper = format!(
      "// Generated sketch wrapper for arduino-cli.\n#include \"{}\"\n",
      dir.join(MAIN_SOURCE).display()
    );
    let ino = sketch_dir.join(format!("{SKETCH_NAME}.ino"));
    tokio::fs::write(&ino, wrapper)
      .await
      .map_err(|e| ToolchainError::io(format!("failed to write '{}'", ino.display()), e))?;

    debug!(sketch = %ino.display(), "synthesized sketch wrapper");
    Ok(sketch_dir)
  }
}

#[async_trait]
impl BuildStrategy for ArduinoCli {
  fn name(&self) -> &str {
    NAME
  }

  fn is_available(&self) -> bool {
    locate_tool(self.command.as_ref(), ALIASES).is_some()
  }

  async fn build(&self, cancel: &CancellationToken, dir: &Path) -> Result<BuildResult, ToolchainError> {
    let tool = self.tool()?;
    info!(project_dir = %dir.display(), fqbn = %self.fqbn, "building firmware with Arduino CLI");

    let warnings = self.prime(cancel, &tool).await?;
    let sketch = self.sketch_dir(dir).await?;

    let output_dir = self.artifact_dir(dir);
    tokio::fs::create_dir_all(&output_dir)
      .await
      .map_err(|e| ToolchainError::io("failed to create output directory", e))?;

    let mut command = tool.command();
    command
      .args(["compile", "--fqbn", self.fqbn.as_str()])
      .arg("--output-dir")
      .arg(&output_dir)
      .arg("--libraries")
      .arg(dir.join("lib"))
      .arg("--build-property")
      .arg(format!("compiler.cpp.extra_flags=-I{}", dir.join("include").display()))
      .arg(&sketch)
      .current_dir(dir);

    let output = process::run(command, cancel)
      .await
      .map_err(|e| ToolchainError::from_process(NAME, e))?;
    let output = check_compile(NAME, output)?;
    debug!(output_tail = %output.tail(), "Arduino CLI build succeeded");

    let binary_path = discover_artifact(&output_dir, "bin", &[])?;
    let size = artifact_size(&binary_path).await?;

    Ok(BuildResult {
      binary_path,
      board: self.fqbn.clone(),
      size,
      warnings,
    })
  }

  /// Arduino CLI has no network upload of its own: build, then hand the
  /// binary to `espota.py`.
  async fn upload(
    &self,
    cancel: &CancellationToken,
    dir: &Path,
    target: &str,
  ) -> Result<UploadResult, ToolchainError> {
    info!(
      project_dir = %dir.display(),
      device_ip = target,
      fqbn = %self.fqbn,
      "uploading firmware via Arduino CLI OTA"
    );

    let built = self.build(cancel, dir).await?;
    self.ota.flash(cancel, target, &built.binary_path).await?;
    info!(device_ip = target, tool = ESPOTA, "Arduino CLI OTA upload succeeded");

    Ok(UploadResult {
      tool: NAME.to_string(),
      target: target.to_string(),
      binary_path: Some(built.binary_path),
      warnings: built.warnings,
    })
  }

  fn artifact_dir(&self, workspace: &Path) -> PathBuf {
    workspace.join("build").join("arduino-cli-output")
  }
}
