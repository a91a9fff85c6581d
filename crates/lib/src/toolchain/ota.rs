//! Network flashing through Espressif's `espota.py`.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{ToolchainError, check_upload};
use crate::platform::paths;
use crate::process::{self, ProcessOutput, ToolCommand};

pub const ESPOTA: &str = "espota.py";

/// Locates and runs `espota.py`.
#[derive(Debug, Clone)]
pub struct EspOta {
  search_roots: Vec<PathBuf>,
  interpreter: ToolCommand,
}

impl Default for EspOta {
  fn default() -> Self {
    Self::new()
  }
}

impl EspOta {
  /// Search the usual Arduino and PlatformIO install trees, run with `python3`.
  pub fn new() -> Self {
    let home = paths::home_dir();
    Self {
      search_roots: vec![
        home.join(".arduino15").join("packages").join("esp32").join("hardware").join("esp32"),
        home
          .join(".platformio")
          .join("packages")
          .join("framework-arduinoespressif32")
          .join("tools"),
        PathBuf::from("/usr/share/arduino/hardware/espressif/esp32/tools"),
      ],
      interpreter: ToolCommand::new("python3"),
    }
  }

  pub fn with_search_roots(mut self, roots: Vec<PathBuf>) -> Self {
    self.search_roots = roots;
    self
  }

  pub fn with_interpreter(mut self, interpreter: ToolCommand) -> Self {
    self.interpreter = interpreter;
    self
  }

  /// First `espota.py` under the search roots, then on `PATH`.
  pub fn locate(&self) -> Option<PathBuf> {
    self
      .search_roots
      .iter()
      .find_map(|root| find_in(root))
      .or_else(|| which::which(ESPOTA).ok())
  }

  /// Flash `binary` to the device at `target`.
  pub async fn flash(
    &self,
    cancel: &CancellationToken,
    target: &str,
    binary: &Path,
  ) -> Result<ProcessOutput, ToolchainError> {
    let script = self.locate().ok_or_else(|| ToolchainError::UtilityNotFound {
      utility: ESPOTA.to_string(),
    })?;

    info!(script = %script.display(), device = target, binary = %binary.display(), "flashing firmware over the air");

    let mut command = self.interpreter.command();
    command.arg(&script).arg("-i").arg(target).arg("-f").arg(binary);

    let output = process::run(command, cancel)
      .await
      .map_err(|e| ToolchainError::from_process(ESPOTA, e))?;
    check_upload(ESPOTA, output)
  }
}

fn find_in(root: &Path) -> Option<PathBuf> {
  let found = WalkDir::new(root)
    .sort_by_file_name()
    .into_iter()
    .filter_map(|entry| entry.ok())
    .find(|entry| entry.file_type().is_file() && entry.file_name() == ESPOTA)
    .map(|entry| entry.into_path());
  if let Some(path) = &found {
    debug!(path = %path.display(), "found espota.py");
  }
  found
}
