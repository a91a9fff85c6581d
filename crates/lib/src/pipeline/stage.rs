use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::build_id::BuildId;

/// Where a build is in its lifecycle.
///
/// `Requested → SourcePrepared → ConfigApplied → ToolResolved → Compiling →
/// Compiled → ArtifactLocated → Done`, with `Uploading → Uploaded` after
/// `Done` for network flashes. Any failure ends in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
  Requested,
  SourcePrepared,
  ConfigApplied,
  ToolResolved,
  Compiling,
  Compiled,
  CompileFailed,
  ArtifactLocated,
  Done,
  Uploading,
  Uploaded,
  UploadFailed,
  Failed,
}

impl BuildStage {
  pub fn as_str(self) -> &'static str {
    match self {
      BuildStage::Requested => "requested",
      BuildStage::SourcePrepared => "source_prepared",
      BuildStage::ConfigApplied => "config_applied",
      BuildStage::ToolResolved => "tool_resolved",
      BuildStage::Compiling => "compiling",
      BuildStage::Compiled => "compiled",
      BuildStage::CompileFailed => "compile_failed",
      BuildStage::ArtifactLocated => "artifact_located",
      BuildStage::Done => "done",
      BuildStage::Uploading => "uploading",
      BuildStage::Uploaded => "uploaded",
      BuildStage::UploadFailed => "upload_failed",
      BuildStage::Failed => "failed",
    }
  }

  /// Stages that end a build.
  pub fn is_terminal(self) -> bool {
    matches!(self, BuildStage::Done | BuildStage::Uploaded | BuildStage::Failed)
  }
}

impl fmt::Display for BuildStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

pub(super) fn enter(build_id: &BuildId, stage: BuildStage) {
  if stage.is_terminal() {
    info!(build_id = %build_id, stage = %stage, "build stage");
  } else {
    debug!(build_id = %build_id, stage = %stage, "build stage");
  }
}
