//! Build orchestration.
//!
//! A [`Pipeline`] turns a [`BuildRequest`] into a firmware binary:
//!
//! 1. refresh the shared source and copy it into a fresh workspace,
//! 2. rewrite the workspace's config header,
//! 3. pick a toolchain,
//! 4. compile and locate the binary,
//! 5. optionally flash it over the network.
//!
//! The pipeline owns every workspace it creates. A failed build removes its
//! workspace before returning; a successful one leaves it in place so the
//! binary can be fetched later with [`Pipeline::binary_path`] and removed
//! with [`Pipeline::cleanup_build`].

mod stage;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::build_id::{BuildId, BuildIdError};
use crate::config::PipelineConfig;
use crate::request::BuildRequest;
use crate::source::{CleanupOutcome, SourceError, SourceRepository};
use crate::template::{self, TemplateError};
use crate::toolchain::artifact::discover_artifact;
use crate::toolchain::{self, BuildStrategy, ResolveError, StrategyRegistry, ToolchainError, ToolchainOptions};
use crate::warning::PipelineWarning;

pub use stage::BuildStage;

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("failed to prepare source repository: {0}")]
  Source(#[source] SourceError),

  #[error("failed to create build copy: {0}")]
  Copy(#[source] SourceError),

  #[error("failed to replace config: {0}")]
  Config(#[from] TemplateError),

  #[error(transparent)]
  NoTool(#[from] ResolveError),

  #[error("firmware build failed: {0}")]
  Build(#[source] ToolchainError),

  #[error("OTA upload failed: {0}")]
  Upload(#[source] ToolchainError),

  #[error(transparent)]
  InvalidBuildId(#[from] BuildIdError),

  #[error("build '{0}' not found")]
  BuildNotFound(BuildId),

  #[error("no firmware binary found for build '{0}'")]
  BinaryNotFound(BuildId),
}

impl PipelineError {
  fn from_source(error: SourceError) -> Self {
    match error {
      SourceError::Copy { .. } => PipelineError::Copy(error),
      other => PipelineError::Source(other),
    }
  }

  /// Whether the build stopped because its cancellation token fired.
  pub fn is_cancelled(&self) -> bool {
    match self {
      PipelineError::Source(SourceError::Cancelled) => true,
      PipelineError::Build(e) | PipelineError::Upload(e) => e.is_cancelled(),
      _ => false,
    }
  }
}

/// A compiled firmware binary, still inside its workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateResult {
  pub build_id: BuildId,
  pub binary_path: PathBuf,
  pub binary_size: u64,
  pub tool_name: String,
  pub board: String,
  pub workspace: PathBuf,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<PipelineWarning>,
}

/// A firmware image flashed to a device. Its workspace is already gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
  pub build_id: BuildId,
  pub tool_name: String,
  pub target: String,
  pub binary_size: u64,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<PipelineWarning>,
}

pub struct Pipeline {
  config: PipelineConfig,
  source: SourceRepository,
  registry: StrategyRegistry,
}

impl Pipeline {
  pub fn new(config: PipelineConfig) -> Self {
    let source = SourceRepository::new(&config);
    Self {
      config,
      source,
      registry: StrategyRegistry::standard(),
    }
  }

  pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
    self.registry = registry;
    self
  }

  pub fn with_source(mut self, source: SourceRepository) -> Self {
    self.source = source;
    self
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn registry(&self) -> &StrategyRegistry {
    &self.registry
  }

  /// Build firmware for `request`.
  ///
  /// On success the workspace is kept; on any failure after it was created
  /// it is removed before the error is returned.
  pub async fn generate(
    &self,
    cancel: &CancellationToken,
    request: &BuildRequest,
  ) -> Result<GenerateResult, PipelineError> {
    let build_id = BuildId::generate();
    stage::enter(&build_id, BuildStage::Requested);

    let prepared = match self.source.prepare(cancel, &build_id).await {
      Ok(prepared) => prepared,
      Err(e) => {
        stage::enter(&build_id, BuildStage::Failed);
        return Err(PipelineError::from_source(e));
      }
    };
    stage::enter(&build_id, BuildStage::SourcePrepared);

    let warnings = prepared.refresh.warning().into_iter().collect();
    match self.build_in(cancel, request, &build_id, &prepared.dir, warnings).await {
      Ok(result) => {
        stage::enter(&build_id, BuildStage::Done);
        Ok(result)
      }
      Err(e) => {
        stage::enter(&build_id, BuildStage::Failed);
        warn!(build_id = %build_id, error = %e, "build failed, removing workspace");
        SourceRepository::cleanup(&prepared.dir).await;
        Err(e)
      }
    }
  }

  async fn build_in(
    &self,
    cancel: &CancellationToken,
    request: &BuildRequest,
    build_id: &BuildId,
    workspace: &Path,
    mut warnings: Vec<PipelineWarning>,
  ) -> Result<GenerateResult, PipelineError> {
    let report = template::apply_config(workspace, request).await?;
    warnings.extend(report.warnings());
    stage::enter(build_id, BuildStage::ConfigApplied);

    let strategy = self.registry.resolve(request.preferred_tool(), &options_for(request))?;
    stage::enter(build_id, BuildStage::ToolResolved);

    stage::enter(build_id, BuildStage::Compiling);
    let built = match strategy.build(cancel, workspace).await {
      Ok(built) => built,
      Err(e) => {
        if matches!(e, ToolchainError::CompileFailed { .. }) {
          stage::enter(build_id, BuildStage::CompileFailed);
        }
        return Err(PipelineError::Build(e));
      }
    };
    stage::enter(build_id, BuildStage::Compiled);
    stage::enter(build_id, BuildStage::ArtifactLocated);

    info!(
      build_id = %build_id,
      tool = strategy.name(),
      binary = %built.binary_path.display(),
      size = built.size,
      "firmware built"
    );

    warnings.extend(built.warnings);
    Ok(GenerateResult {
      build_id: build_id.clone(),
      binary_path: built.binary_path,
      binary_size: built.size,
      tool_name: strategy.name().to_string(),
      board: built.board,
      workspace: workspace.to_path_buf(),
      warnings,
    })
  }

  /// Build firmware for `request` and flash it to the device at `target`.
  ///
  /// The workspace is removed once the flash finishes, whether it succeeded
  /// or not.
  pub async fn upload(
    &self,
    cancel: &CancellationToken,
    request: &BuildRequest,
    target: &str,
  ) -> Result<UploadResult, PipelineError> {
    let generated = self.generate(cancel, request).await?;
    let build_id = generated.build_id.clone();

    let flashed = self.flash(cancel, request, &generated, target).await;
    if flashed.is_err() {
      stage::enter(&build_id, BuildStage::Failed);
    }

    let cleanup = SourceRepository::cleanup(&generated.workspace).await;
    let flashed = flashed?;

    let mut warnings = generated.warnings;
    warnings.extend(flashed.warnings);
    warnings.extend(cleanup.warning(&generated.workspace));

    Ok(UploadResult {
      build_id,
      tool_name: flashed.tool,
      target: flashed.target,
      binary_size: generated.binary_size,
      warnings,
    })
  }

  async fn flash(
    &self,
    cancel: &CancellationToken,
    request: &BuildRequest,
    generated: &GenerateResult,
    target: &str,
  ) -> Result<toolchain::UploadResult, PipelineError> {
    let strategy = self.registry.resolve(request.preferred_tool(), &options_for(request))?;

    stage::enter(&generated.build_id, BuildStage::Uploading);
    match strategy.upload(cancel, &generated.workspace, target).await {
      Ok(result) => {
        stage::enter(&generated.build_id, BuildStage::Uploaded);
        info!(build_id = %generated.build_id, device_ip = target, tool = strategy.name(), "firmware uploaded");
        Ok(result)
      }
      Err(e) => {
        stage::enter(&generated.build_id, BuildStage::UploadFailed);
        Err(PipelineError::Upload(e))
      }
    }
  }

  /// Path of the binary a finished build produced.
  pub fn binary_path(&self, build_id: &str) -> Result<PathBuf, PipelineError> {
    let build_id: BuildId = build_id.parse()?;
    let workspace = self.config.workspace_dir(&build_id);
    if !workspace.is_dir() {
      return Err(PipelineError::BuildNotFound(build_id));
    }

    let options = ToolchainOptions::default();
    let strategies = self.registry.all(&options);
    strategies
      .iter()
      .find_map(|strategy| find_binary(strategy.as_ref(), &workspace))
      .or_else(|| discover_artifact(&workspace, "bin", &[]).ok())
      .ok_or(PipelineError::BinaryNotFound(build_id))
  }

  /// Remove a build's workspace.
  pub async fn cleanup_build(&self, build_id: &str) -> Result<CleanupOutcome, PipelineError> {
    let build_id: BuildId = build_id.parse()?;
    let workspace = self.config.workspace_dir(&build_id);
    let outcome = SourceRepository::cleanup(&workspace).await;
    info!(build_id = %build_id, outcome = ?outcome, "build cleanup");
    Ok(outcome)
  }

  /// Names of the toolchains installed on this host, in priority order.
  pub fn available_tools(&self) -> Vec<String> {
    self.registry.available_names(&ToolchainOptions::default())
  }
}

fn options_for(request: &BuildRequest) -> ToolchainOptions {
  ToolchainOptions {
    board: request.board().map(str::to_string),
  }
}

fn find_binary(strategy: &dyn BuildStrategy, workspace: &Path) -> Option<PathBuf> {
  discover_artifact(&strategy.artifact_dir(workspace), "bin", strategy.preferred_artifacts()).ok()
}
