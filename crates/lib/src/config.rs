//! Pipeline configuration.
//!
//! Values start from built-in defaults, are overridden by `FWGEN_*`
//! environment variables, and finally by explicit setters (CLI flags).

use std::path::{Path, PathBuf};

use crate::build_id::BuildId;
use crate::consts::{BUILDS_DIR, DEFAULT_REPO_NAME, DEFAULT_REPO_URL, REPO_URL_ENV};
use crate::platform::paths;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
  /// Base directory for the shared checkout and per-build workspaces.
  pub work_dir: PathBuf,
  /// Remote template repository.
  pub repo_url: String,
  /// Directory name of the shared checkout under `work_dir`.
  pub repo_name: String,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      work_dir: paths::cache_dir(),
      repo_url: DEFAULT_REPO_URL.to_string(),
      repo_name: DEFAULT_REPO_NAME.to_string(),
    }
  }
}

impl PipelineConfig {
  /// Defaults with environment overrides applied.
  pub fn from_env() -> Self {
    let mut config = Self {
      work_dir: paths::work_dir(),
      ..Self::default()
    };
    if let Ok(url) = std::env::var(REPO_URL_ENV)
      && !url.is_empty()
    {
      config.repo_url = url;
    }
    config
  }

  pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
    self.work_dir = work_dir.into();
    self
  }

  pub fn with_repo_url(mut self, repo_url: impl Into<String>) -> Self {
    self.repo_url = repo_url.into();
    self
  }

  /// `<work_dir>/<repo_name>`
  pub fn source_dir(&self) -> PathBuf {
    self.work_dir.join(&self.repo_name)
  }

  /// `<work_dir>/builds`
  pub fn builds_dir(&self) -> PathBuf {
    self.work_dir.join(BUILDS_DIR)
  }

  /// `<work_dir>/builds/<build_id>`
  pub fn workspace_dir(&self, build_id: &BuildId) -> PathBuf {
    workspace_dir_in(&self.builds_dir(), build_id)
  }
}

pub(crate) fn workspace_dir_in(builds_dir: &Path, build_id: &BuildId) -> PathBuf {
  builds_dir.join(build_id.as_str())
}
