//! Shared firmware source and per-build workspaces.
//!
//! One checkout of the firmware template lives at `<work_dir>/<repo_name>`
//! and is shared by every build. Builds never touch it directly; each gets a
//! private copy under `<work_dir>/builds/<build_id>`.
//!
//! The checkout sits behind a read/write lock. Refreshing takes the write
//! side and copying the read side, so a copy always sees a complete tree
//! and many copies can run at once.

pub mod git;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::build_id::BuildId;
use crate::config::{PipelineConfig, workspace_dir_in};
use crate::process::{ProcessError, ToolCommand};
use crate::util::fs::copy_dir_all;
use crate::warning::PipelineWarning;

use git::CloneFailure;

#[derive(Debug, Error)]
pub enum SourceError {
  #[error("failed to create directory '{path}': {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to clone repository '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("failed to copy '{from}' to '{to}': {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("source preparation was cancelled")]
  Cancelled,

  #[error("background task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// Result of bringing the shared checkout up to date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
  /// No checkout existed; a fresh shallow clone was made.
  Cloned { rev: Option<String> },
  /// The existing checkout was fast-forwarded (or already current).
  Refreshed { rev: Option<String> },
  /// Refreshing failed and the existing checkout is used as is.
  Stale { reason: String },
}

impl RefreshOutcome {
  pub fn warning(&self) -> Option<PipelineWarning> {
    match self {
      RefreshOutcome::Stale { reason } => Some(PipelineWarning::StaleSource { reason: reason.clone() }),
      _ => None,
    }
  }
}

/// Result of removing a workspace. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
  Removed,
  /// Nothing was there to remove.
  Missing,
  Failed { reason: String },
}

impl CleanupOutcome {
  pub fn warning(&self, path: &Path) -> Option<PipelineWarning> {
    match self {
      CleanupOutcome::Failed { reason } => Some(PipelineWarning::CleanupFailed {
        path: path.to_path_buf(),
        reason: reason.clone(),
      }),
      _ => None,
    }
  }
}

/// The shared checkout, ready to be copied from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCheckout {
  pub dir: PathBuf,
  pub refresh: RefreshOutcome,
}

/// A freshly isolated workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedWorkspace {
  pub dir: PathBuf,
  pub refresh: RefreshOutcome,
}

pub struct SourceRepository {
  url: String,
  checkout: PathBuf,
  builds_dir: PathBuf,
  git: ToolCommand,
  gate: RwLock<()>,
}

impl SourceRepository {
  pub fn new(config: &PipelineConfig) -> Self {
    Self {
      url: config.repo_url.clone(),
      checkout: config.source_dir(),
      builds_dir: config.builds_dir(),
      git: ToolCommand::new("git"),
      gate: RwLock::new(()),
    }
  }

  /// Use a different git executable for refreshes.
  pub fn with_git(mut self, git: ToolCommand) -> Self {
    self.git = git;
    self
  }

  pub fn checkout_dir(&self) -> &Path {
    &self.checkout
  }

  /// Clone the template if there is no checkout yet, otherwise try to
  /// fast-forward it.
  ///
  /// A failed clone is fatal. A failed refresh is not: the existing tree is
  /// kept and reported as [`RefreshOutcome::Stale`].
  pub async fn ensure(&self, cancel: &CancellationToken) -> Result<SourceCheckout, SourceError> {
    let _guard = self.gate.write().await;
    let refresh = self.refresh_locked(cancel).await?;
    Ok(SourceCheckout {
      dir: self.checkout.clone(),
      refresh,
    })
  }

  /// Copy the checkout into the workspace for `build_id`.
  ///
  /// A failed copy is fatal and leaves no partial workspace behind.
  pub async fn isolate(&self, build_id: &BuildId) -> Result<PathBuf, SourceError> {
    let _guard = self.gate.read().await;
    self.copy_locked(build_id).await
  }

  /// [`ensure`](Self::ensure) then [`isolate`](Self::isolate), without letting
  /// another refresh slip in between.
  pub async fn prepare(
    &self,
    cancel: &CancellationToken,
    build_id: &BuildId,
  ) -> Result<PreparedWorkspace, SourceError> {
    let guard = self.gate.write().await;
    let refresh = self.refresh_locked(cancel).await?;
    let _guard = guard.downgrade();
    let dir = self.copy_locked(build_id).await?;
    Ok(PreparedWorkspace { dir, refresh })
  }

  /// Remove a workspace directory.
  ///
  /// Failures are logged and returned, never raised: a leaked directory is
  /// better than a failed request.
  pub async fn cleanup(dir: &Path) -> CleanupOutcome {
    match tokio::fs::remove_dir_all(dir).await {
      Ok(()) => {
        debug!(dir = %dir.display(), "removed build directory");
        CleanupOutcome::Removed
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => CleanupOutcome::Missing,
      Err(e) => {
        warn!(dir = %dir.display(), error = %e, "failed to cleanup build directory");
        CleanupOutcome::Failed { reason: e.to_string() }
      }
    }
  }

  async fn refresh_locked(&self, cancel: &CancellationToken) -> Result<RefreshOutcome, SourceError> {
    if self.checkout.join(".git").exists() {
      return self.pull(cancel).await;
    }
    self.clone_fresh(cancel).await
  }

  async fn clone_fresh(&self, cancel: &CancellationToken) -> Result<RefreshOutcome, SourceError> {
    if let Some(parent) = self.checkout.parent() {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| SourceError::CreateDir {
          path: parent.to_path_buf(),
          source,
        })?;
    }

    info!(url = %self.url, target = %self.checkout.display(), "cloning firmware source repository");

    let existed = self.checkout.exists();
    let interrupt = Arc::new(AtomicBool::new(false));
    let watcher = {
      let interrupt = Arc::clone(&interrupt);
      let cancel = cancel.clone();
      tokio::spawn(async move {
        cancel.cancelled().await;
        interrupt.store(true, Ordering::Relaxed);
      })
    };

    let url = self.url.clone();
    let dest = self.checkout.clone();
    let flag = Arc::clone(&interrupt);
    let result = tokio::task::spawn_blocking(move || git::clone_shallow(&url, &dest, &flag)).await;
    watcher.abort();

    let failure = match result? {
      Ok(rev) => {
        info!(path = %self.checkout.display(), rev = ?rev, "repository cloned");
        return Ok(RefreshOutcome::Cloned { rev });
      }
      Err(failure) => failure,
    };

    if !existed && self.checkout.exists() {
      let _ = Self::cleanup(&self.checkout).await;
    }

    match failure {
      CloneFailure::Interrupted => Err(SourceError::Cancelled),
      CloneFailure::Git(source) => Err(SourceError::Clone {
        url: self.url.clone(),
        source,
      }),
    }
  }

  async fn pull(&self, cancel: &CancellationToken) -> Result<RefreshOutcome, SourceError> {
    info!(path = %self.checkout.display(), "pulling latest firmware source");

    let reason = match git::pull_ff_only(&self.git, &self.checkout, cancel).await {
      Ok(output) if output.success() => {
        let rev = git::head_rev(&self.checkout);
        debug!(rev = ?rev, "firmware source up to date");
        return Ok(RefreshOutcome::Refreshed { rev });
      }
      Ok(output) => format!("git pull exited with {:?}: {}", output.code, output.tail().trim()),
      Err(ProcessError::Cancelled { .. }) => return Err(SourceError::Cancelled),
      Err(e) => e.to_string(),
    };

    warn!(reason = %reason, "git pull failed, using existing source");
    Ok(RefreshOutcome::Stale { reason })
  }

  async fn copy_locked(&self, build_id: &BuildId) -> Result<PathBuf, SourceError> {
    tokio::fs::create_dir_all(&self.builds_dir)
      .await
      .map_err(|source| SourceError::CreateDir {
        path: self.builds_dir.clone(),
        source,
      })?;

    let from = self.checkout.clone();
    let to = workspace_dir_in(&self.builds_dir, build_id);
    let target = to.clone();
    let copied = tokio::task::spawn_blocking(move || copy_dir_all(&from, &target)).await?;

    match copied {
      Ok(files) => {
        info!(build_id = %build_id, build_dir = %to.display(), files, "created build copy");
        Ok(to)
      }
      Err(source) => {
        if source.kind() != std::io::ErrorKind::AlreadyExists {
          let _ = Self::cleanup(&to).await;
        }
        Err(SourceError::Copy {
          from: self.checkout.clone(),
          to,
          source,
        })
      }
    }
  }
}
