//! Git operations on the shared checkout.
//!
//! Cloning goes through gix so a fresh host needs no git installation. The
//! fast-forward refresh of an existing worktree shells out to `git pull
//! --ff-only`, which gix has no porcelain for.

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::process::{self, ProcessError, ProcessOutput, ToolCommand};

/// Why a clone failed.
#[derive(Debug)]
pub enum CloneFailure {
  Interrupted,
  Git(Box<dyn std::error::Error + Send + Sync>),
}

/// Shallow-clone `url` into `dest` and check out the default branch.
///
/// Blocking; run it on the blocking pool. Setting `interrupt` aborts the
/// transfer.
///
/// Returns the checked-out commit, if it could be read back.
pub fn clone_shallow(url: &str, dest: &Path, interrupt: &AtomicBool) -> Result<Option<String>, CloneFailure> {
  let prepared = gix::prepare_clone(url, dest).map_err(|e| CloneFailure::Git(Box::new(e)))?;
  let mut prepared = prepared.with_shallow(gix::remote::fetch::Shallow::DepthAtRemote(NonZeroU32::MIN));

  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, interrupt)
    .map_err(|e| interrupted_or(interrupt, e))?;

  let (repo, _outcome) = checkout
    .main_worktree(gix::progress::Discard, interrupt)
    .map_err(|e| interrupted_or(interrupt, e))?;

  Ok(repo.head_id().ok().map(|id| id.to_string()))
}

fn interrupted_or<E>(interrupt: &AtomicBool, error: E) -> CloneFailure
where
  E: std::error::Error + Send + Sync + 'static,
{
  if interrupt.load(std::sync::atomic::Ordering::Relaxed) {
    CloneFailure::Interrupted
  } else {
    CloneFailure::Git(Box::new(error))
  }
}

/// Fast-forward the worktree at `repo_dir` from its upstream.
///
/// The git dir is passed explicitly so a broken checkout can never make git
/// fall back to some enclosing repository.
pub async fn pull_ff_only(
  git: &ToolCommand,
  repo_dir: &Path,
  cancel: &CancellationToken,
) -> Result<ProcessOutput, ProcessError> {
  let mut command = git.command();
  command
    .arg("--git-dir")
    .arg(repo_dir.join(".git"))
    .arg("--work-tree")
    .arg(repo_dir)
    .args(["pull", "--ff-only"])
    .current_dir(repo_dir);

  debug!(path = %repo_dir.display(), "pulling firmware source");
  process::run(command, cancel).await
}

/// Commit currently checked out at `repo_dir`, if readable.
pub fn head_rev(repo_dir: &Path) -> Option<String> {
  let repo = gix::open(repo_dir).ok()?;
  repo.head_id().ok().map(|id| id.to_string())
}
