//! Non-fatal conditions collected while a build runs.
//!
//! Best-effort stages (source refresh, dependency priming, config macros that
//! the template no longer defines, workspace cleanup) never fail a build. They
//! surface here instead so callers and tests can still see what happened.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
  /// Refreshing the shared checkout failed; the existing tree was used.
  StaleSource { reason: String },
  /// A dependency priming step failed.
  PrimingFailed { step: String, reason: String },
  /// A macro the request carries a value for is not defined in the template.
  MacroMissing { name: String },
  /// A workspace could not be removed.
  CleanupFailed { path: PathBuf, reason: String },
}

impl fmt::Display for PipelineWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PipelineWarning::StaleSource { reason } => write!(f, "using stale firmware source: {reason}"),
      PipelineWarning::PrimingFailed { step, reason } => write!(f, "{step} failed: {reason}"),
      PipelineWarning::MacroMissing { name } => write!(f, "macro {name} not found in config header"),
      PipelineWarning::CleanupFailed { path, reason } => {
        write!(f, "failed to remove {}: {reason}", path.display())
      }
    }
  }
}
