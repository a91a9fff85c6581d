//! Cancellable subprocess execution.
//!
//! Every external tool the pipeline touches (git, compilers, package
//! installers, flashing utilities) runs through [`run`]. A call returns the
//! exit code and the combined stdout/stderr of the child; a non-zero exit is
//! not an error at this level, callers decide what it means.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Number of trailing characters of tool output carried in error messages.
pub const OUTPUT_TAIL_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("failed to start '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to wait for '{program}': {source}")]
  Wait {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("'{program}' was cancelled")]
  Cancelled { program: String },
}

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
  /// Exit code, `None` if the process was killed by a signal.
  pub code: Option<i32>,
  /// Stdout followed by stderr.
  pub output: String,
}

impl ProcessOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }

  /// Last [`OUTPUT_TAIL_CHARS`] characters of the output.
  pub fn tail(&self) -> &str {
    tail_chars(&self.output, OUTPUT_TAIL_CHARS)
  }
}

/// An executable plus arguments that precede every invocation.
///
/// Usually just a program name resolved on the search path. Leading
/// arguments let an interpreter front a script, e.g. `python3 espota.py`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
  program: PathBuf,
  leading_args: Vec<OsString>,
}

impl ToolCommand {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      leading_args: Vec::new(),
    }
  }

  pub fn with_args<I, S>(program: impl Into<PathBuf>, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
  {
    Self {
      program: program.into(),
      leading_args: args.into_iter().map(Into::into).collect(),
    }
  }

  pub fn program(&self) -> &Path {
    &self.program
  }

  /// Start a [`Command`] for this tool with the leading arguments applied.
  pub fn command(&self) -> Command {
    let mut command = Command::new(&self.program);
    command.args(&self.leading_args);
    command
  }
}

/// Run a command to completion, or until `cancel` fires.
///
/// On cancellation the child is killed and [`ProcessError::Cancelled`] is
/// returned without waiting for the tool to notice.
pub async fn run(mut command: Command, cancel: &CancellationToken) -> Result<ProcessOutput, ProcessError> {
  let program = command.as_std().get_program().to_string_lossy().into_owned();

  if cancel.is_cancelled() {
    return Err(ProcessError::Cancelled { program });
  }

  command
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  debug!(program = %program, args = ?command.as_std().get_args().collect::<Vec<_>>(), "spawning process");

  let child = command.spawn().map_err(|source| ProcessError::Spawn {
    program: program.clone(),
    source,
  })?;

  // Dropping the wait future drops the child, and kill_on_drop reaps it.
  let output = tokio::select! {
    biased;
    _ = cancel.cancelled() => {
      debug!(program = %program, "process cancelled");
      return Err(ProcessError::Cancelled { program });
    }
    result = child.wait_with_output() => result.map_err(|source| ProcessError::Wait {
      program: program.clone(),
      source,
    })?,
  };

  let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
  let stderr = String::from_utf8_lossy(&output.stderr);
  if !stderr.is_empty() {
    if !combined.is_empty() && !combined.ends_with('\n') {
      combined.push('\n');
    }
    combined.push_str(&stderr);
  }

  let code = output.status.code();
  debug!(program = %program, code = ?code, "process finished");

  Ok(ProcessOutput { code, output: combined })
}

/// Trailing `max_chars` characters of `s`, split on a char boundary.
pub fn tail_chars(s: &str, max_chars: usize) -> &str {
  match s.char_indices().rev().nth(max_chars.saturating_sub(1)) {
    Some((idx, _)) if max_chars > 0 => &s[idx..],
    _ if max_chars == 0 => "",
    _ => s,
  }
}
