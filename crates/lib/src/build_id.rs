//! Build identifiers.
//!
//! A build id names the workspace directory of one build, so it must be
//! unique among builds running in this process and safe to use as a single
//! path component.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const RANDOM_BYTES: usize = 8;

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildIdError {
  #[error("build id is empty")]
  Empty,

  #[error("invalid build id '{0}': only ASCII letters, digits, '-' and '_' are allowed")]
  InvalidCharacters(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BuildId(String);

impl BuildId {
  /// Generate a fresh id: `<unix-millis>-<pid>-<16 hex chars>`.
  ///
  /// The suffix comes from the OS random source. If that is unavailable the
  /// suffix is derived from a process-wide counter instead, which keeps ids
  /// unique within this process but not across restarts.
  pub fn generate() -> Self {
    let millis = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_millis();
    let pid = std::process::id();

    let mut bytes = [0u8; RANDOM_BYTES];
    let suffix = match OsRng.try_fill_bytes(&mut bytes) {
      Ok(()) => to_hex(&bytes),
      Err(e) => {
        warn!(error = %e, "OS random source unavailable, using counter-based build id");
        fallback_suffix()
      }
    };

    BuildId(format!("{millis}-{pid}-{suffix}"))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

fn to_hex(bytes: &[u8]) -> String {
  bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn fallback_suffix() -> String {
  let n = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
  format!("{n:0width$x}", width = RANDOM_BYTES * 2)
}

impl FromStr for BuildId {
  type Err = BuildIdError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.is_empty() {
      return Err(BuildIdError::Empty);
    }
    if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
      return Err(BuildIdError::InvalidCharacters(s.to_string()));
    }
    Ok(BuildId(s.to_string()))
  }
}

impl TryFrom<String> for BuildId {
  type Error = BuildIdError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<BuildId> for String {
  fn from(id: BuildId) -> Self {
    id.0
  }
}

impl fmt::Display for BuildId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}
