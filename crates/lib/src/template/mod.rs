//! Config header templating.
//!
//! Rewrites `include/config.h` in a build workspace so the firmware talks to
//! the requested backend over the requested WiFi network. Every rewrite is a
//! value-independent match-and-replace on `#define` lines, which makes
//! [`apply_config`] idempotent: running it twice with the same request gives
//! the same bytes as running it once.

pub mod macros;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::consts::CONFIG_HEADER;
use crate::request::BuildRequest;
use crate::warning::PipelineWarning;

use macros::{c_string, ip_to_octets, replace_all, replace_first, uncomment};

/// Macro enabling the static IP configuration block.
pub const STATIC_IP_ENABLE: &str = "STATIC_IP";
/// Macro selecting this system's backend protocol in the firmware.
pub const BACKEND_SELECT: &str = "USE_GO_BACKEND";

#[derive(Debug, Error)]
pub enum TemplateError {
  #[error("config header not found at '{0}'")]
  ConfigNotFound(PathBuf),

  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid macro pattern: {0}")]
  Pattern(#[from] regex::Error),
}

/// How many `#define` lines of a macro get rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occurrence {
  First,
  Every,
}

/// What [`apply_config`] did to the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
  pub config_path: PathBuf,
  /// Macros whose definitions were rewritten.
  pub applied: Vec<&'static str>,
  /// Macros the request had a value for but the template does not define.
  pub missing: Vec<&'static str>,
  /// Whether the file content changed.
  pub changed: bool,
}

impl ApplyReport {
  pub fn warnings(&self) -> Vec<PipelineWarning> {
    self
      .missing
      .iter()
      .map(|name| PipelineWarning::MacroMissing { name: name.to_string() })
      .collect()
  }
}

/// Rewrite the workspace's config header with the request's values.
///
/// Fields that are empty in the request are left as the template has them.
/// A macro the template does not define is skipped and listed in
/// [`ApplyReport::missing`].
pub async fn apply_config(workspace: &Path, request: &BuildRequest) -> Result<ApplyReport, TemplateError> {
  let config_path = workspace.join(CONFIG_HEADER);

  let original = match fs::read_to_string(&config_path).await {
    Ok(content) => content,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      return Err(TemplateError::ConfigNotFound(config_path));
    }
    Err(source) => {
      return Err(TemplateError::Read {
        path: config_path,
        source,
      });
    }
  };

  let mut report = ApplyReport {
    config_path: config_path.clone(),
    ..Default::default()
  };
  let content = render(&original, request, &mut report)?;
  report.changed = content != original;

  if !report.changed {
    warn!(path = %config_path.display(), "no changes were made to config header");
  }
  for name in &report.missing {
    warn!(name, "macro not defined in config header, skipping");
  }

  fs::write(&config_path, &content)
    .await
    .map_err(|source| TemplateError::Write {
      path: config_path.clone(),
      source,
    })?;

  info!(
    path = %config_path.display(),
    backend_host = %request.host_ip,
    backend_port = request.backend_port(),
    wifi_ssid = %request.host_ssid,
    device_ip = %request.ip,
    "config applied"
  );

  Ok(report)
}

/// Apply every rewrite to `content` in memory.
fn render(content: &str, request: &BuildRequest, report: &mut ApplyReport) -> Result<String, TemplateError> {
  let mut content = content.to_string();

  let port = request.backend_port().to_string();
  let quoted_host = quoted(&request.host_ip);
  let quoted_token = quoted(&request.token);
  let quoted_ssid = quoted(&request.host_ssid);
  let quoted_pass = quoted(&request.host_pass);
  let octets = ip_to_octets(request.ip.trim());
  let quoted_name = request.device_name().map(c_string);

  let rewrites: [(&'static str, Option<&str>, Occurrence); 7] = [
    ("BACKEND_HOST", quoted_host.as_deref(), Occurrence::First),
    ("BACKEND_PORT", Some(port.as_str()), Occurrence::First),
    ("TOKEN", quoted_token.as_deref(), Occurrence::First),
    // WiFi credentials may be defined once per conditional branch.
    ("WIFI_SSID", quoted_ssid.as_deref(), Occurrence::Every),
    ("WIFI_PASSWORD", quoted_pass.as_deref(), Occurrence::Every),
    ("STATIC_IP_ADDRESS", octets.as_deref(), Occurrence::Every),
    ("DEVICE_NAME", quoted_name.as_deref(), Occurrence::First),
  ];

  for (name, value, occurrence) in rewrites {
    let Some(value) = value else {
      continue;
    };
    let rewritten = match occurrence {
      Occurrence::First => replace_first(&content, name, value)?,
      Occurrence::Every => replace_all(&content, name, value)?,
    };
    match rewritten {
      Some(updated) => {
        debug!(name, "rewrote macro");
        content = updated;
        report.applied.push(name);
      }
      None => report.missing.push(name),
    }
  }

  if octets.is_some() {
    content = uncomment(&content, STATIC_IP_ENABLE)?;
  }
  content = uncomment(&content, BACKEND_SELECT)?;

  Ok(content)
}

/// Blank fields keep the template value. Anything else is used verbatim,
/// surrounding whitespace included.
fn non_empty(value: &str) -> Option<&str> {
  (!value.trim().is_empty()).then_some(value)
}

fn quoted(value: &str) -> Option<String> {
  non_empty(value).map(c_string)
}
