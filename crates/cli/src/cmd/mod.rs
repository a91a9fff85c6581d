mod build;
mod clean;
mod path;
mod tools;
mod upload;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use path::cmd_path;
pub use tools::cmd_tools;
pub use upload::cmd_upload;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use fwgen_lib::BuildRequest;

/// Device configuration, from a JSON file and/or flags. Flags win.
#[derive(Debug, Clone, Default, Args)]
pub struct RequestArgs {
  /// JSON file with the build request
  #[arg(short, long, value_name = "FILE")]
  pub request: Option<PathBuf>,

  /// Static IP address of the device
  #[arg(long)]
  pub ip: Option<String>,

  /// Backend host the device reports to
  #[arg(long, value_name = "HOST")]
  pub host: Option<String>,

  /// Backend port [default: 8080]
  #[arg(long)]
  pub port: Option<u16>,

  /// Backend protocol
  #[arg(long)]
  pub protocol: Option<String>,

  /// WiFi network name
  #[arg(long)]
  pub ssid: Option<String>,

  /// WiFi password
  #[arg(long)]
  pub password: Option<String>,

  /// Device authentication token
  #[arg(long)]
  pub token: Option<String>,

  /// Device name
  #[arg(long)]
  pub device_name: Option<String>,

  /// Preferred build tool (platformio, arduino-cli)
  #[arg(long, value_name = "TOOL")]
  pub tool: Option<String>,

  /// Board identifier (FQBN or PlatformIO environment)
  #[arg(long)]
  pub board: Option<String>,

  /// Cancel the build after this long, e.g. "10m"
  #[arg(long, value_name = "DURATION")]
  pub timeout: Option<humantime::Duration>,
}

impl RequestArgs {
  /// Assemble and validate the build request.
  pub fn load(&self) -> Result<BuildRequest> {
    let mut request = match &self.request {
      Some(path) => {
        let content =
          std::fs::read_to_string(path).with_context(|| format!("Failed to read request file {}", path.display()))?;
        BuildRequest::from_json(&content).with_context(|| format!("Failed to parse request file {}", path.display()))?
      }
      None => BuildRequest::default(),
    };

    let overrides = [
      (&self.ip, &mut request.ip),
      (&self.host, &mut request.host_ip),
      (&self.ssid, &mut request.host_ssid),
      (&self.password, &mut request.host_pass),
      (&self.token, &mut request.token),
    ];
    for (flag, field) in overrides {
      if let Some(value) = flag {
        *field = value.clone();
      }
    }

    if self.port.is_some() {
      request.port = self.port;
    }
    let optional = [
      (&self.protocol, &mut request.protocol),
      (&self.device_name, &mut request.device_name),
      (&self.tool, &mut request.build_tool),
      (&self.board, &mut request.board_fqbn),
    ];
    for (flag, field) in optional {
      if flag.is_some() {
        *field = flag.clone();
      }
    }

    request.validate().context("Invalid build request")?;
    Ok(request)
  }

  /// Token cancelled by Ctrl-C or once the timeout elapses.
  pub fn cancellation(&self) -> CancellationToken {
    let cancel = CancellationToken::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, cancelling build");
        on_signal.cancel();
      }
    });

    if let Some(timeout) = &self.timeout {
      let on_timeout = cancel.clone();
      let duration = **timeout;
      tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        warn!(timeout = %humantime::format_duration(duration), "build timed out, cancelling");
        on_timeout.cancel();
      });
    }

    cancel
  }
}
