//! Inbound build request.
//!
//! Network identity fields are opaque strings. Nothing here checks that an
//! address is reachable or even well formed; that is a runtime concern of
//! the device, not of the build.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::DEFAULT_BACKEND_PORT;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
  #[error("missing required field '{0}'")]
  MissingField(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
  /// Static IP address assigned to the device.
  #[serde(default)]
  pub ip: String,
  /// Backend host the device reports to.
  #[serde(default)]
  pub host_ip: String,
  #[serde(default)]
  pub host_ssid: String,
  #[serde(default)]
  pub host_pass: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub port: Option<u16>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub protocol: Option<String>,
  /// Device authentication token.
  #[serde(default)]
  pub token: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub device_name: Option<String>,
  /// Preferred toolchain key, e.g. `platformio` or `arduino-cli`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build_tool: Option<String>,
  /// Board identifier, e.g. the FQBN `esp32:esp32:esp32`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub board_fqbn: Option<String>,
}

impl BuildRequest {
  /// Parse a request from its JSON form. Missing fields are left empty.
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  /// Reject requests missing any required field.
  ///
  /// The pipeline itself does not call this; it is the transport's job to
  /// refuse incomplete requests before a build starts.
  pub fn validate(&self) -> Result<(), RequestError> {
    let required = [
      ("ip", &self.ip),
      ("host_ip", &self.host_ip),
      ("host_ssid", &self.host_ssid),
      ("host_pass", &self.host_pass),
      ("token", &self.token),
    ];
    for (name, value) in required {
      if value.trim().is_empty() {
        return Err(RequestError::MissingField(name));
      }
    }
    Ok(())
  }

  /// Backend port, defaulting to 8080 when absent or zero.
  pub fn backend_port(&self) -> u16 {
    match self.port {
      Some(port) if port > 0 => port,
      _ => DEFAULT_BACKEND_PORT,
    }
  }

  pub fn preferred_tool(&self) -> Option<&str> {
    non_empty(self.build_tool.as_deref())
  }

  pub fn board(&self) -> Option<&str> {
    non_empty(self.board_fqbn.as_deref())
  }

  /// Device name as given; only a blank name counts as absent.
  pub fn device_name(&self) -> Option<&str> {
    self.device_name.as_deref().filter(|v| !v.trim().is_empty())
  }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
  value.map(str::trim).filter(|v| !v.is_empty())
}
