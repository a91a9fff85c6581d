//! Shared helpers for pipeline tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use fwgen_lib::process::ToolCommand;
use fwgen_lib::source::SourceRepository;
use fwgen_lib::toolchain::{BuildResult, BuildStrategy, StrategyRegistry, ToolchainError, UploadResult};
use fwgen_lib::{BuildRequest, Pipeline, PipelineConfig};

pub const CONFIG_TEMPLATE: &str = r#"#ifndef CONFIG_H
#define CONFIG_H

// #define USE_GO_BACKEND

#ifdef USE_HOTSPOT
  #define WIFI_SSID "hotspot"
  #define WIFI_PASSWORD "hotspot-pass"
  #define BACKEND_HOST "192.168.4.2"
#else
  #define WIFI_SSID "home"
  #define WIFI_PASSWORD "home-pass"
  #define BACKEND_HOST "192.168.4.1"
#endif

#define BACKEND_PORT 80
#define TOKEN "changeme"
#define DEVICE_NAME "esp32-device"

// #define STATIC_IP
#define STATIC_IP_ADDRESS 192, 168, 1, 100

#endif
"#;

/// The request used throughout the lab scenario.
pub fn lab_request() -> BuildRequest {
  BuildRequest {
    ip: "10.0.0.5".to_string(),
    host_ip: "10.0.0.1".to_string(),
    host_ssid: "lab-net".to_string(),
    host_pass: "secret".to_string(),
    port: Some(8080),
    token: "abc123".to_string(),
    ..Default::default()
  }
}

/// How the scripted toolchain behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
  Succeed,
  FailCompile,
  EmitNothing,
  FailUpload,
  /// Sleep until cancelled.
  Hang,
}

/// A toolchain that writes a binary without compiling anything.
///
/// Every workspace it sees is recorded, together with the config header as
/// it was at build time.
#[derive(Clone)]
pub struct ScriptedStrategy {
  pub name: &'static str,
  pub available: bool,
  pub behavior: Behavior,
  pub seen: Arc<Mutex<Vec<(PathBuf, String)>>>,
}

impl ScriptedStrategy {
  pub fn new(name: &'static str, behavior: Behavior) -> Self {
    Self {
      name,
      available: true,
      behavior,
      seen: Arc::new(Mutex::new(Vec::new())),
    }
  }

  pub fn seen(&self) -> Vec<(PathBuf, String)> {
    self.seen.lock().unwrap().clone()
  }
}

#[async_trait]
impl BuildStrategy for ScriptedStrategy {
  fn name(&self) -> &str {
    self.name
  }

  fn is_available(&self) -> bool {
    self.available
  }

  async fn build(&self, cancel: &CancellationToken, dir: &Path) -> Result<BuildResult, ToolchainError> {
    let header = std::fs::read_to_string(dir.join("include/config.h")).unwrap();
    self.seen.lock().unwrap().push((dir.to_path_buf(), header));

    match self.behavior {
      Behavior::FailCompile => {
        return Err(ToolchainError::CompileFailed {
          tool: self.name.to_string(),
          code: Some(1),
          tail: "error: 'WIFI_SSID' was not declared".to_string(),
        });
      }
      Behavior::EmitNothing => {
        return Err(ToolchainError::ArtifactNotFound {
          dir: self.artifact_dir(dir),
          extension: "bin".to_string(),
        });
      }
      Behavior::Hang => {
        tokio::select! {
          _ = cancel.cancelled() => {
            return Err(ToolchainError::Cancelled { tool: self.name.to_string() });
          }
          _ = tokio::time::sleep(Duration::from_secs(60)) => unreachable!("build was never cancelled"),
        }
      }
      Behavior::Succeed | Behavior::FailUpload => {}
    }

    // Simulated compile time, so concurrent builds overlap.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let out = self.artifact_dir(dir);
    std::fs::create_dir_all(&out).unwrap();
    let binary = out.join("fw.ino.bin");
    std::fs::write(&binary, b"firmware").unwrap();

    Ok(BuildResult {
      binary_path: binary,
      board: "esp32:esp32:esp32".to_string(),
      size: 8,
      warnings: Vec::new(),
    })
  }

  async fn upload(
    &self,
    _cancel: &CancellationToken,
    dir: &Path,
    target: &str,
  ) -> Result<UploadResult, ToolchainError> {
    assert!(dir.exists(), "workspace removed before upload");
    if self.behavior == Behavior::FailUpload {
      return Err(ToolchainError::UploadFailed {
        tool: self.name.to_string(),
        code: Some(2),
        tail: "No response from the ESP".to_string(),
      });
    }
    Ok(UploadResult {
      tool: self.name.to_string(),
      target: target.to_string(),
      binary_path: Some(self.artifact_dir(dir).join("fw.ino.bin")),
      warnings: Vec::new(),
    })
  }

  fn artifact_dir(&self, workspace: &Path) -> PathBuf {
    workspace.join("build").join("out")
  }
}

/// A work dir with a seeded checkout and a pipeline over `strategies`.
pub struct TestPipeline {
  pub temp: TempDir,
  pub pipeline: Pipeline,
}

impl TestPipeline {
  pub fn new(strategies: &[ScriptedStrategy]) -> Self {
    let temp = TempDir::new().unwrap();
    let config = PipelineConfig::default()
      .with_work_dir(temp.path().join("work"))
      .with_repo_url("/nonexistent/firmware.git");

    let checkout = config.source_dir();
    std::fs::create_dir_all(checkout.join(".git")).unwrap();
    std::fs::create_dir_all(checkout.join("include")).unwrap();
    std::fs::write(checkout.join("include/config.h"), CONFIG_TEMPLATE).unwrap();

    let mut registry = StrategyRegistry::empty();
    for strategy in strategies {
      let strategy = strategy.clone();
      registry.register(strategy.name, move |_| Box::new(strategy.clone()));
    }

    // No git behind the seeded checkout: every refresh is stale.
    let source = SourceRepository::new(&config).with_git(ToolCommand::new("/nonexistent/git-12345"));
    let pipeline = Pipeline::new(config).with_source(source).with_registry(registry);
    Self { temp, pipeline }
  }

  pub fn builds_dir(&self) -> PathBuf {
    self.pipeline.config().builds_dir()
  }

  /// Number of workspaces currently on disk.
  pub fn workspace_count(&self) -> usize {
    std::fs::read_dir(self.builds_dir()).map(|d| d.count()).unwrap_or(0)
  }

  pub fn source_header(&self) -> String {
    std::fs::read_to_string(self.pipeline.config().source_dir().join("include/config.h")).unwrap()
  }
}
