//! Shared test helpers for CLI integration tests.
//!
//! Builds run against a pre-seeded source checkout and a fake `pio` on
//! `PATH`, so no network or real toolchain is needed.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Directory name of the shared checkout under the work dir.
pub const SOURCE_DIR: &str = "esp32-firmware-source";

pub const CONFIG_TEMPLATE: &str = r#"#ifndef CONFIG_H
#define CONFIG_H
// #define USE_GO_BACKEND
#define WIFI_SSID "home"
#define WIFI_PASSWORD "home-pass"
#define BACKEND_HOST "192.168.4.1"
#define BACKEND_PORT 80
#define TOKEN "changeme"
// #define STATIC_IP
#define STATIC_IP_ADDRESS 192, 168, 1, 100
#endif
"#;

/// Fake PlatformIO: writes `.pio/build/esp32dev/firmware.bin` into the
/// project passed with `-d`.
const FAKE_PIO: &str = r#"#!/bin/sh
set -e
dir="$3"
mkdir -p "$dir/.pio/build/esp32dev"
printf 'firmware-image' > "$dir/.pio/build/esp32dev/firmware.bin"
echo "SUCCESS"
"#;

/// Isolated test environment.
///
/// Each test gets its own work dir, a seeded firmware checkout and a bin dir
/// that is put first on `PATH`.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let env = Self { temp };
    let source = env.work_dir().join(SOURCE_DIR);
    std::fs::create_dir_all(source.join(".git")).unwrap();
    write_file(&source.join("include/config.h"), CONFIG_TEMPLATE);
    write_file(&source.join("src/main.cpp"), "#include \"config.h\"\n");
    std::fs::create_dir_all(env.bin_dir()).unwrap();
    env
  }

  /// Same as [`TestEnv::new`] with a working fake `pio` installed.
  pub fn with_platformio() -> Self {
    let env = Self::new();
    env.install_tool("pio", FAKE_PIO);
    env
  }

  pub fn work_dir(&self) -> PathBuf {
    let p = self.temp.path().join("work");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn bin_dir(&self) -> PathBuf {
    self.temp.path().join("bin")
  }

  #[cfg(unix)]
  pub fn install_tool(&self, name: &str, script: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = self.bin_dir().join(name);
    write_file(&path, script);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }

  /// `fwgen` with the work dir, `PATH` and `HOME` pointed into the sandbox.
  pub fn fwgen_cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("fwgen");
    cmd
      .env("FWGEN_WORK_DIR", self.work_dir())
      .env("HOME", self.temp.path())
      .env("PATH", format!("{}:/usr/bin:/bin", self.bin_dir().display()))
      .env_remove("RUST_LOG");
    cmd
  }

  /// `fwgen build` with a complete lab request.
  pub fn build_cmd(&self) -> Command {
    let mut cmd = self.fwgen_cmd();
    cmd.args([
      "build",
      "--ip",
      "10.0.0.5",
      "--host",
      "10.0.0.1",
      "--port",
      "8080",
      "--ssid",
      "lab-net",
      "--password",
      "secret",
      "--token",
      "abc123",
      "-o",
      "json",
    ]);
    cmd
  }

  /// Run a JSON build and return its parsed result.
  pub fn build_json(&self) -> serde_json::Value {
    let output = self.build_cmd().output().unwrap();
    assert!(
      output.status.success(),
      "build failed: {}",
      String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
  }
}

pub fn write_file(path: &Path, content: &str) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
}
