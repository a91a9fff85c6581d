use std::path::PathBuf;

use predicates::prelude::*;
use serial_test::serial;

use super::common::TestEnv;

#[test]
#[serial]
fn build_with_fake_platformio() {
  let env = TestEnv::with_platformio();

  let result = env.build_json();

  assert_eq!(result["tool_name"], "platformio");
  assert_eq!(result["board"], "esp32dev");
  assert_eq!(result["binary_size"], "firmware-image".len());

  let workspace = PathBuf::from(result["workspace"].as_str().unwrap());
  assert!(workspace.starts_with(env.work_dir().join("builds")));
  let header = std::fs::read_to_string(workspace.join("include/config.h")).unwrap();
  assert!(header.contains("#define BACKEND_HOST \"10.0.0.1\""));
  assert!(header.contains("#define BACKEND_PORT 8080"));
  assert!(header.contains("#define TOKEN \"abc123\""));
  assert!(header.contains("#define STATIC_IP_ADDRESS 10, 0, 0, 5"));
  assert!(header.contains("\n#define STATIC_IP\n"));
}

#[test]
#[serial]
fn build_reports_stale_source() {
  let env = TestEnv::with_platformio();

  let result = env.build_json();

  // The seeded checkout has no real repository behind it, so the refresh
  // always fails and the build carries on with what is there.
  let warnings = result["warnings"].as_array().unwrap();
  assert!(warnings.iter().any(|w| w["kind"] == "stale_source"));
}

#[test]
#[serial]
fn build_without_toolchain_fails_and_cleans_up() {
  let env = TestEnv::new();

  env
    .build_cmd()
    .env("PATH", env.bin_dir())
    .assert()
    .failure()
    .stderr(predicate::str::contains("no build tool available"));

  let builds = env.work_dir().join("builds");
  let leftover = std::fs::read_dir(&builds).map(|d| d.count()).unwrap_or(0);
  assert_eq!(leftover, 0);
}

#[test]
#[serial]
fn compile_failure_surfaces_output() {
  let env = TestEnv::new();
  env.install_tool("pio", "#!/bin/sh\necho \"src/main.cpp:1: error: boom\" >&2\nexit 1\n");

  env
    .build_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("firmware build failed"))
    .stderr(predicate::str::contains("error: boom"));
}

#[test]
#[serial]
fn path_finds_built_binary_and_copies_it() {
  let env = TestEnv::with_platformio();
  let result = env.build_json();
  let build_id = result["build_id"].as_str().unwrap();

  env
    .fwgen_cmd()
    .args(["path", build_id])
    .assert()
    .success()
    .stdout(predicate::str::contains("firmware.bin"));

  let dest = env.temp.path().join("download.bin");
  env
    .fwgen_cmd()
    .args(["path", build_id, "--copy-to"])
    .arg(&dest)
    .assert()
    .success();
  assert_eq!(std::fs::read_to_string(&dest).unwrap(), "firmware-image");
}
