//! Test utilities for fwgen-lib.
//!
//! A firmware template shaped like the real one, and helpers for faking
//! toolchains with small shell scripts.

use std::path::{Path, PathBuf};

use crate::consts::{CONFIG_HEADER, MAIN_SOURCE};

/// Config header with every macro the templating engine knows about.
///
/// `BACKEND_HOST`, `WIFI_SSID` and `WIFI_PASSWORD` are defined in both
/// branches of an `#ifdef` so single/multi definition handling is visible.
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

pub const MAIN_TEMPLATE: &str = "#include \"config.h\"\nvoid setup() {}\nvoid loop() {}\n";

/// Write the config header and main source under `root`.
pub fn write_template(root: &Path) {
  write_file(&root.join(CONFIG_HEADER), CONFIG_TEMPLATE);
  write_file(&root.join(MAIN_SOURCE), MAIN_TEMPLATE);
}

pub fn write_file(path: &Path, content: &str) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
}

/// Write a `/bin/sh` script standing in for a toolchain executable.
///
/// The script is run as `/bin/sh <script> ...` rather than executed
/// directly, so it needs no exec bit.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  let path = dir.join(name);
  write_file(&path, &format!("set -e\n{body}\n"));
  path
}
