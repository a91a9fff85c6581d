//! Fixed names and locations shared across the pipeline.

/// Application name, used for cache and work directories.
pub const APP_NAME: &str = "fwgen";

/// Canonical firmware template repository.
pub const DEFAULT_REPO_URL: &str =
  "https://github.com/aruncs31s/Kannur-Solar-Battery-Monitoring-System-Microcontroller-Codes.git";

/// Directory name of the shared checkout under the work directory.
pub const DEFAULT_REPO_NAME: &str = "esp32-firmware-source";

/// Directory under the work directory holding per-build workspaces.
pub const BUILDS_DIR: &str = "builds";

/// Configuration header rewritten for every build, relative to the workspace.
pub const CONFIG_HEADER: &str = "include/config.h";

/// Primary firmware source file, relative to the workspace.
pub const MAIN_SOURCE: &str = "src/main.cpp";

/// Backend port used when a request does not carry one.
pub const DEFAULT_BACKEND_PORT: u16 = 8080;

/// Environment variable overriding the work directory.
pub const WORK_DIR_ENV: &str = "FWGEN_WORK_DIR";

/// Environment variable overriding the template repository URL.
pub const REPO_URL_ENV: &str = "FWGEN_REPO_URL";
