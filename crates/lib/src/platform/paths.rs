use crate::consts::{APP_NAME, WORK_DIR_ENV};
use std::path::PathBuf;

/// Returns the user's home directory
///
/// Falls back to the system temp directory when no home is configured,
/// which is the case for some service accounts.
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var("USERPROFILE")
    .map(PathBuf::from)
    .unwrap_or_else(|_| std::env::temp_dir())
}

/// Returns the user's home directory
///
/// Falls back to the system temp directory when no home is configured,
/// which is the case for some service accounts.
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| std::env::temp_dir())
}

/// Returns the directory for cache files for the application
#[cfg(windows)]
pub fn cache_dir() -> PathBuf {
  std::env::var("LOCALAPPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join("AppData").join("Local"))
    .join(APP_NAME)
    .join("Cache")
}

/// Returns the directory for cache files for the application
#[cfg(not(windows))]
pub fn cache_dir() -> PathBuf {
  let cache_home = std::env::var("XDG_CACHE_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".cache"));
  cache_home.join(APP_NAME)
}

/// Returns the base directory holding the shared checkout and build workspaces.
///
/// `FWGEN_WORK_DIR` takes precedence over the cache directory.
pub fn work_dir() -> PathBuf {
  if let Ok(path) = std::env::var(WORK_DIR_ENV)
    && !path.is_empty()
  {
    return PathBuf::from(path);
  }
  cache_dir()
}
