//! Locating compiled binaries.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::ToolchainError;

/// Name fragments of images a toolchain emits next to the application binary.
const AUXILIARY_MARKERS: &[&str] = &["bootloader", "partitions", "merged", "boot_app0"];

/// Find the binary a build produced under `dir`.
///
/// Files are visited in lexicographic order. The first file named in
/// `preferred` wins, then the first one that is not an auxiliary image
/// (bootloader, partition table, ...), then the first matching file at all.
pub fn discover_artifact(dir: &Path, extension: &str, preferred: &[&str]) -> Result<PathBuf, ToolchainError> {
  let candidates: Vec<PathBuf> = WalkDir::new(dir)
    .follow_links(false)
    .sort_by_file_name()
    .into_iter()
    .filter_map(|entry| entry.ok())
    .filter(|entry| entry.file_type().is_file())
    .map(|entry| entry.into_path())
    .filter(|path| path.extension().is_some_and(|ext| ext == extension))
    .collect();

  debug!(dir = %dir.display(), count = candidates.len(), "artifact candidates");

  let by_name = candidates
    .iter()
    .find(|path| file_name(path).is_some_and(|name| preferred.contains(&name)));
  let primary = || candidates.iter().find(|path| !is_auxiliary(path));

  by_name
    .or_else(primary)
    .or_else(|| candidates.first())
    .cloned()
    .ok_or_else(|| ToolchainError::ArtifactNotFound {
      dir: dir.to_path_buf(),
      extension: extension.to_string(),
    })
}

fn file_name(path: &Path) -> Option<&str> {
  path.file_name().and_then(|name| name.to_str())
}

fn is_auxiliary(path: &Path) -> bool {
  let Some(name) = file_name(path) else {
    return false;
  };
  let name = name.to_ascii_lowercase();
  AUXILIARY_MARKERS.iter().any(|marker| name.contains(marker))
}
