//! Recursive directory copy.

use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Copy `src` into a new directory `dst`, recursively.
///
/// Directories and regular files are recreated; file permissions come along
/// with [`std::fs::copy`]. Symlinks are recreated as links on Unix and
/// followed elsewhere. `dst` must not exist yet.
///
/// Returns the number of files copied.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<u64> {
  if dst.exists() {
    return Err(io::Error::new(
      io::ErrorKind::AlreadyExists,
      format!("destination already exists: {}", dst.display()),
    ));
  }

  let mut files = 0;
  for entry in WalkDir::new(src).follow_links(false) {
    let entry = entry.map_err(io::Error::other)?;
    let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dst.join(relative);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      std::fs::create_dir_all(&target)?;
    } else if file_type.is_symlink() {
      copy_symlink(entry.path(), &target)?;
      files += 1;
    } else {
      std::fs::copy(entry.path(), &target)?;
      files += 1;
    }
  }

  Ok(files)
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
  let points_to = std::fs::read_link(link)?;
  std::os::unix::fs::symlink(points_to, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
  if link.is_dir() {
    copy_dir_all(link, target).map(|_| ())
  } else {
    std::fs::copy(link, target).map(|_| ())
  }
}
