//! Utility functions for output path handling

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Get the path to write to, handling an existing file according to `action`
///
/// # Returns
///
/// For `Overwrite` and `Append`, the original path. For `Refuse`, the original
/// path if nothing exists there yet. For `Rename`, the first free
/// `stem (N).ext` next to the original.
///
/// # Examples
///
/// ```
/// use intelligence_report_dl::utils::get_unique_path;
/// use intelligence_report_dl::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/report.csv");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// // If /tmp/report.csv exists, returns /tmp/report (1).csv
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf> {
    match action {
        FileCollisionAction::Overwrite | FileCollisionAction::Append => Ok(path.to_path_buf()),
        FileCollisionAction::Refuse => {
            if path.exists() {
                return Err(Error::OutputExists {
                    path: path.to_path_buf(),
                });
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| invalid_path(path, "cannot extract file stem"))?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path
                .parent()
                .ok_or_else(|| invalid_path(path, "cannot extract parent directory"))?;

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(new_path);
                }
            }

            Err(Error::OutputExists {
                path: path.to_path_buf(),
            })
        }
    }
}

/// Directory a temporary sibling of `path` should be created in
///
/// A bare file name has an empty parent, which means the working directory.
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn invalid_path(path: &Path, reason: &str) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("invalid output path {}: {}", path.display(), reason),
    ))
}
