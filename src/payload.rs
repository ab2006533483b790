// Payload resolution: turn a source path into the bytes + filename that
// will be POSTed. Files are read as-is; directories are handed to the
// external `zip` utility and the resulting archive is read back.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// The binary content and filename of one upload. Produced exactly once per
/// run and consumed exactly once by the uploader.
#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

impl Payload {
    /// Read a regular file as a payload; the filename is the file's base
    /// name.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::InvalidSource(path.to_path_buf()))?
            .to_string();
        Ok(Payload { bytes, file_name })
    }
}

/// Resolve a source path into a [`Payload`].
///
/// A regular file is used directly. A directory is compressed into a single
/// archive inside `temp_dir` first; the temp file is left on disk for the
/// surrounding environment to clean up. Anything else fails with
/// [`Error::InvalidSource`].
pub fn resolve(source_path: &Path, temp_dir: &Path) -> Result<Payload> {
    let meta = std::fs::metadata(source_path)
        .map_err(|_| Error::InvalidSource(source_path.to_path_buf()))?;

    if meta.is_file() {
        Payload::from_file(source_path)
    } else if meta.is_dir() {
        let archive = archive_directory(source_path, temp_dir)?;
        info!(
            source = %source_path.display(),
            archive = %archive.display(),
            "zipped directory"
        );
        Payload::from_file(&archive)
    } else {
        Err(Error::InvalidSource(source_path.to_path_buf()))
    }
}

/// A temp-directory archive name unique per invocation. The timestamp keeps
/// concurrent runs apart; the process-local counter keeps two resolutions in
/// the same millisecond apart.
pub fn unique_archive_name() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("payload-{millis}-{seq}.zip")
}

fn archive_directory(dir: &Path, temp_dir: &Path) -> Result<PathBuf> {
    let archive = temp_dir.join(unique_archive_name());
    let output = Command::new("zip")
        .arg("-r")
        .arg(&archive)
        .arg(".")
        .current_dir(dir)
        .output()
        .map_err(|e| Error::Archive {
            path: dir.to_path_buf(),
            detail: format!("could not run zip: {e}"),
        })?;

    if !output.status.success() {
        return Err(Error::Archive {
            path: dir.to_path_buf(),
            detail: format!(
                "zip exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(archive)
}
