// Artifact store seam: fetch a previously published build output by name
// and use its single extracted file as the payload. The store itself is an
// external collaborator; the binary wires in a runner-local directory
// implementation.

use crate::error::{Error, Result};
use crate::payload::Payload;
use std::path::{Path, PathBuf};
use tracing::info;

/// Handle to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub id: String,
}

/// Result of extracting an artifact into a local directory.
#[derive(Debug, Clone)]
pub struct DownloadedArtifact {
    pub download_path: PathBuf,
}

/// Contract of the artifact storage collaborator.
pub trait ArtifactStore {
    /// Look up an artifact by name. Fails with [`Error::NotFound`] when the
    /// name is unknown.
    fn get_artifact(&self, name: &str) -> Result<ArtifactRecord>;

    /// Extract the artifact's single file into `dest_dir`.
    fn download_artifact(&self, id: &str, dest_dir: &Path) -> Result<DownloadedArtifact>;
}

/// Download a named artifact and read its single file as the payload.
/// Fails with [`Error::NotFound`] when the artifact is absent or the
/// download directory turns out empty.
pub fn payload_from_artifact(
    store: &dyn ArtifactStore,
    name: &str,
    dest_dir: &Path,
) -> Result<Payload> {
    let record = store.get_artifact(name)?;
    let downloaded = store.download_artifact(&record.id, dest_dir)?;

    let file = single_file_in(&downloaded.download_path)?
        .ok_or_else(|| Error::NotFound(format!("{name} (download was empty)")))?;
    info!(artifact = name, file = %file.display(), "downloaded artifact");
    Payload::from_file(&file)
}

fn single_file_in(dir: &Path) -> Result<Option<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files.into_iter().next())
}

/// Directory-backed store used by the binary: each artifact is a
/// subdirectory of `root` named after the artifact, holding the file the
/// pipeline published.
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalArtifactStore { root: root.into() }
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn get_artifact(&self, name: &str) -> Result<ArtifactRecord> {
        let dir = self.root.join(name);
        if dir.is_dir() {
            Ok(ArtifactRecord { id: name.to_string() })
        } else {
            Err(Error::NotFound(name.to_string()))
        }
    }

    fn download_artifact(&self, id: &str, dest_dir: &Path) -> Result<DownloadedArtifact> {
        let src_dir = self.root.join(id);
        let file = single_file_in(&src_dir)?.ok_or_else(|| Error::NotFound(id.to_string()))?;
        let dest = dest_dir.join(file.file_name().unwrap_or_default());
        std::fs::copy(&file, &dest)?;
        Ok(DownloadedArtifact {
            download_path: dest_dir.to_path_buf(),
        })
    }
}
