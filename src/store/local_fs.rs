use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::ota::{fingerprint_file, Fingerprint, FingerprintError};

use super::{validate_segment, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum DataDirError {
    #[error("data-dir stat failed for {path:?}: {source}")]
    Stat { path: PathBuf, source: io::Error },
    #[error("data-dir is not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },
}

/// Absolute, validated root of the firmware tree.
///
/// Constructed once at startup; the process refuses to start without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir(PathBuf);

impl DataDir {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DataDirError> {
        let path = path.as_ref();
        let canonical = std::fs::canonicalize(path).map_err(|source| DataDirError::Stat {
            path: path.to_path_buf(),
            source,
        })?;

        let meta = std::fs::metadata(&canonical).map_err(|source| DataDirError::Stat {
            path: canonical.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(DataDirError::NotADirectory { path: canonical });
        }

        Ok(Self(canonical))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Whether the root still exists and is a directory.
    pub fn is_ready(&self) -> bool {
        std::fs::metadata(&self.0)
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }
}

/// A firmware file opened for serving.
#[derive(Debug)]
pub struct OpenedFirmware {
    pub path: PathBuf,
    pub file: File,
    pub fingerprint: Fingerprint,
}

/// Local filesystem firmware store rooted at a [`DataDir`].
///
/// Every call re-reads the file; nothing is cached between requests.
#[derive(Debug, Clone)]
pub struct FirmwareStore {
    root: DataDir,
}

impl FirmwareStore {
    pub fn new(root: DataDir) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &DataDir {
        &self.root
    }

    pub fn resolve(&self, project: &str, file: &str) -> Result<PathBuf, StoreError> {
        validate_segment(project)?;
        validate_segment(file)?;
        Ok(self.root.path().join(project).join(file))
    }

    /// Open and fingerprint `<root>/<project>/<file>`.
    ///
    /// This does blocking I/O; async callers should run it on the blocking pool.
    pub fn open(&self, project: &str, file: &str) -> Result<OpenedFirmware, StoreError> {
        let path = self.resolve(project, file)?;
        let opened = fingerprint_file(&path)?;
        Ok(OpenedFirmware {
            path,
            file: opened.file,
            fingerprint: opened.fingerprint,
        })
    }
}

impl From<FingerprintError> for StoreError {
    fn from(err: FingerprintError) -> Self {
        match err {
            FingerprintError::NotFound => StoreError::NotFound,
            FingerprintError::Io(err) => StoreError::Io(err),
        }
    }
}
