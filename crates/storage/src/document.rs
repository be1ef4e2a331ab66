use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use akahu_sync_core::MappingDocument;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mapping file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("mapping file {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("mapping file {0} does not exist")]
    NotFound(PathBuf),
}

/// Loads and saves the persisted mapping document. Single writer,
/// whole-document replace: the document is read once at process start and
/// written once at process end.
pub struct MappingStore {
    path: PathBuf,
}

impl MappingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        MappingStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document. A missing file with `generate_stub` set writes an
    /// empty stub and returns it, so the first run ever bootstraps cleanly;
    /// without it, a missing file is an error.
    pub fn load(&self, generate_stub: bool) -> Result<MappingDocument, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                if !generate_stub {
                    return Err(StoreError::NotFound(self.path.clone()));
                }
                warn!(path = %self.path.display(), "Mapping file not found - first run ever?");
                let stub = MappingDocument::default();
                self.save(&stub)?;
                info!(path = %self.path.display(), "Created stub mapping file");
                return Ok(stub);
            }
            Err(err) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source: err,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|err| StoreError::Malformed {
            path: self.path.clone(),
            source: err,
        })
    }

    /// Serializes the document and atomically replaces the file: a temp file
    /// in the destination directory is written and persisted over the target,
    /// so an interrupted run leaves the previous document authoritative. The
    /// provider ordering token is structurally absent from the serialized
    /// form.
    pub fn save(&self, document: &MappingDocument) -> Result<(), StoreError> {
        let serialized =
            serde_json::to_string_pretty(document).map_err(|err| StoreError::Malformed {
                path: self.path.clone(),
                source: err,
            })?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(serialized.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|err| StoreError::Io {
            path: self.path.clone(),
            source: err.error,
        })?;

        Ok(())
    }
}
