//! Persistence backends for the revision store.
//!
//! A backend only needs two operations: load every document at startup, and
//! atomically replace one document's ordered revision list.

use crate::error::BackendError;
use revwiki_types::{DocName, Revision};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A document as read back from storage
#[derive(Debug, Clone, Deserialize)]
pub struct StoredDocument {
    pub name: DocName,
    pub revisions: Vec<Revision>,
}

#[derive(Serialize)]
struct StoredDocumentRef<'a> {
    name: &'a DocName,
    revisions: Vec<&'a Revision>,
}

/// Durable keyed storage for documents
pub trait Backend: Send + Sync {
    /// Every persisted document, each with its revisions in index order
    fn load_all(&self) -> Result<Vec<StoredDocument>, BackendError>;

    /// Replace the stored revision list of `name` in one step
    fn save(&self, name: &DocName, revisions: &[Arc<Revision>]) -> Result<(), BackendError>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn load_all(&self) -> Result<Vec<StoredDocument>, BackendError> {
        (**self).load_all()
    }

    fn save(&self, name: &DocName, revisions: &[Arc<Revision>]) -> Result<(), BackendError> {
        (**self).save(name, revisions)
    }
}

/// Keeps nothing beyond the in-process arena
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryBackend;

impl Backend for MemoryBackend {
    fn load_all(&self) -> Result<Vec<StoredDocument>, BackendError> {
        Ok(Vec::new())
    }

    fn save(&self, _name: &DocName, _revisions: &[Arc<Revision>]) -> Result<(), BackendError> {
        Ok(())
    }
}

/// One JSON file per document
///
/// Files are named by the blake3 digest of the document name, since names
/// may contain `/` or exceed file name limits. The name itself is stored
/// inside the file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

const DOCUMENT_EXT: &str = "json";
const STAGING_EXT: &str = "json.tmp";

impl FileBackend {
    /// Use `dir` for document files, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, name: &DocName) -> PathBuf {
        let digest = blake3::hash(name.as_str().as_bytes());
        self.dir
            .join(format!("{}.{}", digest.to_hex(), DOCUMENT_EXT))
    }
}

impl Backend for FileBackend {
    fn load_all(&self) -> Result<Vec<StoredDocument>, BackendError> {
        let mut documents = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXT) {
                continue;
            }

            let data = fs::read(&path)?;
            let document: StoredDocument = serde_json::from_slice(&data)
                .map_err(|source| BackendError::Corrupt {
                    path: path.clone(),
                    source,
                })?;
            documents.push(document);
        }

        debug!(dir = %self.dir.display(), documents = documents.len(), "loaded documents");
        Ok(documents)
    }

    fn save(&self, name: &DocName, revisions: &[Arc<Revision>]) -> Result<(), BackendError> {
        let payload = StoredDocumentRef {
            name,
            revisions: revisions.iter().map(|revision| revision.as_ref()).collect(),
        };
        let json = serde_json::to_vec(&payload)?;

        // Write a sibling first, then rename over the old file.
        let path = self.document_path(name);
        let staging = path.with_extension(STAGING_EXT);
        {
            let mut file = fs::File::create(&staging)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&staging, &path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use revwiki_types::RevisionId;
    use tempfile::tempdir;

    fn revision(id: u64, body: &str) -> Arc<Revision> {
        Arc::new(Revision::from_parts(
            RevisionId(id),
            body.to_string(),
            String::new(),
            "tester".to_string(),
            Utc::now(),
        ))
    }

    #[test]
    fn test_file_backend_reloads_saved_documents() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let backend = FileBackend::open(dir.path())?;

        let name = DocName::new("Category/Nested Name");
        backend.save(&name, &[revision(1, "one")])?;
        backend.save(&name, &[revision(1, "one"), revision(2, "two")])?;

        let documents = backend.load_all()?;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].name, name);
        let bodies: Vec<&str> = documents[0].revisions.iter().map(|r| r.body()).collect();
        assert_eq!(bodies, vec!["one", "two"]);
        Ok(())
    }

    #[test]
    fn test_file_backend_ignores_staging_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let backend = FileBackend::open(dir.path())?;
        fs::write(dir.path().join("leftover.json.tmp"), b"{ not json")?;

        assert!(backend.load_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_file_backend_reports_corrupt_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let backend = FileBackend::open(dir.path())?;
        fs::write(dir.path().join("broken.json"), b"{ not json")?;

        assert!(matches!(
            backend.load_all(),
            Err(BackendError::Corrupt { .. })
        ));
        Ok(())
    }
}
