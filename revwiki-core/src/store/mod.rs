//! The revision store.
//!
//! Documents live in an arena keyed by name. Each document is an append-only
//! log of immutable `Arc<Revision>` records, addressed by 1-based index. The
//! log's only mutation is `push`, so revisions can never be reordered,
//! edited or dropped.
//!
//! Writers to the same document serialize on that document's writer lock;
//! the new revision is persisted through the [`Backend`] first and only then
//! published to readers. Writers to different documents never share a lock
//! beyond the brief map lookup. Readers take a read lock on one document's
//! log and see it either before or after an append, never halfway.

pub mod backend;
pub mod logged;

pub use backend::{Backend, FileBackend, MemoryBackend, StoredDocument};
pub use logged::Logged;

use crate::error::{BackendError, StoreError};
use crate::revision::{normalize_body, validate_comment};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use revwiki_types::{DocName, Revision, RevisionId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Operations the rest of the system uses to reach documents
pub trait DocumentStore: Send + Sync {
    /// Validate, normalize and append a new revision to `name`, creating the
    /// document on first use
    fn post_document(
        &self,
        name: &str,
        body: &str,
        comment: &str,
        contributor: &str,
    ) -> Result<(), StoreError>;

    /// The most recently appended revision
    fn latest(&self, name: &str) -> Option<Arc<Revision>>;

    /// The revision at 1-based `index`; `None` outside `1..=count`
    fn revision(&self, name: &str, index: usize) -> Option<Arc<Revision>>;

    /// All revisions in index order, or `None` for an unknown document
    fn revisions(&self, name: &str) -> Option<Vec<Arc<Revision>>>;

    /// Number of revisions (0 for an unknown document)
    fn revision_count(&self, name: &str) -> usize;
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn post_document(
        &self,
        name: &str,
        body: &str,
        comment: &str,
        contributor: &str,
    ) -> Result<(), StoreError> {
        (**self).post_document(name, body, comment, contributor)
    }

    fn latest(&self, name: &str) -> Option<Arc<Revision>> {
        (**self).latest(name)
    }

    fn revision(&self, name: &str, index: usize) -> Option<Arc<Revision>> {
        (**self).revision(name, index)
    }

    fn revisions(&self, name: &str) -> Option<Vec<Arc<Revision>>> {
        (**self).revisions(name)
    }

    fn revision_count(&self, name: &str) -> usize {
        (**self).revision_count(name)
    }
}

/// Append-only revision list of one document
#[derive(Debug, Default)]
struct RevisionLog {
    revisions: Vec<Arc<Revision>>,
}

impl RevisionLog {
    fn from_revisions(revisions: Vec<Revision>) -> Self {
        Self {
            revisions: revisions.into_iter().map(Arc::new).collect(),
        }
    }

    fn push(&mut self, revision: Arc<Revision>) {
        self.revisions.push(revision);
    }

    fn get(&self, index: usize) -> Option<Arc<Revision>> {
        let position = index.checked_sub(1)?;
        self.revisions.get(position).cloned()
    }

    fn latest(&self) -> Option<Arc<Revision>> {
        self.revisions.last().cloned()
    }

    fn len(&self) -> usize {
        self.revisions.len()
    }

    fn snapshot(&self) -> Vec<Arc<Revision>> {
        self.revisions.clone()
    }
}

/// Arena slot for one document
///
/// A slot can be briefly empty while its first append is in flight (or after
/// that append failed to persist); readers treat an empty log as absent.
#[derive(Debug, Default)]
struct DocumentEntry {
    writer: Mutex<()>,
    log: RwLock<RevisionLog>,
}

/// In-process revision store backed by a [`Backend`]
pub struct RevisionStore<B: Backend = MemoryBackend> {
    documents: DashMap<DocName, Arc<DocumentEntry>>,
    next_id: AtomicU64,
    backend: B,
}

impl RevisionStore<MemoryBackend> {
    /// A store with no durability
    pub fn in_memory() -> Self {
        Self {
            documents: DashMap::new(),
            next_id: AtomicU64::new(1),
            backend: MemoryBackend,
        }
    }
}

impl Default for RevisionStore<MemoryBackend> {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl<B: Backend> RevisionStore<B> {
    /// Open a store over `backend`, loading every persisted document
    ///
    /// Revision ids resume above the highest persisted id.
    pub fn open(backend: B) -> Result<Self, StoreError> {
        let documents = DashMap::new();
        let mut max_id = 0;
        let mut revision_total = 0;

        for stored in backend.load_all()? {
            if stored.revisions.is_empty() {
                return Err(BackendError::EmptyDocument(stored.name.0).into());
            }
            if let Some(highest) = stored.revisions.iter().map(|r| r.id().as_u64()).max() {
                max_id = max_id.max(highest);
            }
            revision_total += stored.revisions.len();

            let entry = DocumentEntry {
                writer: Mutex::new(()),
                log: RwLock::new(RevisionLog::from_revisions(stored.revisions)),
            };
            documents.insert(stored.name, Arc::new(entry));
        }

        info!(
            documents = documents.len(),
            revisions = revision_total,
            "revision store opened"
        );

        Ok(Self {
            documents,
            next_id: AtomicU64::new(max_id + 1),
            backend,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of documents with at least one revision
    pub fn document_count(&self) -> usize {
        self.documents
            .iter()
            .filter(|entry| entry.value().log.read().len() > 0)
            .count()
    }

    fn entry(&self, name: &str) -> Option<Arc<DocumentEntry>> {
        self.documents.get(name).map(|entry| Arc::clone(entry.value()))
    }

    fn entry_or_create(&self, name: &str) -> Arc<DocumentEntry> {
        if let Some(entry) = self.entry(name) {
            return entry;
        }
        let entry = self
            .documents
            .entry(DocName::from(name))
            .or_insert_with(|| Arc::new(DocumentEntry::default()));
        Arc::clone(entry.value())
    }

    fn is_current(&self, name: &str, entry: &Arc<DocumentEntry>) -> bool {
        self.documents
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current.value(), entry))
    }

    fn allocate_id(&self) -> RevisionId {
        RevisionId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl<B: Backend> DocumentStore for RevisionStore<B> {
    fn post_document(
        &self,
        name: &str,
        body: &str,
        comment: &str,
        contributor: &str,
    ) -> Result<(), StoreError> {
        validate_comment(comment)?;
        let body = normalize_body(body);

        loop {
            let entry = self.entry_or_create(name);
            let _writer = entry.writer.lock();

            // A failed first post may have dropped this entry while we waited.
            if !self.is_current(name, &entry) {
                continue;
            }

            let revision = Arc::new(Revision::from_parts(
                self.allocate_id(),
                body,
                comment.to_string(),
                contributor.to_string(),
                Utc::now(),
            ));

            let mut staged = entry.log.read().snapshot();
            staged.push(Arc::clone(&revision));
            if let Err(err) = self.backend.save(&DocName::from(name), &staged) {
                self.documents.remove_if(name, |_, current| {
                    Arc::ptr_eq(current, &entry) && current.log.read().len() == 0
                });
                return Err(err.into());
            }

            let index = staged.len();
            entry.log.write().push(revision);
            debug!(document = name, index, "revision appended");
            return Ok(());
        }
    }

    fn latest(&self, name: &str) -> Option<Arc<Revision>> {
        self.entry(name)?.log.read().latest()
    }

    fn revision(&self, name: &str, index: usize) -> Option<Arc<Revision>> {
        self.entry(name)?.log.read().get(index)
    }

    fn revisions(&self, name: &str) -> Option<Vec<Arc<Revision>>> {
        let revisions = self.entry(name)?.log.read().snapshot();
        if revisions.is_empty() {
            None
        } else {
            Some(revisions)
        }
    }

    fn revision_count(&self, name: &str) -> usize {
        self.entry(name)
            .map(|entry| entry.log.read().len())
            .unwrap_or(0)
    }
}

impl<B: Backend> std::fmt::Debug for RevisionStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionStore")
            .field("documents", &self.documents.len())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
