//! The wiki service: a document store plus a render cache.
//!
//! This is the surface callers use. It resolves revision selectors, routes
//! redirect bodies around the renderer and builds history summaries.

use crate::error::StoreError;
use crate::history;
use crate::redirect::redirect_target;
use crate::store::DocumentStore;
use revwiki_cache::{RenderCache, RenderError, Renderer};
use revwiki_types::{HistoryRow, Revision};
use std::sync::Arc;

/// Output of a rendered fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedBody {
    /// Renderer output for the stored body
    Html(Arc<str>),
    /// The body is a redirect; the renderer was not called
    Redirect(String),
}

/// A revision together with its rendered body
#[derive(Debug, Clone)]
pub struct RenderedRevision {
    pub revision: Arc<Revision>,
    pub body: RenderedBody,
}

impl RenderedRevision {
    pub fn is_redirect(&self) -> bool {
        matches!(self.body, RenderedBody::Redirect(_))
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match &self.body {
            RenderedBody::Redirect(target) => Some(target),
            RenderedBody::Html(_) => None,
        }
    }
}

pub struct Wiki<S: DocumentStore, R: Renderer> {
    store: S,
    cache: RenderCache<R>,
}

impl<S: DocumentStore, R: Renderer> Wiki<S, R> {
    pub fn new(store: S, cache: RenderCache<R>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &RenderCache<R> {
        &self.cache
    }

    pub fn post_document(
        &self,
        name: &str,
        body: &str,
        comment: &str,
        contributor: &str,
    ) -> Result<(), StoreError> {
        self.store.post_document(name, body, comment, contributor)
    }

    /// Fetch the latest revision (`rev` is `None`) or the revision at the
    /// given 1-based index. Zero and negative indices are absent.
    pub fn fetch(&self, name: &str, rev: Option<i64>) -> Option<Arc<Revision>> {
        match rev {
            None => self.store.latest(name),
            Some(index) => {
                let index = usize::try_from(index).ok().filter(|i| *i > 0)?;
                self.store.revision(name, index)
            }
        }
    }

    /// Like [`Wiki::fetch`], with the body rendered
    ///
    /// Redirect bodies come back as [`RenderedBody::Redirect`] without
    /// touching the renderer or the cache.
    pub fn rendered(
        &self,
        name: &str,
        rev: Option<i64>,
    ) -> Result<Option<RenderedRevision>, RenderError> {
        let Some(revision) = self.fetch(name, rev) else {
            return Ok(None);
        };

        let body = match redirect_target(revision.body()) {
            Some(target) => RenderedBody::Redirect(target.to_string()),
            None => RenderedBody::Html(self.cache.render_content(revision.body())?),
        };

        Ok(Some(RenderedRevision { revision, body }))
    }

    /// History rows, most recent first, or `None` for an unknown document
    pub fn history(&self, name: &str) -> Option<Vec<HistoryRow>> {
        let revisions = self.store.revisions(name)?;
        Some(history::summarize(&revisions))
    }
}

impl<S, R> std::fmt::Debug for Wiki<S, R>
where
    S: DocumentStore + std::fmt::Debug,
    R: Renderer,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wiki")
            .field("store", &self.store)
            .field("cache", &self.cache)
            .finish()
    }
}
