//! Logging decorator for any [`DocumentStore`].
//!
//! Every call is logged once with its method name, its parameters as JSON,
//! an outcome word and the elapsed time. Bodies are logged by length only.

use super::DocumentStore;
use crate::error::StoreError;
use revwiki_types::Revision;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Wraps a store and logs each call
#[derive(Debug, Clone)]
pub struct Logged<S> {
    inner: S,
}

impl<S: DocumentStore> Logged<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

/// How a call's result reads in the log
trait Outcome {
    fn outcome(&self) -> String;

    fn is_failure(&self) -> bool {
        false
    }
}

impl<T> Outcome for Result<T, StoreError> {
    fn outcome(&self) -> String {
        match self {
            Ok(_) => "ok".to_string(),
            Err(err) => format!("error: {err}"),
        }
    }

    fn is_failure(&self) -> bool {
        self.is_err()
    }
}

impl<T> Outcome for Option<T> {
    fn outcome(&self) -> String {
        let word = if self.is_some() { "found" } else { "not_found" };
        word.to_string()
    }
}

impl Outcome for usize {
    fn outcome(&self) -> String {
        self.to_string()
    }
}

fn timed<T: Outcome>(method: &str, params: serde_json::Value, call: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = call();
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    let outcome = result.outcome();
    if result.is_failure() {
        warn!(method, %params, %outcome, elapsed_ms, "store call failed");
    } else {
        info!(method, %params, %outcome, elapsed_ms, "store call");
    }
    result
}

impl<S: DocumentStore> DocumentStore for Logged<S> {
    fn post_document(
        &self,
        name: &str,
        body: &str,
        comment: &str,
        contributor: &str,
    ) -> Result<(), StoreError> {
        let params = json!({
            "name": name,
            "body_len": body.encode_utf16().count(),
            "comment": comment,
            "contributor": contributor,
        });
        timed("post_document", params, || {
            self.inner.post_document(name, body, comment, contributor)
        })
    }

    fn latest(&self, name: &str) -> Option<Arc<Revision>> {
        timed("latest", json!({ "name": name }), || self.inner.latest(name))
    }

    fn revision(&self, name: &str, index: usize) -> Option<Arc<Revision>> {
        timed("revision", json!({ "name": name, "index": index }), || {
            self.inner.revision(name, index)
        })
    }

    fn revisions(&self, name: &str) -> Option<Vec<Arc<Revision>>> {
        timed("revisions", json!({ "name": name }), || {
            self.inner.revisions(name)
        })
    }

    fn revision_count(&self, name: &str) -> usize {
        timed("revision_count", json!({ "name": name }), || {
            self.inner.revision_count(name)
        })
    }
}
