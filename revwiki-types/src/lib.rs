//! Shared types for revwiki
//!
//! This crate provides the data units passed between the revision store,
//! the render layer and the HTTP adapter: document names, revisions and
//! the rows of a document's history summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Document name
///
/// Case- and byte-sensitive. Names may contain `/`; any escaping happens
/// before a name reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocName(pub String);

impl DocName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DocName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocName {
    fn from(name: &str) -> Self {
        DocName(name.to_string())
    }
}

impl From<String> for DocName {
    fn from(name: String) -> Self {
        DocName(name)
    }
}

/// Process-unique revision identifier, assigned in increasing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(pub u64);

impl RevisionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RevisionId {
    fn from(id: u64) -> Self {
        RevisionId(id)
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One immutable snapshot of a document body plus edit metadata
///
/// There are no setters: a correction is a new revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    id: RevisionId,
    body: String,
    comment: String,
    contributor: String,
    created_at: DateTime<Utc>,
}

impl Revision {
    /// Assemble a revision from parts that were already validated and
    /// normalized by the store.
    pub fn from_parts(
        id: RevisionId,
        body: String,
        comment: String,
        contributor: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            body,
            comment,
            contributor,
            created_at,
        }
    }

    pub fn id(&self) -> RevisionId {
        self.id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn contributor(&self) -> &str {
        &self.contributor
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Body length in UTF-16 code units
    pub fn body_len(&self) -> usize {
        self.body.encode_utf16().count()
    }
}

/// One row of a document's history summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    /// 1-based position of the revision in its document
    pub revision_index: usize,
    pub comment: String,
    pub contributor: String,
    /// Body length minus the previous revision's body length
    pub length_delta: i64,
    pub created_at: DateTime<Utc>,
}
