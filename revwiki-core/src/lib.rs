//! # revwiki-core
//!
//! Core library for the revwiki revision store.
//!
//! This crate holds the append-only revision store and its persistence
//! backends, redirect detection, history summaries, the bundled Markdown
//! renderer and the [`Wiki`] service that ties them to the render cache.

pub mod config;
pub mod error;
pub mod history;
pub mod markup;
pub mod redirect;
pub mod revision;
pub mod slug;
pub mod store;
pub mod wiki;

pub use config::{Config, ConfigError, StorageKind};
pub use error::{BackendError, StoreError, ValidationError};
pub use markup::MarkdownRenderer;
pub use redirect::{is_redirect, redirect_target, truncate_to_directive};
pub use revision::MAX_COMMENT_LEN;
pub use slug::slugify;
pub use store::{Backend, DocumentStore, FileBackend, Logged, MemoryBackend, RevisionStore};
pub use wiki::{RenderedBody, RenderedRevision, Wiki};
