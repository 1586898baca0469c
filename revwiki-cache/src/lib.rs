//! Revwiki render cache
//!
//! Memoizes the output of an external markup [`Renderer`], keyed by the raw
//! body text. Each distinct body is rendered at most once: concurrent callers
//! asking for the same unseen body wait on a per-key in-flight guard and share
//! the first caller's result.
//!
//! ```text
//! body ──► RenderCache::render_content ──hit──► Arc<str>
//!                  │
//!                 miss ──► Renderer::parse ──► Renderer::render ──► store
//! ```
//!
//! Failures are surfaced to the caller and never cached. Entries live until
//! the cache is cleared unless a capacity is configured, in which case the
//! least recently used rendered entries are evicted.

#![warn(missing_debug_implementations)]

pub mod cache;
pub mod metrics;
pub mod renderer;

pub use cache::RenderCache;
pub use metrics::{CacheStats, RenderMetrics};
pub use renderer::{RenderError, Renderer};
