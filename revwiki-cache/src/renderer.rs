//! The seam to the markup engine.

use std::sync::Arc;
use thiserror::Error;

/// A markup engine: raw body text is parsed into a tree, and the tree is
/// rendered into output text.
///
/// Implementations must behave as pure functions of the input text; the
/// cache relies on that to reuse results.
pub trait Renderer: Send + Sync {
    /// Parsed representation handed from `parse` to `render`
    type Tree;

    fn parse(&self, raw: &str) -> Result<Self::Tree, RenderError>;

    fn render(&self, tree: &Self::Tree) -> Result<String, RenderError>;

    /// Parse then render
    fn render_raw(&self, raw: &str) -> Result<String, RenderError> {
        let tree = self.parse(raw)?;
        self.render(&tree)
    }
}

impl<R: Renderer + ?Sized> Renderer for Arc<R> {
    type Tree = R::Tree;

    fn parse(&self, raw: &str) -> Result<Self::Tree, RenderError> {
        (**self).parse(raw)
    }

    fn render(&self, tree: &Self::Tree) -> Result<String, RenderError> {
        (**self).render(tree)
    }
}

/// Errors raised by a renderer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Failed to parse markup: {0}")]
    Parse(String),

    #[error("Failed to render markup: {0}")]
    Render(String),
}
