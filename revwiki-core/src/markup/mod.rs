//! Markdown rendering for document bodies.
//!
//! The cache treats this as an opaque [`Renderer`]: `parse` turns a body into
//! an owned event stream, `render` writes that stream out as HTML.

pub mod wikilinks;

use crate::slug::slugify;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use revwiki_cache::{RenderError, Renderer};
use std::collections::HashMap;

pub use wikilinks::WikilinkTransformer;

/// Default prefix for wikilink targets
pub const DEFAULT_BASE_URL: &str = "/api/document/render/";

/// Markdown renderer with wikilinks and heading anchors
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
    base_url: String,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Wikilinks resolve to `base_url` followed by the target name
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        Self {
            options,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for MarkdownRenderer {
    type Tree = Vec<Event<'static>>;

    fn parse(&self, raw: &str) -> Result<Self::Tree, RenderError> {
        let events: Vec<Event<'static>> = Parser::new_ext(raw, self.options)
            .map(Event::into_static)
            .collect();

        let events = WikilinkTransformer::new(&self.base_url).transform(events);
        Ok(attach_heading_ids(events))
    }

    fn render(&self, tree: &Self::Tree) -> Result<String, RenderError> {
        let mut html_output = String::new();
        html::push_html(&mut html_output, tree.iter().cloned());
        Ok(html_output)
    }
}

/// Give every heading without an explicit `{#id}` a slug id built from its
/// text. Repeated slugs get a numeric suffix.
fn attach_heading_ids(events: Vec<Event<'static>>) -> Vec<Event<'static>> {
    let titles = heading_titles(&events);
    let mut titles = titles.into_iter();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut result = Vec::with_capacity(events.len());

    for event in events {
        match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                let title = titles.next().unwrap_or_default();
                let id = id.or_else(|| {
                    let slug = slugify(&title);
                    if slug.is_empty() {
                        return None;
                    }
                    let count = seen.entry(slug.clone()).or_insert(0);
                    let unique = if *count == 0 {
                        slug
                    } else {
                        format!("{slug}-{count}")
                    };
                    *count += 1;
                    Some(CowStr::from(unique))
                });
                result.push(Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }));
            }
            other => result.push(other),
        }
    }

    result
}

fn heading_titles(events: &[Event<'_>]) -> Vec<String> {
    let mut titles = Vec::new();
    let mut current: Option<String> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading { .. }) => current = Some(String::new()),
            Event::Text(text) | Event::Code(text) => {
                if let Some(title) = current.as_mut() {
                    title.push_str(text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(title) = current.take() {
                    titles.push(title);
                }
            }
            _ => {}
        }
    }

    titles
}
