//! Wikilink transformation for [[target]] and [[target|text]] syntax.
//!
//! Links point at the render route of the target document. Text inside code
//! blocks and inline code is left alone.

use crate::slug::slugify;
use pulldown_cmark::{CowStr, Event, LinkType, Tag, TagEnd};

/// Transformer for wikilink syntax
pub struct WikilinkTransformer<'a> {
    base_url: &'a str,
}

impl<'a> WikilinkTransformer<'a> {
    pub fn new(base_url: &'a str) -> Self {
        Self { base_url }
    }

    /// Transform events, converting [[wikilinks]] to link events
    pub fn transform(&self, events: Vec<Event<'static>>) -> Vec<Event<'static>> {
        let mut result = Vec::with_capacity(events.len());
        let mut pending_text = String::new();
        let mut in_code_block = false;

        for event in events {
            if let (Event::Text(text), false) = (&event, in_code_block) {
                // Adjacent text events are merged so a link split across
                // them is still found.
                pending_text.push_str(text);
                continue;
            }

            self.flush(&mut pending_text, &mut result);

            match &event {
                Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
                Event::End(TagEnd::CodeBlock) => in_code_block = false,
                _ => {}
            }
            result.push(event);
        }

        self.flush(&mut pending_text, &mut result);
        result
    }

    fn flush(&self, text: &mut String, out: &mut Vec<Event<'static>>) {
        if text.is_empty() {
            return;
        }
        let text = std::mem::take(text);
        if text.contains("[[") && text.contains("]]") {
            self.process_wikilinks(&text, out);
        } else {
            out.push(Event::Text(CowStr::from(text)));
        }
    }

    fn process_wikilinks(&self, text: &str, out: &mut Vec<Event<'static>>) {
        let mut remaining = text;

        while let Some(start) = remaining.find("[[") {
            let Some(end) = remaining[start..].find("]]") else {
                break;
            };

            if start > 0 {
                out.push(Event::Text(CowStr::from(remaining[..start].to_string())));
            }

            let inner = &remaining[start + 2..start + end];
            match self.link_events(inner) {
                Some(link) => out.extend(link),
                None => out.push(Event::Text(CowStr::from(
                    remaining[start..start + end + 2].to_string(),
                ))),
            }

            remaining = &remaining[start + end + 2..];
        }

        if !remaining.is_empty() {
            out.push(Event::Text(CowStr::from(remaining.to_string())));
        }
    }

    /// Link events for the inside of one `[[...]]`, or `None` if the target
    /// is empty
    fn link_events(&self, wikilink: &str) -> Option<[Event<'static>; 3]> {
        let (target, display) = match wikilink.split_once('|') {
            Some((target, display)) => (target.trim(), Some(display.trim())),
            None => (wikilink.trim(), None),
        };

        let (document, fragment) = match target.split_once('#') {
            Some((document, fragment)) => (document.trim(), Some(fragment.trim())),
            None => (target, None),
        };
        if document.is_empty() {
            return None;
        }

        let segments: Vec<String> = document
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        let mut href = format!("{}{}", self.base_url, segments.join("/"));
        if let Some(fragment) = fragment.map(slugify).filter(|f| !f.is_empty()) {
            href.push('#');
            href.push_str(&fragment);
        }

        let label = display.filter(|d| !d.is_empty()).unwrap_or(target);

        Some([
            Event::Start(Tag::Link {
                link_type: LinkType::Inline,
                dest_url: CowStr::from(href),
                title: CowStr::Borrowed(""),
                id: CowStr::Borrowed(""),
            }),
            Event::Text(CowStr::from(label.to_string())),
            Event::End(TagEnd::Link),
        ])
    }
}
