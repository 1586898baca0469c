//! Redirect directive detection.
//!
//! A body whose first line is `#redirect <target>` (or the NamuMark form
//! `#넘겨주기 <target>`) is an alias for another document. Detection is a
//! single anchored match on the first line and never runs the markup parser.

use regex::Regex;
use std::sync::OnceLock;

static REDIRECT_REGEX: OnceLock<Regex> = OnceLock::new();

fn redirect_regex() -> &'static Regex {
    REDIRECT_REGEX
        .get_or_init(|| Regex::new(r"^#(?:redirect|넘겨주기)[ \t]+([^\r\n]*[^\s])").unwrap())
}

/// A matched redirect directive, borrowed from the body it was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectDirective<'a> {
    /// The directive span: keyword plus target, without trailing whitespace
    pub directive: &'a str,
    /// The referenced document name
    pub target: &'a str,
}

/// Match the redirect directive at the start of `body`
///
/// # Example
///
/// ```
/// use revwiki_core::redirect::parse_redirect;
///
/// let directive = parse_redirect("#redirect Main Page\nleftover").unwrap();
/// assert_eq!(directive.directive, "#redirect Main Page");
/// assert_eq!(directive.target, "Main Page");
/// ```
pub fn parse_redirect(body: &str) -> Option<RedirectDirective<'_>> {
    let captures = redirect_regex().captures(body)?;
    let directive = captures.get(0)?.as_str();
    let target = captures.get(1)?.as_str();
    Some(RedirectDirective { directive, target })
}

pub fn is_redirect(body: &str) -> bool {
    redirect_regex().is_match(body)
}

/// The referenced document name, or `None` if `body` is not a redirect
pub fn redirect_target(body: &str) -> Option<&str> {
    parse_redirect(body).map(|directive| directive.target)
}

/// Only the directive span of a redirect body; other bodies are returned
/// unchanged.
pub fn truncate_to_directive(body: &str) -> &str {
    match parse_redirect(body) {
        Some(directive) => directive.directive,
        None => body,
    }
}
