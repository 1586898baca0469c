//! Slug generation for heading anchors and link fragments.

use regex::Regex;
use std::sync::OnceLock;

static HYPHEN_RUNS: OnceLock<Regex> = OnceLock::new();

/// Convert a string to a URL-safe slug
///
/// Rules:
/// - Lowercase
/// - Replace whitespace and underscores with hyphens
/// - Remove anything that is not alphanumeric or a hyphen
/// - Collapse multiple hyphens
/// - Trim leading/trailing hyphens
///
/// # Examples
///
/// ```
/// use revwiki_core::slugify;
///
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("Rust & Safety"), "rust-safety");
/// assert_eq!(slugify("역사 개요"), "역사-개요");
/// ```
pub fn slugify(input: &str) -> String {
    let cleaned: String = input
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            '_' => Some('-'),
            c if c.is_whitespace() => Some('-'),
            c if c.is_alphanumeric() || c == '-' => Some(c),
            _ => None,
        })
        .collect();

    let re = HYPHEN_RUNS.get_or_init(|| Regex::new(r"-+").unwrap());
    re.replace_all(&cleaned, "-").trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Front Page"), "front-page");
    }

    #[test]
    fn test_special_characters() {
        assert_eq!(slugify("C++ Programming"), "c-programming");
        assert_eq!(slugify("What's new?"), "whats-new");
    }

    #[test]
    fn test_unicode() {
        assert_eq!(slugify("Café"), "café");
        assert_eq!(slugify("넘겨주기 문서"), "넘겨주기-문서");
    }

    #[test]
    fn test_hyphen_cleanup() {
        assert_eq!(slugify("  Hello    World  "), "hello-world");
        assert_eq!(slugify("-Leading_and_trailing-"), "leading-and-trailing");
        assert_eq!(slugify("!!!"), "");
    }
}
