//! Text transforms applied to inbound messages before matching.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

type SanitizeFn = dyn Fn(&str) -> String + Send + Sync;

/// Anything outside ASCII word characters, ASCII whitespace, `(`, `)` and `|`.
static SPECIAL_CHARS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[^()|0-9A-Za-z_\t\n\x0C\r ]").ok());

/// A pure text transform.
///
/// Cloning is cheap; the transform is shared.
#[derive(Clone)]
pub struct Sanitizer {
    name: &'static str,
    transform: Arc<SanitizeFn>,
}

impl Sanitizer {
    /// Collapses tabs, newlines and repeated spaces into single spaces.
    ///
    /// This is the pipeline installed on every script that does not name one.
    pub fn standard() -> Self {
        Self {
            name: "standard",
            transform: Arc::new(standard),
        }
    }

    /// Leaves text untouched.
    pub fn none() -> Self {
        Self {
            name: "none",
            transform: Arc::new(str::to_string),
        }
    }

    /// Strips every character that is not an ASCII word character, ASCII
    /// whitespace, `(`, `)` or `|`, then applies [`Sanitizer::standard`].
    pub fn strip_special() -> Self {
        Self {
            name: "strip_special",
            transform: Arc::new(|text| standard(&strip_special(text))),
        }
    }

    /// Wraps an arbitrary transform.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            name: "custom",
            transform: Arc::new(f),
        }
    }

    /// Applies the transform.
    pub fn apply(&self, text: &str) -> String {
        (self.transform)(text)
    }

    /// Returns a short label for logging.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sanitizer").field(&self.name).finish()
    }
}

fn standard(text: &str) -> String {
    let text = replace_until_stable(text, "\t", " ");
    let text = replace_until_stable(&text, "\n", " ");
    replace_until_stable(&text, "  ", " ")
}

fn strip_special(text: &str) -> String {
    match SPECIAL_CHARS.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

fn replace_until_stable(text: &str, from: &str, to: &str) -> String {
    let mut out = text.to_string();
    while out.contains(from) {
        out = out.replace(from, to);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_collapses_whitespace() {
        let s = Sanitizer::standard();
        assert_eq!(s.apply("hello\t\tworld"), "hello world");
        assert_eq!(s.apply("a\n\n\nb"), "a b");
        assert_eq!(s.apply("a      b"), "a b");
        assert_eq!(s.apply("a \t\n b"), "a b");
    }

    #[test]
    fn test_none_is_identity() {
        assert_eq!(Sanitizer::none().apply("a\t  b"), "a\t  b");
    }

    #[test]
    fn test_strip_special() {
        let s = Sanitizer::strip_special();
        assert_eq!(s.apply("what's up,   doc?!"), "whats up doc");
    }

    #[test]
    fn test_strip_special_keeps_ascii_class() {
        assert!(SPECIAL_CHARS.is_some());
        assert_eq!(strip_special("a(b)|c! é"), "a(b)|c ");
        assert_eq!(Sanitizer::strip_special().apply("a(b)|c! é"), "a(b)|c ");
        assert_eq!(strip_special("tab\there"), "tab\there");
    }

    #[test]
    fn test_custom() {
        let s = Sanitizer::custom(|t| t.to_uppercase());
        assert_eq!(s.apply("hey"), "HEY");
        assert_eq!(s.name(), "custom");
    }
}
