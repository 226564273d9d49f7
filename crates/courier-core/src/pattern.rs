//! Compiled script matchers.

use std::fmt;

use regex::Regex;

/// All non-overlapping matches of a pattern. Each inner list holds the full
/// match followed by every capture group; groups that did not participate
/// are empty strings.
pub type SubMatches = Vec<Vec<String>>;

/// A compiled regular expression that remembers its source text.
#[derive(Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// Compiles `source`.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(source)?,
        })
    }

    /// Returns the source text.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Returns whether `text` matches anywhere.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Extracts every non-overlapping match with its groups.
    pub fn sub_matches(&self, text: &str) -> SubMatches {
        self.regex
            .captures_iter(text)
            .map(|caps| {
                caps.iter()
                    .map(|group| group.map_or_else(String::new, |m| m.as_str().to_string()))
                    .collect()
            })
            .collect()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.as_str()).finish()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}
