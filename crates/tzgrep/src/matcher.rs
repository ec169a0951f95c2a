//! Name matching

use regex::Regex;

use crate::error::Result;

/// A compiled pattern that is tested against the innermost name of a chain.
///
/// The match is unanchored: `leaf` matches `leaf.txt` as well as
/// `dir/leaf`. Anchors can be written into the pattern itself.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
}

impl Matcher {
    /// Compile `pattern`, failing with [`crate::SearchError::InvalidPattern`]
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// The pattern this matcher was compiled from
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SearchError;

    #[test]
    fn test_unanchored_match() {
        let matcher = Matcher::new("leaf").unwrap();
        assert!(matcher.is_match("leaf.txt"));
        assert!(matcher.is_match("dir/leaf"));
        assert!(!matcher.is_match("branch.txt"));
    }

    #[test]
    fn test_anchored_pattern() {
        let matcher = Matcher::new(r"\.txt$").unwrap();
        assert!(matcher.is_match("notes.txt"));
        assert!(!matcher.is_match("notes.txt.gz"));
        assert_eq!(matcher.as_str(), r"\.txt$");
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Matcher::new("(unclosed").unwrap_err();
        assert!(matches!(err, SearchError::InvalidPattern(_)));
        assert!(err.is_fatal());
    }
}
