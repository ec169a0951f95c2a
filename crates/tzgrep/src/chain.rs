//! The nesting address of an entry

use std::fmt;

/// Separator used when a chain is displayed on a single line
pub const DISPLAY_SEPARATOR: &str = " :: ";

/// An ordered list of names, starting at a root path and ending at the
/// innermost entry, e.g. `["/data/a.tar.gz", "inner.tar", "leaf.txt"]`.
///
/// A chain always has at least one element. Extending it with
/// [`PathChain::join`] produces a new chain, the original is never modified,
/// so sibling entries always observe independent chains.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathChain {
    segments: Vec<String>,
}

impl PathChain {
    /// Create a single-element chain for a root path
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// Return a new chain that extends this one with `name`
    #[must_use]
    pub fn join(&self, name: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(name.into());
        Self { segments }
    }

    /// The innermost name, the only part that is ever matched
    pub fn name(&self) -> &str {
        self.segments
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// The root path this chain starts at
    pub fn root_name(&self) -> &str {
        self.segments
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always `false`, a chain holds at least its root
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// How many containers enclose the innermost name
    pub fn depth(&self) -> usize {
        self.segments.len() - 1
    }
}

impl fmt::Display for PathChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join(DISPLAY_SEPARATOR))
    }
}

impl<'a> IntoIterator for &'a PathChain {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
