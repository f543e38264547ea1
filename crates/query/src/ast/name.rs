//! Qualified (dotted) names.

use std::fmt;

/// An ordered list of identifier parts, e.g. `a.b.col`.
///
/// The first part may denote an alias; resolution consumes parts left to
/// right against the alias tree. Alias comparison is ASCII case-insensitive.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    parts: Vec<String>,
}

impl QualifiedName {
    /// Creates a name from its parts.
    pub fn new(parts: Vec<String>) -> Self {
        Self { parts }
    }

    /// Splits a dotted string into parts.
    pub fn parse(dotted: &str) -> Self {
        Self {
            parts: dotted.split('.').map(str::to_string).collect(),
        }
    }

    /// Returns all parts.
    #[inline]
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Returns the first part.
    pub fn first(&self) -> Option<&str> {
        self.parts.first().map(String::as_str)
    }

    /// Returns the last part.
    pub fn last(&self) -> Option<&str> {
        self.parts.last().map(String::as_str)
    }

    /// Number of parts.
    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns true if the name has no parts.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns the name without its first `n` parts.
    pub fn skip(&self, n: usize) -> QualifiedName {
        Self {
            parts: self.parts.iter().skip(n).cloned().collect(),
        }
    }

    /// Compares part `index` with `name`, ignoring ASCII case.
    pub fn part_matches(&self, index: usize, name: &str) -> bool {
        self.parts
            .get(index)
            .is_some_and(|p| p.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

impl From<&str> for QualifiedName {
    fn from(s: &str) -> Self {
        QualifiedName::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let name = QualifiedName::parse("a.b.col");
        assert_eq!(name.len(), 3);
        assert_eq!(name.first(), Some("a"));
        assert_eq!(name.last(), Some("col"));
        assert_eq!(name.to_string(), "a.b.col");
        assert_eq!(name.skip(2).to_string(), "col");
    }

    #[test]
    fn test_part_matches_ignores_case() {
        let name = QualifiedName::parse("Orders.id");
        assert!(name.part_matches(0, "orders"));
        assert!(!name.part_matches(1, "ID2"));
        assert!(!name.part_matches(5, "x"));
    }
}
