use std::fmt::{Display, Formatter};

use crate::store::error::{invalid_argument, StoreResult};

/// Slash separated path to a collection or document.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(segments.into_iter().map(Into::into).collect())
    }

    pub fn from_string(path: &str) -> StoreResult<Self> {
        if path.trim().is_empty() {
            return Ok(Self::root());
        }
        if path.contains("//") {
            return Err(invalid_argument("Found empty segment in resource path"));
        }
        Ok(Self::from_segments(
            path.split('/').filter(|segment| !segment.is_empty()),
        ))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn child<I, S>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.segments.clone();
        next.extend(segments.into_iter().map(Into::into));
        Self::new(next)
    }

    pub fn without_last(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self::new(segments)
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn canonical_string(&self) -> String {
        self.segments.join("/")
    }
}

impl Display for ResourcePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_joins() {
        let path = ResourcePath::from_string("users/abc/sessions").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.last_segment(), Some("sessions"));
        assert_eq!(path.without_last().canonical_string(), "users/abc");
        assert_eq!(path.child(["s1"]).to_string(), "users/abc/sessions/s1");
    }

    #[test]
    fn rejects_empty_segments() {
        let err = ResourcePath::from_string("users//abc").unwrap_err();
        assert_eq!(err.code_str(), "store/invalid-argument");
    }

    #[test]
    fn blank_is_root() {
        assert!(ResourcePath::from_string("  ").unwrap().is_empty());
    }
}
