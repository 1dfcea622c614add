//! Coding paths: the breadcrumb of keys and sequence indices that leads from
//! the root value to the one currently being encoded or decoded.

use std::fmt;

/// One step of a [`CodingPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A field or map key, as written in the Rust type.
    Key(String),
    /// A position inside a sequence.
    Index(usize),
}

impl PathSegment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathSegment::Key(key) => Some(key),
            PathSegment::Index(_) => None,
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Ordered key/index breadcrumb carried by every positional error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CodingPath(Vec<PathSegment>);

impl CodingPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The key at the end of the path, if the path ends in a key.
    pub fn last_key(&self) -> Option<&str> {
        self.0.last().and_then(PathSegment::as_key)
    }

    /// A copy of this path extended by one segment.
    pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    pub(crate) fn push(&mut self, segment: impl Into<PathSegment>) {
        self.0.push(segment.into());
    }

    pub(crate) fn pop(&mut self) {
        self.0.pop();
    }
}

impl From<Vec<PathSegment>> for CodingPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        CodingPath(segments)
    }
}

impl FromIterator<PathSegment> for CodingPath {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        CodingPath(iter.into_iter().collect())
    }
}

impl fmt::Display for CodingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{}", key)?,
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mixes_keys_and_indices() {
        let path: CodingPath = vec![
            PathSegment::from("container"),
            PathSegment::from("items"),
            PathSegment::from(2),
            PathSegment::from("name"),
        ]
        .into();
        assert_eq!(path.to_string(), "container.items[2].name");
    }

    #[test]
    fn test_child_leaves_parent_untouched() {
        let parent = CodingPath::new().child("a");
        let child = parent.child(0).child("b");
        assert_eq!(parent.len(), 1);
        assert_eq!(child.to_string(), "a[0].b");
        assert_eq!(child.last_key(), Some("b"));
        assert_eq!(parent.child(3).last_key(), None);
    }
}
