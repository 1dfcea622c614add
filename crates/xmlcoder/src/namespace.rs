//! Namespace handling.
//!
//! Encoding allocates synthetic prefixes through a [`NamespaceTable`] that
//! lives for one encode call. Decoding never allocates: it resolves the
//! prefixes a document declares through a [`NamespaceScope`] that grows as
//! the walker descends.

use crate::tree::{NamespaceDecl, XmlElement, split_qualified};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::trace;

/// URI permanently bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// URI → prefix assignments for one encode session.
#[derive(Debug)]
pub struct NamespaceTable {
    default_uri: Option<String>,
    prefix_seed: String,
    /// `(uri, prefix)` in declaration order
    bindings: Vec<(String, String)>,
    by_uri: HashMap<String, usize>,
    used: HashSet<String>,
    counter: usize,
}

impl NamespaceTable {
    /// Starts a session. Seed pairs are declared on the root whether or not
    /// anything uses them.
    pub fn new(
        default_uri: Option<&str>,
        seed: &BTreeMap<String, String>,
        prefix_seed: &str,
    ) -> Self {
        let mut table = NamespaceTable {
            default_uri: default_uri.map(str::to_string),
            prefix_seed: prefix_seed.to_string(),
            bindings: Vec::with_capacity(seed.len()),
            by_uri: HashMap::with_capacity(seed.len()),
            used: HashSet::with_capacity(seed.len()),
            counter: 0,
        };
        for (uri, prefix) in seed {
            if table.default_uri.as_deref() != Some(uri.as_str()) {
                table.bind(uri, prefix.clone());
            }
        }
        table
    }

    /// Prefix to write `uri` with, or `None` for the default namespace.
    pub fn name_for(&mut self, uri: &str) -> Option<String> {
        if self.default_uri.as_deref() == Some(uri) {
            return None;
        }
        if let Some(&index) = self.by_uri.get(uri) {
            return Some(self.bindings[index].1.clone());
        }

        let prefix = loop {
            self.counter += 1;
            let candidate = format!("{}{}", self.prefix_seed, self.counter);
            if !self.used.contains(&candidate) {
                break candidate;
            }
        };
        trace!(uri, prefix = %prefix, "allocated namespace prefix");
        self.bind(uri, prefix.clone());
        Some(prefix)
    }

    fn bind(&mut self, uri: &str, prefix: String) {
        self.by_uri.insert(uri.to_string(), self.bindings.len());
        self.used.insert(prefix.clone());
        self.bindings.push((uri.to_string(), prefix));
    }

    /// Declarations for the root element: the default namespace first, then
    /// every bound prefix in the order it was bound.
    pub fn declarations(&self) -> Vec<NamespaceDecl> {
        let default = self.default_uri.iter().map(|uri| NamespaceDecl {
            prefix: None,
            uri: uri.clone(),
        });
        let prefixed = self.bindings.iter().map(|(uri, prefix)| NamespaceDecl {
            prefix: Some(prefix.clone()),
            uri: uri.clone(),
        });
        default.chain(prefixed).collect()
    }
}

/// A namespace-qualified name used for lookups while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: Option<&str>, local: &str) -> Self {
        QName {
            namespace: namespace.map(str::to_string),
            local: local.to_string(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(uri) => write!(f, "{{{}}}{}", uri, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Prefix bindings in scope at one point of a parsed document.
#[derive(Debug, Clone, Default)]
pub(crate) struct NamespaceScope<'a> {
    /// `(prefix, uri)`, innermost last
    bindings: Vec<(Option<&'a str>, &'a str)>,
}

impl<'a> NamespaceScope<'a> {
    /// The scope inside `element`, including its own declarations.
    pub fn enter(&self, element: &'a XmlElement) -> Self {
        let mut scope = self.clone();
        scope.bindings.extend(
            element
                .namespaces
                .iter()
                .map(|decl| (decl.prefix.as_deref(), decl.uri.as_str())),
        );
        scope
    }

    pub fn lookup(&self, prefix: Option<&str>) -> Option<&'a str> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE);
        }
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| *bound == prefix)
            // xmlns="" undeclares the default namespace
            .and_then(|(_, uri)| (!uri.is_empty()).then_some(*uri))
    }

    /// Qualified name of an element written as `raw` in this scope.
    pub fn element_name(&self, raw: &str) -> QName {
        match split_qualified(raw) {
            (Some(prefix), local) => match self.lookup(Some(prefix)) {
                Some(uri) => QName::new(Some(uri), local),
                None => QName::new(None, raw),
            },
            (None, local) => QName::new(self.lookup(None), local),
        }
    }

    /// Qualified name of an attribute; unprefixed attributes have no namespace.
    pub fn attribute_name(&self, raw: &str) -> QName {
        match split_qualified(raw) {
            (Some(prefix), local) => match self.lookup(Some(prefix)) {
                Some(uri) => QName::new(Some(uri), local),
                None => QName::new(None, raw),
            },
            (None, local) => QName::new(None, local),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::XmlDocument;

    const URL: &str = "http://some.url.example.com/whatever";

    #[test]
    fn test_shared_uri_shares_prefix() {
        let mut table = NamespaceTable::new(None, &BTreeMap::new(), "ns");
        assert_eq!(table.name_for(URL).as_deref(), Some("ns1"));
        assert_eq!(table.name_for(URL).as_deref(), Some("ns1"));
        assert_eq!(table.name_for("urn:other").as_deref(), Some("ns2"));
        assert_eq!(table.declarations().len(), 2);
    }

    #[test]
    fn test_default_namespace_has_no_prefix() {
        let mut table = NamespaceTable::new(Some("urn:d"), &BTreeMap::new(), "nsns");
        assert_eq!(table.name_for("urn:d"), None);
        assert_eq!(table.name_for(URL).as_deref(), Some("nsns1"));

        let decls = table.declarations();
        assert_eq!(decls[0].prefix, None);
        assert_eq!(decls[0].uri, "urn:d");
        assert_eq!(decls[1].prefix.as_deref(), Some("nsns1"));
    }

    #[test]
    fn test_seeded_prefixes_are_skipped() {
        let mut seed = BTreeMap::new();
        seed.insert("urn:seeded".to_string(), "ns1".to_string());
        let mut table = NamespaceTable::new(None, &seed, "ns");

        assert_eq!(table.name_for("urn:seeded").as_deref(), Some("ns1"));
        assert_eq!(table.name_for("urn:new").as_deref(), Some("ns2"));
    }

    #[test]
    fn test_scope_resolution() {
        let doc = XmlDocument::parse(
            "<root xmlns=\"urn:d\" xmlns:p=\"urn:p\"><inner xmlns=\"\"><p:a p:b=\"1\" c=\"2\"/></inner></root>",
        )
        .unwrap();
        let root_scope = NamespaceScope::default().enter(&doc.root);
        assert_eq!(
            root_scope.element_name("root"),
            QName::new(Some("urn:d"), "root")
        );

        let inner = doc.root.child_elements().next().unwrap();
        let inner_scope = root_scope.enter(inner);
        assert_eq!(inner_scope.element_name("x"), QName::new(None, "x"));
        assert_eq!(inner_scope.element_name("p:a"), QName::new(Some("urn:p"), "a"));
        assert_eq!(inner_scope.attribute_name("p:b"), QName::new(Some("urn:p"), "b"));
        assert_eq!(inner_scope.attribute_name("c"), QName::new(None, "c"));
        assert_eq!(inner_scope.element_name("q:z"), QName::new(None, "q:z"));
        assert_eq!(
            inner_scope.attribute_name("xml:lang"),
            QName::new(Some(XML_NAMESPACE), "lang")
        );
    }
}
