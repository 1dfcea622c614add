//! Node-role resolution: decides how one field is represented in XML.
//!
//! A field's role comes from its serialized key (what `#[serde(rename)]`
//! produces), optionally refined by a [`RoleTable`] entry for the enclosing
//! type:
//!
//! | Key              | Role                        |
//! |------------------|-----------------------------|
//! | `name`           | element                     |
//! | `@name`          | attribute                   |
//! | `$text`          | inline text (name ignored)  |
//! | `name[item]`     | array of `<item>` children  |
//! | `name[]`         | array using each item's own element mode |
//! | `{uri}name`      | qualified key, combines with the forms above |

use std::collections::HashMap;

/// How a field is laid out in the XML tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum NodeRole {
    #[default]
    Element,
    Attribute,
    InlineText,
    /// A sequence whose items are named after the wrapper, or use their own
    /// element mode when no wrapper name is given.
    Array(Option<String>),
}

/// A resolved field key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKey {
    pub local_name: String,
    pub namespace: Option<String>,
    pub role: NodeRole,
}

impl FieldKey {
    pub fn element(local_name: impl Into<String>) -> Self {
        FieldKey {
            local_name: local_name.into(),
            namespace: None,
            role: NodeRole::Element,
        }
    }

    /// Namespace the key lives in once the configured default is applied.
    ///
    /// Elements fall back to the default namespace. Attributes only carry an
    /// explicit namespace, and one equal to the default reads as none, since
    /// unprefixed attributes are never in a namespace.
    pub fn effective_namespace<'a>(&'a self, default: Option<&'a str>) -> Option<&'a str> {
        match self.role {
            NodeRole::Element | NodeRole::Array(_) => self.namespace.as_deref().or(default),
            NodeRole::Attribute => self
                .namespace
                .as_deref()
                .filter(|uri| Some(*uri) != default),
            NodeRole::InlineText => None,
        }
    }
}

/// Role and namespace assigned to a field from outside its type definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldAnnotation {
    pub role: NodeRole,
    pub namespace: Option<String>,
}

impl FieldAnnotation {
    pub fn new(role: NodeRole) -> Self {
        FieldAnnotation {
            role,
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, uri: impl Into<String>) -> Self {
        self.namespace = Some(uri.into());
        self
    }
}

impl From<NodeRole> for FieldAnnotation {
    fn from(role: NodeRole) -> Self {
        FieldAnnotation::new(role)
    }
}

/// Per-type field annotations, keyed by serde container name and field key.
#[derive(Debug, Clone, Default)]
pub struct RoleTable {
    entries: HashMap<String, HashMap<String, FieldAnnotation>>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        type_name: impl Into<String>,
        key: impl Into<String>,
        annotation: impl Into<FieldAnnotation>,
    ) {
        self.entries
            .entry(type_name.into())
            .or_default()
            .insert(key.into(), annotation.into());
    }

    pub fn get(&self, type_name: &str, key: &str) -> Option<&FieldAnnotation> {
        self.entries.get(type_name)?.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves the key of one field occurrence.
///
/// Role syntax in the key wins over the table, which wins over the default
/// `Element`. A Clark namespace in the key wins over one from the table.
pub fn resolve(type_name: Option<&str>, key: &str, table: &RoleTable) -> FieldKey {
    let (mut field, annotated) = parse_key(key);
    if let Some(annotation) = type_name.and_then(|name| table.get(name, key)) {
        if !annotated {
            field.role = annotation.role.clone();
        }
        if field.namespace.is_none() {
            field.namespace = annotation.namespace.clone();
        }
    }
    field
}

/// Splits a key into its parts; the flag says whether it carried role syntax.
fn parse_key(key: &str) -> (FieldKey, bool) {
    if let Some(rest) = key.strip_prefix('$') {
        return (
            FieldKey {
                local_name: rest.to_string(),
                namespace: None,
                role: NodeRole::InlineText,
            },
            true,
        );
    }

    let (is_attribute, rest) = match key.strip_prefix('@') {
        Some(rest) => (true, rest),
        None => (false, key),
    };
    let (namespace, rest) = split_clark(rest);

    if is_attribute {
        return (
            FieldKey {
                local_name: rest.to_string(),
                namespace,
                role: NodeRole::Attribute,
            },
            true,
        );
    }

    if let Some(body) = rest.strip_suffix(']')
        && let Some(open) = body.rfind('[')
        && open > 0
    {
        let item = &body[open + 1..];
        return (
            FieldKey {
                local_name: body[..open].to_string(),
                namespace,
                role: NodeRole::Array((!item.is_empty()).then(|| item.to_string())),
            },
            true,
        );
    }

    (
        FieldKey {
            local_name: rest.to_string(),
            namespace,
            role: NodeRole::Element,
        },
        false,
    )
}

fn split_clark(name: &str) -> (Option<String>, &str) {
    if let Some(body) = name.strip_prefix('{')
        && let Some(end) = body.find('}')
    {
        let uri = &body[..end];
        let namespace = (!uri.is_empty()).then(|| uri.to_string());
        return (namespace, &body[end + 1..]);
    }
    (None, name)
}
