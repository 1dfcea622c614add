use crate::path::CodingPath;
use std::fmt;

/// Error types for XML encoding and decoding.
#[derive(Debug)]
pub enum XmlCoderError {
    /// A required field, node or sequence position is absent
    ValueNotFound {
        expected: String,
        path: CodingPath,
        message: String,
    },

    /// A node's text could not be converted to the requested type
    TypeMismatch {
        expected: String,
        path: CodingPath,
        message: String,
    },

    /// A value has no representation in the requested XML shape
    InvalidValue { path: CodingPath, message: String },

    /// The document has no root element
    RootNotFound,

    /// The root element is not the one the decoder was told to expect
    UnexpectedRootTag { expected: String, found: String },

    /// Structurally malformed document (unbalanced tags, several roots, ...)
    Syntax(String),

    /// XML serialization or parsing error
    Xml(quick_xml::Error),

    /// IO error during serialization/deserialization
    Io(std::io::Error),

    /// Custom error message
    Custom { path: CodingPath, message: String },
}

impl XmlCoderError {
    pub fn value_not_found(
        expected: impl Into<String>,
        path: &CodingPath,
        message: impl Into<String>,
    ) -> Self {
        XmlCoderError::ValueNotFound {
            expected: expected.into(),
            path: path.clone(),
            message: message.into(),
        }
    }

    pub fn type_mismatch(
        expected: impl Into<String>,
        path: &CodingPath,
        message: impl Into<String>,
    ) -> Self {
        XmlCoderError::TypeMismatch {
            expected: expected.into(),
            path: path.clone(),
            message: message.into(),
        }
    }

    pub fn invalid_value(path: &CodingPath, message: impl Into<String>) -> Self {
        XmlCoderError::InvalidValue {
            path: path.clone(),
            message: message.into(),
        }
    }

    /// The standard failure for a keyed lookup that found nothing.
    pub(crate) fn key_not_found(path: &CodingPath, key: &str) -> Self {
        Self::value_not_found(
            "value",
            path,
            format!("No value associated with key {}.", key),
        )
    }

    /// Coding path of the value that failed, for the positional variants.
    pub fn path(&self) -> Option<&CodingPath> {
        match self {
            XmlCoderError::ValueNotFound { path, .. }
            | XmlCoderError::TypeMismatch { path, .. }
            | XmlCoderError::InvalidValue { path, .. }
            | XmlCoderError::Custom { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Human-readable message without the path decoration.
    pub fn message(&self) -> String {
        match self {
            XmlCoderError::ValueNotFound { message, .. }
            | XmlCoderError::TypeMismatch { message, .. }
            | XmlCoderError::InvalidValue { message, .. }
            | XmlCoderError::Custom { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Attaches `at` to errors that were raised without knowing where they
    /// happened (serde's own `custom` and `missing_field` errors).
    pub(crate) fn with_path(mut self, at: &CodingPath) -> Self {
        match &mut self {
            XmlCoderError::ValueNotFound { path, .. }
            | XmlCoderError::TypeMismatch { path, .. }
            | XmlCoderError::InvalidValue { path, .. }
            | XmlCoderError::Custom { path, .. }
                if path.is_empty() =>
            {
                *path = at.clone();
            }
            _ => {}
        }
        self
    }
}

struct At<'a>(&'a CodingPath);

impl fmt::Display for At<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            Ok(())
        } else {
            write!(f, " at `{}`", self.0)
        }
    }
}

impl fmt::Display for XmlCoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlCoderError::ValueNotFound {
                expected,
                path,
                message,
            } => write!(f, "value not found ({}){}: {}", expected, At(path), message),
            XmlCoderError::TypeMismatch {
                expected,
                path,
                message,
            } => write!(f, "type mismatch ({}){}: {}", expected, At(path), message),
            XmlCoderError::InvalidValue { path, message } => {
                write!(f, "invalid value{}: {}", At(path), message)
            }
            XmlCoderError::RootNotFound => write!(f, "Root node not found."),
            XmlCoderError::UnexpectedRootTag { expected, found } => write!(
                f,
                "Unexpected root tag name: expected `{}`, found `{}`.",
                expected, found
            ),
            XmlCoderError::Syntax(msg) => write!(f, "XML syntax error: {}", msg),
            XmlCoderError::Xml(e) => write!(f, "XML error: {}", e),
            XmlCoderError::Io(e) => write!(f, "IO error: {}", e),
            XmlCoderError::Custom { path, message } => write!(f, "{}{}", message, At(path)),
        }
    }
}

impl std::error::Error for XmlCoderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            XmlCoderError::Xml(e) => Some(e),
            XmlCoderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for XmlCoderError {
    fn from(err: quick_xml::Error) -> Self {
        XmlCoderError::Xml(err)
    }
}

impl From<std::io::Error> for XmlCoderError {
    fn from(err: std::io::Error) -> Self {
        XmlCoderError::Io(err)
    }
}

impl From<String> for XmlCoderError {
    fn from(message: String) -> Self {
        XmlCoderError::Custom {
            path: CodingPath::new(),
            message,
        }
    }
}

impl From<&str> for XmlCoderError {
    fn from(message: &str) -> Self {
        XmlCoderError::from(message.to_string())
    }
}

impl serde::ser::Error for XmlCoderError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        XmlCoderError::from(msg.to_string())
    }
}

impl serde::de::Error for XmlCoderError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        XmlCoderError::from(msg.to_string())
    }

    fn invalid_type(unexp: serde::de::Unexpected, exp: &dyn serde::de::Expected) -> Self {
        XmlCoderError::TypeMismatch {
            expected: exp.to_string(),
            path: CodingPath::new(),
            message: format!("invalid type: {}, expected {}", unexp, exp),
        }
    }

    fn invalid_length(len: usize, exp: &dyn serde::de::Expected) -> Self {
        XmlCoderError::value_not_found(
            exp.to_string(),
            &CodingPath::new(),
            format!("Expected {} but found {} items.", exp, len),
        )
    }

    fn missing_field(field: &'static str) -> Self {
        let key = crate::role::resolve(None, field, &crate::role::RoleTable::new());
        XmlCoderError::key_not_found(&CodingPath::new(), &key.local_name)
    }
}

/// Result type alias for XML coding operations
pub type Result<T> = std::result::Result<T, XmlCoderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::Error as _;

    #[test]
    fn test_missing_field_names_key() {
        let err = XmlCoderError::missing_field("attribute");
        assert_eq!(err.message(), "No value associated with key attribute.");
        assert!(matches!(err, XmlCoderError::ValueNotFound { .. }));

        let err = XmlCoderError::missing_field("@attribute");
        assert_eq!(err.message(), "No value associated with key attribute.");
    }

    #[test]
    fn test_with_path_only_fills_empty_paths() {
        let inner = CodingPath::new().child("a").child("b");
        let outer = CodingPath::new().child("a");

        let err = XmlCoderError::custom("boom").with_path(&inner).with_path(&outer);
        assert_eq!(err.path(), Some(&inner));
        assert_eq!(err.to_string(), "boom at `a.b`");
    }

    #[test]
    fn test_display_without_path() {
        let err = XmlCoderError::type_mismatch("bool", &CodingPath::new(), "bad literal");
        assert_eq!(err.to_string(), "type mismatch (bool): bad literal");
        assert_eq!(XmlCoderError::RootNotFound.to_string(), "Root node not found.");
    }
}
