//! Textual type references used in signatures.

use std::fmt;

/// Fully-qualified name of the semantic type of a parameter, return value or receiver.
///
/// Type references are compared by exact textual equality; signature matching never
/// normalizes or abbreviates them. Nested types use `/` between the enclosing and the
/// nested name (`Ns.Outer/Inner`), matching the convention of
/// [`crate::metadata::TypeDef::full_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName(String);

/// Full name of the void return type.
pub const VOID: &str = "System.Void";

impl TypeName {
    /// Create a type name from its fully-qualified textual form.
    pub fn new(name: impl Into<String>) -> TypeName {
        TypeName(name.into())
    }

    /// The textual form of the reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this reference names the void type.
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.0 == VOID
    }

    /// The void type reference.
    #[must_use]
    pub fn void() -> TypeName {
        TypeName(VOID.to_string())
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        TypeName(name.to_string())
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        TypeName(name)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
