//! Type declarations and their recursive nesting.

use bitflags::bitflags;

use crate::metadata::Method;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Type attribute flags, ECMA-335 §II.23.1.15 numeric values
    pub struct TypeAttributes: u32 {
        /// Type is visible outside the module
        const PUBLIC = 0x0000_0001;
        /// Nested type is visible outside the module
        const NESTED_PUBLIC = 0x0000_0002;
        /// Type cannot be derived from
        const SEALED = 0x0000_0100;
        /// Type cannot be instantiated
        const ABSTRACT = 0x0000_0080;
        /// Initialize the type before first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

/// A named type declaration within a [`crate::metadata::Module`].
///
/// Containment is strictly tree-shaped: a type owns its methods and its nested types,
/// and nesting recurses to unbounded depth. A module holds at most one type per
/// fully-qualified name.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    /// Namespace of the type; empty for types without one and for nested types
    pub namespace: String,
    /// Simple name of the type
    pub name: String,
    /// Visibility and layout flags
    pub flags: TypeAttributes,
    /// Methods owned by this type
    pub methods: Vec<Method>,
    /// Types nested inside this type
    pub nested: Vec<TypeDef>,
}

impl TypeDef {
    /// Create an empty public type.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> TypeDef {
        TypeDef {
            namespace: namespace.into(),
            name: name.into(),
            flags: TypeAttributes::PUBLIC,
            methods: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// The fully-qualified name of this type as a top-level declaration.
    ///
    /// Nested types are addressed as `Outer/Inner`; that form is produced by the
    /// resolver during traversal, not stored here.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Total number of methods in this type and all types nested below it.
    #[must_use]
    pub fn method_count_recursive(&self) -> usize {
        self.methods.len()
            + self
                .nested
                .iter()
                .map(TypeDef::method_count_recursive)
                .sum::<usize>()
    }
}
