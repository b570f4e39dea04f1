//! Methods, parameters, and the two kinds of method body.

use bitflags::bitflags;

use crate::assembly::Instruction;
use crate::metadata::{PInvokeInfo, TypeName};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Method attribute flags, ECMA-335 §II.23.1.10 numeric values
    pub struct MethodAttributes: u32 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by anyone in the assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
    }
}

/// One formal parameter of a [`Method`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name; informational only, never used for resolution
    pub name: String,
    /// Semantic type of the parameter
    pub param_type: TypeName,
}

impl Parameter {
    /// Create a parameter.
    pub fn new(name: impl Into<String>, param_type: impl Into<TypeName>) -> Parameter {
        Parameter {
            name: name.into(),
            param_type: param_type.into(),
        }
    }
}

/// An instruction-sequence method body.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    /// Maximum number of items on the operand stack; must cover the sequence's actual peak
    pub max_stack: u16,
    /// The ordered instruction sequence; always ends with a `ret`
    pub instructions: Vec<Instruction>,
}

/// The body of a [`Method`]: either an external binding or an instruction sequence.
///
/// The kind is fixed at creation and never mixed; a method cannot carry both a binding
/// and instructions.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodBodyKind {
    /// Body implemented by a named symbol in a named native library
    PInvoke(PInvokeInfo),
    /// Body given as an explicit instruction sequence
    Cil(MethodBody),
}

/// A method owned by exactly one [`crate::metadata::TypeDef`].
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    /// Method name; overloads share the name and differ in signature
    pub name: String,
    /// Visibility and modifier flags
    pub flags: MethodAttributes,
    /// Return type; `System.Void` for void methods
    pub return_type: TypeName,
    /// Ordered formal parameter list (the receiver is not listed)
    pub params: Vec<Parameter>,
    /// The method body
    pub body: MethodBodyKind,
}

impl Method {
    /// Create an externally-bound method (public static, hide-by-sig, pinvoke-impl).
    pub fn pinvoke(
        name: impl Into<String>,
        return_type: impl Into<TypeName>,
        params: Vec<Parameter>,
        info: PInvokeInfo,
    ) -> Method {
        Method {
            name: name.into(),
            flags: MethodAttributes::PUBLIC
                | MethodAttributes::STATIC
                | MethodAttributes::HIDE_BY_SIG
                | MethodAttributes::PINVOKE_IMPL,
            return_type: return_type.into(),
            params,
            body: MethodBodyKind::PInvoke(info),
        }
    }

    /// Create a method with an instruction-sequence body.
    pub fn cil(
        name: impl Into<String>,
        flags: MethodAttributes,
        return_type: impl Into<TypeName>,
        params: Vec<Parameter>,
        body: MethodBody,
    ) -> Method {
        Method {
            name: name.into(),
            flags,
            return_type: return_type.into(),
            params,
            body: MethodBodyKind::Cil(body),
        }
    }

    /// Whether the method is static (no receiver).
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodAttributes::STATIC)
    }

    /// The ordered parameter types forming the method's signature.
    #[must_use]
    pub fn param_types(&self) -> Vec<TypeName> {
        self.params.iter().map(|p| p.param_type.clone()).collect()
    }

    /// The external binding, if this method has one.
    #[must_use]
    pub fn pinvoke_info(&self) -> Option<&PInvokeInfo> {
        match &self.body {
            MethodBodyKind::PInvoke(info) => Some(info),
            MethodBodyKind::Cil(_) => None,
        }
    }

    /// Mutable access to the external binding, if this method has one.
    pub fn pinvoke_info_mut(&mut self) -> Option<&mut PInvokeInfo> {
        match &mut self.body {
            MethodBodyKind::PInvoke(info) => Some(info),
            MethodBodyKind::Cil(_) => None,
        }
    }

    /// The instruction-sequence body, if this method has one.
    #[must_use]
    pub fn cil_body(&self) -> Option<&MethodBody> {
        match &self.body {
            MethodBodyKind::Cil(body) => Some(body),
            MethodBodyKind::PInvoke(_) => None,
        }
    }
}
