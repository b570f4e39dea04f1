//! The instruction set synthesized method bodies are built from.

use std::fmt;

use strum::{Display, FromRepr};

use crate::metadata::TypeName;

/// Opcode byte values as stored in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum Opcode {
    /// No operation
    #[strum(serialize = "nop")]
    Nop = 0x00,
    /// Load argument by index (the receiver of an instance method is argument 0)
    #[strum(serialize = "ldarg")]
    Ldarg = 0x01,
    /// Push a 32-bit integer constant
    #[strum(serialize = "ldc.i4")]
    LdcI4 = 0x02,
    /// Push a string literal
    #[strum(serialize = "ldstr")]
    Ldstr = 0x03,
    /// Convert the top of stack to an unsigned 16-bit integer
    #[strum(serialize = "conv.u2")]
    ConvU2 = 0x04,
    /// Call a method by reference
    #[strum(serialize = "call")]
    Call = 0x05,
    /// Discard the top of stack
    #[strum(serialize = "pop")]
    Pop = 0x06,
    /// Return to the caller
    #[strum(serialize = "ret")]
    Ret = 0x07,
}

/// Non-owning cross-reference to a call target.
///
/// A reference may point at a method inside the same module or at one provided by
/// another module; references into the current module are checked against the type
/// tree at serialization time.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodRef {
    /// Fully-qualified name of the declaring type
    pub declaring_type: TypeName,
    /// Method name
    pub name: String,
    /// Ordered parameter types (the receiver is not listed)
    pub params: Vec<TypeName>,
    /// Return type
    pub return_type: TypeName,
    /// Whether the target is static (no receiver is consumed by the call)
    pub is_static: bool,
}

impl MethodRef {
    /// Number of operand-stack values a call to this target consumes.
    #[must_use]
    pub fn pops(&self) -> usize {
        self.params.len() + usize::from(!self.is_static)
    }

    /// Whether a call to this target leaves a return value on the stack.
    #[must_use]
    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.name)
    }
}

/// One low-level operation in a method body.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// No operation
    Nop,
    /// Load argument by index
    Ldarg(u16),
    /// Push a 32-bit integer constant
    LdcI4(i32),
    /// Push a string literal
    Ldstr(String),
    /// Convert the top of stack to an unsigned 16-bit integer
    ConvU2,
    /// Call the referenced method
    Call(MethodRef),
    /// Discard the top of stack
    Pop,
    /// Return to the caller
    Ret,
}

impl Instruction {
    /// The opcode this instruction serializes as.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Nop => Opcode::Nop,
            Instruction::Ldarg(_) => Opcode::Ldarg,
            Instruction::LdcI4(_) => Opcode::LdcI4,
            Instruction::Ldstr(_) => Opcode::Ldstr,
            Instruction::ConvU2 => Opcode::ConvU2,
            Instruction::Call(_) => Opcode::Call,
            Instruction::Pop => Opcode::Pop,
            Instruction::Ret => Opcode::Ret,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Ldarg(index) => write!(f, "ldarg {index}"),
            Instruction::LdcI4(value) => write!(f, "ldc.i4 {value}"),
            Instruction::Ldstr(value) => write!(f, "ldstr \"{value}\""),
            Instruction::Call(target) => write!(f, "call {target}"),
            other => write!(f, "{}", other.opcode()),
        }
    }
}
