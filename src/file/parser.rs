//! Parsing of the module container format into the in-memory model.
//!
//! # Container layout
//!
//! All values little-endian, strings length-prefixed (see [`crate::file::io`]):
//!
//! ```text
//! magic "SMOD" | u16 version | module name | 16-byte mvid | u32 type count | types
//! type:        namespace | name | u32 flags | u32 method count | methods
//!              | u32 nested count | nested types (recursive)
//! method:      name | u32 flags | return type | u8 param count | (name, type) pairs
//!              | u8 body tag (0 = external binding, 1 = instruction sequence)
//! binding:     library name | entry point | u16 mapping flags
//! sequence:    u16 max stack | u32 instruction count | instructions
//! instruction: u8 opcode | operand (ldarg: u16, ldc.i4: i32, ldstr: UTF-16 literal,
//!              call: declaring type | name | u8 static flag | u8 param count
//!              | param types | return type)
//! ```

use uguid::Guid;

use crate::assembly::{Instruction, MethodRef, Opcode};
use crate::file::io::{read_bytes_at, read_le_at, read_string_at, read_utf16_at};
use crate::metadata::{
    Method, MethodAttributes, MethodBody, MethodBodyKind, Module, PInvokeInfo, Parameter,
    TypeAttributes, TypeDef, TypeName,
};
use crate::{Error, Result};

/// Magic bytes at the start of every container.
pub const MAGIC: &[u8; 4] = b"SMOD";
/// The container version this parser understands.
pub const VERSION: u16 = 1;

/// Body tag for an external binding.
pub(crate) const BODY_PINVOKE: u8 = 0;
/// Body tag for an instruction sequence.
pub(crate) const BODY_CIL: u8 = 1;

/// Nesting depth cap; tree-shaped containment is unbounded in the model, but parsing
/// recursion has to terminate on hostile input.
const MAX_TYPE_NESTING: usize = 128;

/// Cursor-style parser over container bytes.
pub struct Parser<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Parser<'a> {
    /// Create a parser over `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Parser<'a> {
        Parser { data, offset: 0 }
    }

    /// Pre-allocation capacity for `count` elements of at least `min_encoded_size`
    /// bytes each, capped by the bytes actually remaining so a hostile count cannot
    /// request a huge reservation before the per-element reads hit the end of input.
    fn clamped_capacity(&self, count: u32, min_encoded_size: usize) -> usize {
        let remaining = self.data.len().saturating_sub(self.offset);
        (count as usize).min(remaining / min_encoded_size.max(1))
    }

    /// Parse a complete [`Module`].
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] for an unknown magic or version; container
    /// errors for truncated or malformed data.
    pub fn parse(mut self) -> Result<Module> {
        let magic = read_bytes_at(self.data, &mut self.offset, 4)?;
        if magic != MAGIC {
            return Err(Error::NotSupported);
        }

        let version = read_le_at::<u16>(self.data, &mut self.offset)?;
        if version != VERSION {
            return Err(Error::NotSupported);
        }

        let name = read_string_at(self.data, &mut self.offset)?;

        let mut mvid = [0u8; 16];
        mvid.copy_from_slice(read_bytes_at(self.data, &mut self.offset, 16)?);

        let type_count = read_le_at::<u32>(self.data, &mut self.offset)?;
        // A type encodes to no fewer than 20 bytes (two string lengths, flags, two counts)
        let mut types = Vec::with_capacity(self.clamped_capacity(type_count, 20));
        for _ in 0..type_count {
            types.push(self.read_type(0)?);
        }

        if self.offset != self.data.len() {
            return Err(malformed_error!(
                "Trailing {} byte(s) after module content",
                self.data.len() - self.offset
            ));
        }

        Ok(Module {
            name,
            mvid: Guid::from_bytes(mvid),
            types,
        })
    }

    fn read_type(&mut self, depth: usize) -> Result<TypeDef> {
        if depth > MAX_TYPE_NESTING {
            return Err(Error::RecursionLimit(MAX_TYPE_NESTING));
        }

        let namespace = read_string_at(self.data, &mut self.offset)?;
        let name = read_string_at(self.data, &mut self.offset)?;
        let flags = read_le_at::<u32>(self.data, &mut self.offset)?;

        let method_count = read_le_at::<u32>(self.data, &mut self.offset)?;
        let mut methods = Vec::with_capacity(self.clamped_capacity(method_count, 14));
        for _ in 0..method_count {
            methods.push(self.read_method()?);
        }

        let nested_count = read_le_at::<u32>(self.data, &mut self.offset)?;
        let mut nested = Vec::with_capacity(self.clamped_capacity(nested_count, 20));
        for _ in 0..nested_count {
            nested.push(self.read_type(depth + 1)?);
        }

        Ok(TypeDef {
            namespace,
            name,
            flags: TypeAttributes::from_bits_truncate(flags),
            methods,
            nested,
        })
    }

    fn read_method(&mut self) -> Result<Method> {
        let name = read_string_at(self.data, &mut self.offset)?;
        let flags = read_le_at::<u32>(self.data, &mut self.offset)?;
        let return_type = TypeName::from(read_string_at(self.data, &mut self.offset)?);

        let param_count = read_le_at::<u8>(self.data, &mut self.offset)?;
        let mut params = Vec::with_capacity(param_count as usize);
        for _ in 0..param_count {
            let param_name = read_string_at(self.data, &mut self.offset)?;
            let param_type = read_string_at(self.data, &mut self.offset)?;
            params.push(Parameter::new(param_name, param_type));
        }

        let body = match read_le_at::<u8>(self.data, &mut self.offset)? {
            BODY_PINVOKE => MethodBodyKind::PInvoke(self.read_pinvoke()?),
            BODY_CIL => MethodBodyKind::Cil(self.read_body()?),
            tag => return Err(malformed_error!("Unknown method body tag {}", tag)),
        };

        Ok(Method {
            name,
            flags: MethodAttributes::from_bits_truncate(flags),
            return_type,
            params,
            body,
        })
    }

    fn read_pinvoke(&mut self) -> Result<PInvokeInfo> {
        let module = read_string_at(self.data, &mut self.offset)?;
        let entry_point = read_string_at(self.data, &mut self.offset)?;
        let flags = u32::from(read_le_at::<u16>(self.data, &mut self.offset)?);

        Ok(PInvokeInfo {
            module,
            entry_point,
            flags,
        })
    }

    fn read_body(&mut self) -> Result<MethodBody> {
        let max_stack = read_le_at::<u16>(self.data, &mut self.offset)?;
        let instruction_count = read_le_at::<u32>(self.data, &mut self.offset)?;

        let mut instructions = Vec::with_capacity(self.clamped_capacity(instruction_count, 1));
        for _ in 0..instruction_count {
            instructions.push(self.read_instruction()?);
        }

        Ok(MethodBody {
            max_stack,
            instructions,
        })
    }

    fn read_instruction(&mut self) -> Result<Instruction> {
        let raw = read_le_at::<u8>(self.data, &mut self.offset)?;
        let opcode = Opcode::from_repr(raw)
            .ok_or_else(|| malformed_error!("Unknown opcode 0x{:02X}", raw))?;

        Ok(match opcode {
            Opcode::Nop => Instruction::Nop,
            Opcode::Ldarg => Instruction::Ldarg(read_le_at::<u16>(self.data, &mut self.offset)?),
            Opcode::LdcI4 => Instruction::LdcI4(read_le_at::<i32>(self.data, &mut self.offset)?),
            Opcode::Ldstr => Instruction::Ldstr(read_utf16_at(self.data, &mut self.offset)?),
            Opcode::Call => Instruction::Call(self.read_method_ref()?),
            Opcode::ConvU2 => Instruction::ConvU2,
            Opcode::Pop => Instruction::Pop,
            Opcode::Ret => Instruction::Ret,
        })
    }

    fn read_method_ref(&mut self) -> Result<MethodRef> {
        let declaring_type = TypeName::from(read_string_at(self.data, &mut self.offset)?);
        let name = read_string_at(self.data, &mut self.offset)?;
        let is_static = read_le_at::<u8>(self.data, &mut self.offset)? != 0;

        let param_count = read_le_at::<u8>(self.data, &mut self.offset)?;
        let mut params = Vec::with_capacity(param_count as usize);
        for _ in 0..param_count {
            params.push(TypeName::from(read_string_at(self.data, &mut self.offset)?));
        }

        let return_type = TypeName::from(read_string_at(self.data, &mut self.offset)?);

        Ok(MethodRef {
            declaring_type,
            name,
            params,
            return_type,
            is_static,
        })
    }
}
