//! Fluent assembler for building instruction sequences with stack tracking.

use crate::assembly::{Instruction, MethodRef};
use crate::{Error, Result};

/// Builds an instruction sequence while tracking the operand stack in real time.
///
/// Each emit method updates the current stack depth and records the peak, so the
/// finished sequence carries an accurate max-stack value without a separate analysis
/// pass. Underflow is rejected at emit time.
///
/// # Examples
///
/// ```rust
/// use shimworks::assembly::InstructionAssembler;
///
/// # fn example() -> shimworks::Result<()> {
/// let mut asm = InstructionAssembler::new();
/// asm.ldarg(0)?.ldarg(1)?.ldc_i4(0)?.conv_u2()?;
/// let (instructions, max_stack) = asm.finish();
/// assert_eq!(instructions.len(), 4);
/// assert_eq!(max_stack, 3);
/// # Ok(())
/// # }
/// ```
pub struct InstructionAssembler {
    instructions: Vec<Instruction>,
    depth: usize,
    peak: usize,
}

impl InstructionAssembler {
    /// Create an assembler with an empty sequence and stack.
    #[must_use]
    pub fn new() -> InstructionAssembler {
        InstructionAssembler {
            instructions: Vec::new(),
            depth: 0,
            peak: 0,
        }
    }

    fn push_values(&mut self, count: usize) {
        self.depth += count;
        if self.depth > self.peak {
            self.peak = self.depth;
        }
    }

    fn pop_values(&mut self, count: usize) -> Result<()> {
        if count > self.depth {
            return Err(Error::StackUnderflow(self.instructions.len()));
        }
        self.depth -= count;
        Ok(())
    }

    /// Emit `nop`.
    pub fn nop(&mut self) -> Result<&mut Self> {
        self.instructions.push(Instruction::Nop);
        Ok(self)
    }

    /// Emit `ldarg index`.
    pub fn ldarg(&mut self, index: u16) -> Result<&mut Self> {
        self.push_values(1);
        self.instructions.push(Instruction::Ldarg(index));
        Ok(self)
    }

    /// Emit `ldc.i4 value`.
    pub fn ldc_i4(&mut self, value: i32) -> Result<&mut Self> {
        self.push_values(1);
        self.instructions.push(Instruction::LdcI4(value));
        Ok(self)
    }

    /// Emit `ldstr value`.
    pub fn ldstr(&mut self, value: &str) -> Result<&mut Self> {
        self.push_values(1);
        self.instructions
            .push(Instruction::Ldstr(value.to_string()));
        Ok(self)
    }

    /// Emit `conv.u2`.
    ///
    /// # Errors
    /// Returns [`Error::StackUnderflow`] if the stack is empty.
    pub fn conv_u2(&mut self) -> Result<&mut Self> {
        self.pop_values(1)?;
        self.push_values(1);
        self.instructions.push(Instruction::ConvU2);
        Ok(self)
    }

    /// Emit `call target`, consuming the target's arguments (and receiver, for instance
    /// targets) and pushing its return value if it has one.
    ///
    /// # Errors
    /// Returns [`Error::StackUnderflow`] if fewer values are on the stack than the call
    /// consumes.
    pub fn call(&mut self, target: MethodRef) -> Result<&mut Self> {
        self.pop_values(target.pops())?;
        if target.returns_value() {
            self.push_values(1);
        }
        self.instructions.push(Instruction::Call(target));
        Ok(self)
    }

    /// Emit `pop`.
    ///
    /// # Errors
    /// Returns [`Error::StackUnderflow`] if the stack is empty.
    pub fn pop(&mut self) -> Result<&mut Self> {
        self.pop_values(1)?;
        self.instructions.push(Instruction::Pop);
        Ok(self)
    }

    /// Emit `ret`.
    ///
    /// The return value, if the enclosing method has one, is left on the stack for the
    /// instruction to consume; balance against the method's return type is checked at
    /// serialization time, when the enclosing signature is known.
    pub fn ret(&mut self) -> Result<&mut Self> {
        self.instructions.push(Instruction::Ret);
        Ok(self)
    }

    /// Consume the assembler, returning the sequence and its operand-stack peak.
    #[must_use]
    pub fn finish(self) -> (Vec<Instruction>, u16) {
        // The op set cannot push anywhere near u16::MAX values per instruction
        let peak = u16::try_from(self.peak).unwrap_or(u16::MAX);
        (self.instructions, peak)
    }
}

impl Default for InstructionAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulate `instructions` and return the operand-stack peak.
///
/// `returns_value` states whether the enclosing method returns a value; every `ret`
/// must then leave exactly one value on the stack, otherwise exactly zero. Used by the
/// serializer to validate declared max-stack values on bodies that did not come out of
/// an [`InstructionAssembler`].
///
/// # Errors
/// Returns [`Error::StackUnderflow`] on underflow, [`Error::UnbalancedStack`] for a
/// mismatched `ret`, and [`Error::MissingReturn`] if the sequence does not end with `ret`.
pub fn simulate_stack(instructions: &[Instruction], returns_value: bool) -> Result<u16> {
    let expected_at_ret = usize::from(returns_value);
    let mut depth = 0usize;
    let mut peak = 0usize;

    for (index, instruction) in instructions.iter().enumerate() {
        match instruction {
            Instruction::Nop => {}
            Instruction::Ldarg(_) | Instruction::LdcI4(_) | Instruction::Ldstr(_) => {
                depth += 1;
            }
            Instruction::ConvU2 => {
                if depth == 0 {
                    return Err(Error::StackUnderflow(index));
                }
            }
            Instruction::Call(target) => {
                let pops = target.pops();
                if pops > depth {
                    return Err(Error::StackUnderflow(index));
                }
                depth -= pops;
                if target.returns_value() {
                    depth += 1;
                }
            }
            Instruction::Pop => {
                if depth == 0 {
                    return Err(Error::StackUnderflow(index));
                }
                depth -= 1;
            }
            Instruction::Ret => {
                if depth != expected_at_ret {
                    return Err(Error::UnbalancedStack {
                        expected: expected_at_ret,
                        found: depth,
                    });
                }
                depth = 0;
            }
        }
        if depth > peak {
            peak = depth;
        }
    }

    match instructions.last() {
        Some(Instruction::Ret) => Ok(u16::try_from(peak).unwrap_or(u16::MAX)),
        _ => Err(Error::MissingReturn),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TypeName;

    fn send_message_ref() -> MethodRef {
        MethodRef {
            declaring_type: TypeName::from("Steamworks.Data.Connection"),
            name: "SendMessage".to_string(),
            params: vec![
                TypeName::from("System.Byte[]"),
                TypeName::from("Steamworks.Data.SendType"),
                TypeName::from("System.UInt16"),
            ],
            return_type: TypeName::from("Steamworks.Data.Result"),
            is_static: false,
        }
    }

    #[test]
    fn tracks_peak_across_call() {
        let mut asm = InstructionAssembler::new();
        asm.ldarg(0)
            .unwrap()
            .ldarg(1)
            .unwrap()
            .ldarg(2)
            .unwrap()
            .ldc_i4(0)
            .unwrap()
            .conv_u2()
            .unwrap()
            .call(send_message_ref())
            .unwrap()
            .ret()
            .unwrap();

        let (instructions, max_stack) = asm.finish();
        assert_eq!(instructions.len(), 7);
        // receiver + 3 arguments simultaneously live before the call
        assert_eq!(max_stack, 4);
    }

    #[test]
    fn underflow_is_rejected_at_emit() {
        let mut asm = InstructionAssembler::new();
        assert!(matches!(asm.pop(), Err(Error::StackUnderflow(0))));
    }

    #[test]
    fn call_underflow_is_rejected() {
        let mut asm = InstructionAssembler::new();
        asm.ldarg(0).unwrap();
        assert!(matches!(
            asm.call(send_message_ref()),
            Err(Error::StackUnderflow(_))
        ));
    }

    #[test]
    fn simulate_checks_ret_balance() {
        let instructions = vec![Instruction::LdcI4(1), Instruction::Ret];

        // Value-returning method: one value at ret is correct
        assert_eq!(simulate_stack(&instructions, true).unwrap(), 1);

        // Void method: the leftover value is an error
        assert!(matches!(
            simulate_stack(&instructions, false),
            Err(Error::UnbalancedStack {
                expected: 0,
                found: 1
            })
        ));
    }

    #[test]
    fn simulate_requires_trailing_ret() {
        let instructions = vec![Instruction::Nop];
        assert!(matches!(
            simulate_stack(&instructions, false),
            Err(Error::MissingReturn)
        ));
    }
}
