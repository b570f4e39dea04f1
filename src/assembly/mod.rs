//! Instruction sequences and the assembler that produces them.
//!
//! The op set is deliberately small: it covers exactly what a forwarding shim body
//! needs - loading arguments, pushing constants, one numeric conversion, calling the
//! original method, discarding an unwanted result, and returning. Stack-depth
//! bookkeeping is built into [`InstructionAssembler`] and re-checked by
//! [`simulate_stack`] when a module is serialized.

mod assembler;
mod instruction;

pub use assembler::{simulate_stack, InstructionAssembler};
pub use instruction::{Instruction, MethodRef, Opcode};
