//! In-memory representation of a binary module.
//!
//! The model is the contract every patch operation is expressed against: a
//! [`Module`] owns a tree of [`TypeDef`]s, each owning [`Method`]s whose body is
//! either an external binding ([`PInvokeInfo`]) or an instruction sequence
//! ([`MethodBody`]). Parsing from and serializing back to the on-disk container
//! go through [`Module::from_bytes`] and [`Module::to_bytes`].

mod method;
mod module;
mod pinvoke;
mod typedef;
mod typename;

pub use method::{Method, MethodAttributes, MethodBody, MethodBodyKind, Parameter};
pub use module::Module;
pub use pinvoke::{PInvokeAttributes, PInvokeInfo};
pub use typedef::{TypeAttributes, TypeDef};
pub use typename::{TypeName, VOID};
