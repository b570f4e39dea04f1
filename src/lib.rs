#![deny(missing_docs)]
#![allow(dead_code)]

//! # shimworks
//!
//! Post-hoc patching for a compiled Steamworks wrapper module, without access to its
//! source. The patcher performs a fixed, small set of targeted mutations known in
//! advance:
//!
//! - **Binding retargeting** - every external binding pointing at a recognized alias
//!   of the old native library (`steam_api64`, `steam_api64.dll`) is redirected to the
//!   replacement (`steam_api64_v161`), across the whole type tree including nested
//!   types.
//! - **Shim synthesis** - new methods are injected into existing types that forward
//!   to the original methods with adjusted argument lists (trailing parameters
//!   supplied as fixed constants, results optionally discarded, two originals
//!   composed into one convenience call), so callers compiled against the old
//!   signatures keep working.
//!
//! The engine never corrupts the module when a target is missing: a shim target that
//! does not resolve is skipped and logged, and the one fatal condition - no binding
//! matched at all - aborts before anything is written.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shimworks::prelude::*;
//! use std::path::Path;
//!
//! let mut patcher = Patcher::new();
//! patcher.initialize();
//! let report = patcher.patch(
//!     Path::new("Facepunch.Steamworks.Win64.smod"),
//!     "Facepunch.Steamworks.Win64",
//!     Path::new("patchwork.smod"),
//! )?;
//! for skip in &report.shims_skipped {
//!     eprintln!("skipped {}: {}", skip.target, skip.reason);
//! }
//! patcher.finish();
//! # Ok::<(), shimworks::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - the in-memory module model: types, methods, parameters, external
//!   bindings, instruction-sequence bodies
//! - [`assembly`] - the instruction set and the stack-tracking assembler
//! - [`patch`] - symbol resolution, binding rewriting, shim synthesis, and the
//!   orchestrator with its lifecycle hooks

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;
pub(crate) mod write;

/// Instruction sequences and the assembler that produces them.
pub mod assembly;

/// In-memory representation of a binary module, with parsing and serialization.
pub mod metadata;

/// The patch engine: resolver, binding rewriter, shim synthesizer, orchestrator.
pub mod patch;

/// Convenient re-exports of the most commonly used types.
pub mod prelude {
    pub use crate::assembly::{Instruction, InstructionAssembler, MethodRef};
    pub use crate::metadata::{
        Method, MethodAttributes, MethodBody, MethodBodyKind, Module, PInvokeInfo, Parameter,
        TypeDef, TypeName,
    };
    pub use crate::patch::{PatchPlan, PatchReport, Patcher};
    pub use crate::{Error, Result};
}

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;
pub use file::{parser::Parser, InputFile};
pub use patch::{PatchPlan, PatchReport, Patcher};
