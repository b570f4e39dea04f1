//! The root module unit.

use std::path::Path;

use uguid::Guid;

use crate::file::{parser::Parser, InputFile};
use crate::metadata::TypeDef;
use crate::Result;

/// An in-memory binary module: identity plus the owned type tree.
///
/// The whole graph is created by parsing an input container, mutated in place by the
/// patch steps, serialized exactly once, and then discarded. Ownership is strictly
/// tree-shaped; only call instructions hold non-owning cross-references between methods.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Identity name callers reference the module by; must match the module being replaced
    pub name: String,
    /// 16-byte module version id
    pub mvid: Guid,
    /// Top-level type declarations
    pub types: Vec<TypeDef>,
}

impl Module {
    /// Create an empty module with a zero mvid.
    pub fn new(name: impl Into<String>) -> Module {
        Module {
            name: name.into(),
            mvid: Guid::ZERO,
            types: Vec::new(),
        }
    }

    /// Parse a module from container bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for an unknown magic or version, and
    /// container errors for truncated or malformed input.
    pub fn from_bytes(data: &[u8]) -> Result<Module> {
        Parser::new(data).parse()
    }

    /// Open, map, and parse the container file at `path`.
    ///
    /// The mapping is released when parsing completes. Callers that need the input to
    /// stay open across the whole patch operation hold it in a
    /// [`crate::patch::PatchContext`] instead and use [`Module::from_bytes`].
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] on I/O failure, otherwise as [`Module::from_bytes`].
    pub fn from_file(path: &Path) -> Result<Module> {
        let input = InputFile::open(path)?;
        Module::from_bytes(input.data())
    }

    /// Serialize the module to container bytes.
    ///
    /// # Errors
    /// Fails if a call instruction does not resolve inside the module or a method body
    /// declares an insufficient max-stack.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crate::write::to_bytes(self)
    }

    /// Serialize the module and write it to `path`.
    ///
    /// # Errors
    /// As [`Module::to_bytes`], plus [`crate::Error::FileError`] on write failure.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
