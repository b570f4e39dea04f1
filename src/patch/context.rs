//! Per-operation context owning the input stream.

use std::path::Path;

use crate::file::InputFile;
use crate::Result;

/// Owns the open input mapping for one patch operation.
///
/// The mapping must stay open for the duration of parsing and for any caller use of
/// the parsed structures afterwards, and must be released on every exit path,
/// including the fatal-abort path of the binding rewrite. Release is the explicit,
/// idempotent [`PatchContext::finish`]; dropping the context releases it as well, so
/// no exit path can leak the handle. No process-wide state is involved: each patch
/// operation constructs its own context.
#[derive(Default)]
pub struct PatchContext {
    input: Option<InputFile>,
}

impl PatchContext {
    /// Create a context holding no input yet.
    #[must_use]
    pub fn new() -> PatchContext {
        PatchContext { input: None }
    }

    /// Open and hold the input container at `path`, releasing any previously held one.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn open(&mut self, path: &Path) -> Result<&[u8]> {
        let input = InputFile::open(path)?;
        Ok(self.input.insert(input).data())
    }

    /// The bytes of the held input, if one is open.
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        self.input.as_ref().map(InputFile::data)
    }

    /// Release the held input. Safe to call any number of times.
    pub fn finish(&mut self) {
        self.input = None;
    }
}
