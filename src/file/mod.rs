//! Physical access to module container files.
//!
//! The input module is memory-mapped rather than read into an owned buffer; the mapping
//! stays valid for as long as the [`InputFile`] is alive, which is why the patch context
//! holds on to it until its explicit finish step.

pub mod io;
pub mod parser;

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::Result;

/// An open, memory-mapped module container file.
///
/// Dropping the value unmaps the file and releases the handle. [`crate::patch::PatchContext`]
/// owns the instance for the duration of a patch operation so the release point is explicit.
pub struct InputFile {
    /// Keeps the underlying handle open for the lifetime of the mapping
    _file: File,
    map: Mmap,
}

impl InputFile {
    /// Open and map the file at `path` read-only.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn open(path: &Path) -> Result<InputFile> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and the file handle is held for its whole lifetime.
        let map = unsafe { Mmap::map(&file)? };

        Ok(InputFile { _file: file, map })
    }

    /// The raw bytes of the mapped file.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.map
    }
}
