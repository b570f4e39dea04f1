//! External bindings: method bodies implemented by a symbol in a native library.

#[allow(non_snake_case)]
/// All possible flags for `PInvokeAttributes`
pub mod PInvokeAttributes {
    /// `PInvoke` is to use the member name as specified
    pub const NO_MANGLE: u32 = 0x0001;
    /// No character set was specified
    pub const CHAR_SET_NOT_SPEC: u32 = 0x0000;
    /// Marshal strings as ANSI
    pub const CHAR_SET_ANSI: u32 = 0x0002;
    /// Marshal strings as UTF-16
    pub const CHAR_SET_UNICODE: u32 = 0x0004;
    /// Marshal strings automatically per platform
    pub const CHAR_SET_AUTO: u32 = 0x0006;
    /// Character set mask
    pub const CHAR_SET_MASK: u32 = 0x0006;
    /// Information about target function. Not relevant for fields
    pub const SUPPORTS_LAST_ERROR: u32 = 0x0040;
    /// Calling convention mask
    pub const CALL_CONV_MASK: u32 = 0x0700;
    /// Calling convention = `WinAPI`
    pub const CALL_CONV_WINAPI: u32 = 0x0100;
    /// Calling convention = C
    pub const CALL_CONV_CDECL: u32 = 0x0200;
    /// Calling convention = `StdCall`
    pub const CALL_CONV_STDCALL: u32 = 0x0300;
    /// Calling convention = `ThisCall`
    pub const CALL_CONV_THISCALL: u32 = 0x0400;
    /// Calling convention = `FastCall`
    pub const CALL_CONV_FASTCALL: u32 = 0x0500;
}

/// The external binding of a method whose body lives in a native library.
///
/// The pair of `module` (the native library name, without any path) and `entry_point`
/// (the exported symbol) stands in place of an instruction-sequence body. Rewriting a
/// binding only ever touches `module`; the entry point and mapping flags are preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PInvokeInfo {
    /// Name of the native library providing the implementation
    pub module: String,
    /// Exported symbol name inside the native library
    pub entry_point: String,
    /// A 2-byte bitmask of type `PInvokeAttributes`
    pub flags: u32,
}

impl PInvokeInfo {
    /// Create a binding with the default WinAPI calling convention.
    pub fn new(module: impl Into<String>, entry_point: impl Into<String>) -> PInvokeInfo {
        PInvokeInfo {
            module: module.into(),
            entry_point: entry_point.into(),
            flags: PInvokeAttributes::CALL_CONV_WINAPI | PInvokeAttributes::SUPPORTS_LAST_ERROR,
        }
    }
}
