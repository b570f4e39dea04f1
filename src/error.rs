use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Variants fall into three groups that matter to callers:
///
/// - **Container errors** ([`Error::Malformed`], [`Error::OutOfBounds`], [`Error::NotSupported`],
///   [`Error::FileError`]) - the input module could not be parsed or the output could not be
///   written.
/// - **Fatal patch errors** ([`Error::NoBindingsMatched`]) - the module's binding layout has
///   diverged from what the patch assumes; the whole operation must abort and the caller is
///   expected to fall back to the unpatched module.
/// - **Per-target errors** ([`Error::TypeNotFound`], [`Error::MethodNotFound`]) - one shim
///   target is inapplicable. The orchestrator logs these and skips the target; they never
///   abort the run on their own.
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// Includes the source location where the malformation was detected for debugging.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The provided file is not a supported module container (bad magic or version).
    #[error("The file format or version is not supported!")]
    NotSupported,

    /// The maximum type nesting depth was exceeded while parsing.
    #[error("Maximum type nesting depth of {0} exceeded!")]
    RecursionLimit(usize),

    /// Error while accessing the file system.
    #[error("Error accessing the file - {0}")]
    FileError(#[from] std::io::Error),

    /// A type required by a patch step was not found in the module.
    #[error("Type '{0}' was not found in the module")]
    TypeNotFound(String),

    /// A method with the requested name and signature was not found on its type.
    #[error("Method '{0}' was not found")]
    MethodNotFound(String),

    /// No external binding in the entire module matched a recognized library alias.
    ///
    /// This is the one fatal patch condition: if the core binding cannot be found, none of
    /// the synthesized shims would resolve to working native calls either.
    #[error("No external bindings matched any recognized library alias")]
    NoBindingsMatched,

    /// A call instruction references a method that does not resolve inside the module.
    #[error("Call target '{0}' does not resolve inside the module")]
    UnresolvedCallTarget(String),

    /// A method or call target carries more parameters than the container can encode.
    #[error("'{name}' has {count} parameters, exceeding the container limit of 255")]
    TooManyParameters {
        /// Name of the offending method or call target
        name: String,
        /// Number of parameters it carries
        count: usize,
    },

    /// An instruction would pop more values than the operand stack holds.
    #[error("Operand stack underflow at instruction index {0}")]
    StackUnderflow(usize),

    /// The operand stack is not balanced at a return instruction.
    #[error("Operand stack holds {found} value(s) at ret, expected {expected}")]
    UnbalancedStack {
        /// Number of values expected on the stack at the return
        expected: usize,
        /// Number of values actually on the stack
        found: usize,
    },

    /// A method body declares a smaller max-stack than its instruction sequence requires.
    #[error("Declared max stack {declared} is below the required operand peak {required}")]
    InvalidMaxStack {
        /// The max-stack value declared in the method body
        declared: u16,
        /// The operand peak the instruction sequence actually reaches
        required: u16,
    },

    /// An instruction sequence does not end with a return instruction.
    #[error("Method body does not end with a ret instruction")]
    MissingReturn,

    /// Loading the replacement native library failed.
    #[error("Failed to load native library - {0}")]
    NativeLibrary(#[from] libloading::Error),
}
