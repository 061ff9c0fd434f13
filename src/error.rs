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

macro_rules! invalid_operation {
    ($msg:expr) => {
        crate::Error::InvalidOperation($msg.to_string())
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvalidOperation(format!($fmt, $($arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Format violations
/// - [`Error::Malformed`] - Corrupted or inconsistent metadata
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
/// - [`Error::NotSupported`] - Valid metadata using a layout this crate does not handle
/// - [`Error::RecursionLimit`] - Signature nesting deeper than the configured limit
///
/// ## Resolution failures
/// - [`Error::Resolution`] - A reference could not be bound where a definition is mandatory
///
/// ## API misuse
/// - [`Error::InvalidOperation`] - e.g. writing a reference from a foreign module
/// - [`Error::LockError`] - A shared module lock was poisoned
///
/// # Examples
///
/// ```rust
/// use dotmeta::{Error, ModuleDefinition};
///
/// match ModuleDefinition::from_mem(vec![0u8; 4]) {
///     Ok(_) => unreachable!(),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed metadata: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The metadata is damaged and could not be parsed.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the data.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The metadata uses a layout which is not supported, e.g. the uncompressed `#-` table stream.
    #[error("This metadata layout is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A reference could not be resolved to its definition in a context that requires one.
    ///
    /// Resolver APIs report a plain miss as `Ok(None)`; this variant is reserved for call
    /// sites that cannot continue without the definition (enum-typed attribute arguments,
    /// generic placeholders imported without an owner frame).
    #[error("Resolution failed - {0}")]
    Resolution(String),

    /// The requested operation is not valid for the current state of the object graph.
    #[error("Invalid operation - {0}")]
    InvalidOperation(String),

    /// Nesting inside a signature exceeded the configured depth.
    #[error("Reached the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Failed to acquire the lock of a shared module.
    #[error("Failed to lock target")]
    LockError,
}
