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

macro_rules! unsupported_error {
    ($msg:expr) => {
        crate::Error::UnsupportedSignature($msg.to_string())
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::UnsupportedSignature(format!($fmt, $($arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers all possible error conditions that can occur during marshalling descriptor
/// parsing, interop signature classification, and stub emission. Each variant provides specific
/// context about the failure mode to enable appropriate error handling.
///
/// # Error Categories
///
/// ## Descriptor Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid descriptor blob
/// - [`Error::OutOfBounds`] - Attempted to read beyond the descriptor boundaries
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::RecursionLimit`] - Maximum nesting depth exceeded
///
/// ## Signature Errors
/// - [`Error::UnsupportedSignature`] - The signature cannot be marshalled
/// - [`Error::InvalidSizeParamIndex`] - A `SizeParamIndex` is out of range or non-integral
/// - [`Error::TypeError`] - General type operation error
///
/// # Examples
///
/// ```rust
/// use dotstub::{Error, StubGenerator, MarshalPolicy};
/// use dotstub::metadata::{SignatureMethod, SignatureParameter, TypeSignature};
///
/// let signature = SignatureMethod::pinvoke(
///     SignatureParameter::returning(TypeSignature::Object),
///     vec![],
/// );
/// match StubGenerator::forward(&signature, MarshalPolicy::unicode()).generate() {
///     Ok(stub) => println!("Generated {} instructions", stub.instructions.len()),
///     Err(Error::UnsupportedSignature(reason)) => eprintln!("Rejected: {}", reason),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The descriptor blob is damaged and could not be parsed.
    ///
    /// This error indicates that a marshalling descriptor does not conform to the
    /// ECMA-335 II.23.2.9 format. The error includes the source location where the
    /// malformation was detected for debugging purposes.
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

    /// An out of bound access was attempted while parsing a descriptor.
    ///
    /// This error occurs when trying to read data beyond the end of the descriptor
    /// blob. It's a safety check to prevent buffer overruns during parsing.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Provided input was empty.
    ///
    /// This error occurs when an empty descriptor blob is provided where actual
    /// marshalling data was expected.
    #[error("Provided input was empty")]
    Empty,

    /// Recursion limit reached.
    ///
    /// To prevent stack overflow while parsing nested descriptors or classifying
    /// nested array element types, a maximum recursion depth is enforced. This
    /// error indicates that limit was exceeded.
    ///
    /// The associated value shows the recursion limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// The signature cannot be marshalled.
    ///
    /// Classification produced an invalid marshaller kind, or emission reached a
    /// kind for which no conversion exists. The associated message names the
    /// offending parameter and the reason, suitable for a host-compiler diagnostic.
    #[error("Signature cannot be marshalled - {0}")]
    UnsupportedSignature(String),

    /// A `SizeParamIndex` descriptor field is unusable.
    ///
    /// The index either points outside the parameter list or at a parameter whose
    /// type is not an integral type, so it cannot carry an element count.
    #[error("Invalid SizeParamIndex {index}: {message}")]
    InvalidSizeParamIndex {
        /// The parameter index taken from the descriptor
        index: u32,
        /// Why the index was rejected
        message: &'static str,
    },

    /// General error during type operations.
    ///
    /// Covers type manipulations that can fail, such as taking the element type
    /// of a non-array or mapping a kind with no native representation.
    #[error("{0}")]
    TypeError(String),
}
