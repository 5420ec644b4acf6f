use thiserror::Error;

macro_rules! internal_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Internal {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Internal {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The kind of reference that failed to resolve.
///
/// Carried by [`Error::ResolutionFailed`] so callers can distinguish a missing type from a
/// missing method or field without parsing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ReferenceKind {
    /// A type reference or type signature
    Type,
    /// A method reference, member reference or method specification
    Method,
    /// A field reference
    Field,
    /// An assembly named by a root or an attribute argument
    Assembly,
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The mark phase is best-effort with respect to the analysed program: unrecognized reflection
/// and malformed dependency attributes degrade to [`crate::linker::Diagnostics`] entries instead
/// of errors. The variants here are the conditions that stop a run.
///
/// # Error Categories
///
/// ## Resolution Errors
/// - [`Error::ResolutionFailed`] - A reference could not be resolved and the configuration does
///   not allow ignoring it
/// - [`Error::MissingAssemblyAction`] - An assembly was reached before an action was assigned
///
/// ## Invariant Violations
/// - [`Error::Internal`] - An internal consistency check failed
/// - [`Error::GraphError`] - A provenance graph operation referenced an unknown node
/// - [`Error::RecursionLimit`] - A type hierarchy walk exceeded the allowed depth
///
/// ## External Errors
/// - [`Error::Serialization`] - JSON encoding or decoding failed
///
/// # Examples
///
/// ```rust,ignore
/// use reachscope::{Error, linker::LinkContext};
///
/// match context.mark() {
///     Ok(()) => println!("fixpoint reached"),
///     Err(Error::ResolutionFailed { kind, name }) => {
///         eprintln!("unresolved {kind}: {name}");
///     }
///     Err(e) => eprintln!("link failed: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A type, method or field reference could not be resolved to a definition.
    ///
    /// Only returned when [`crate::linker::LinkerConfig::ignore_unresolved`] is off. In ignore
    /// mode the reference is logged and treated as a dead end.
    ///
    /// # Fields
    ///
    /// * `kind` - What kind of reference failed
    /// * `name` - The textual name of the reference as recorded in the member model
    #[error("Failed to resolve {kind} - {name}")]
    ResolutionFailed {
        /// The kind of the unresolved reference
        kind: ReferenceKind,
        /// The name recorded for the unresolved reference
        name: String,
    },

    /// An internal invariant of the analysis was violated.
    ///
    /// Raised when a dependency reason that requires a source arrives without one, when an
    /// entry node of the provenance graph would be downgraded, or when a reference has a shape
    /// the caller cannot handle. These indicate a bug in the driver rather than in the input.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of the violated invariant
    /// * `file` - Source file where the violation was detected
    /// * `line` - Source line where the violation was detected
    #[error("Internal - {file}:{line}: {message}")]
    Internal {
        /// The message to be printed for the Internal error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An assembly was queried for its action before one was registered.
    ///
    /// Every assembly of the universe must carry an explicit action before the mark phase
    /// touches it. The associated value is the assembly name.
    #[error("No action registered for assembly - {0}")]
    MissingAssemblyAction(String),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// Recursion limit reached.
    ///
    /// Base type chains are walked iteratively with a depth limit so that a cyclic hierarchy in
    /// a malformed model cannot hang the analysis. The associated value is the limit.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Provenance graph error.
    ///
    /// Raised by [`crate::utils::graph::DirectedGraph`] when an edge names a node that does not
    /// exist in the graph.
    #[error("{0}")]
    GraphError(String),

    /// Failure while encoding a report or decoding a configuration as JSON.
    #[error("{0}")]
    Serialization(#[from] serde_json::Error),
}
