use crate::shape::Shape;

/// All errors that can occur within skein.
///
/// Structural failures (`ShapeMismatch`, `SchemaIntegrity`, `Lookup`) are
/// raised while a schema is being declared and validated, never in the middle
/// of a forward or backward pass. `OpFailed` carries failures reported by
/// caller-supplied operations, which the engine propagates untouched.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A declared shape is inconsistent with what its producer promises
    /// (duplicate thread, non-subset view, bad reduction, op contract).
    #[error("shape mismatch at {site}: {reason}")]
    ShapeMismatch { site: String, reason: String },

    /// The schema itself is malformed: undeclared node, two writers,
    /// out-of-order edges or a cycle.
    #[error("schema integrity violated at {site}: {reason}")]
    SchemaIntegrity { site: String, reason: String },

    /// A node identity has no storage slot in the registry.
    #[error("no storage slot registered for `{node}`")]
    Lookup { node: String },

    /// Element count mismatch when creating a tensor from a vec.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Multi-index outside the bounds of a shape.
    #[error("index {index:?} out of bounds for shape {shape}")]
    IndexOutOfBounds { index: Vec<usize>, shape: Shape },

    /// A plug-in operation reported a failure of its own.
    #[error("operation `{op}` failed: {message}")]
    OpFailed { op: String, message: String },

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    pub fn shape_mismatch(site: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ShapeMismatch {
            site: site.into(),
            reason: reason.into(),
        }
    }

    pub fn schema_integrity(site: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::SchemaIntegrity {
            site: site.into(),
            reason: reason.into(),
        }
    }

    pub fn lookup(node: impl Into<String>) -> Self {
        Error::Lookup { node: node.into() }
    }

    /// Wrap a failure raised inside a plug-in operation.
    pub fn op_failed(op: impl Into<String>, message: impl Into<String>) -> Self {
        Error::OpFailed {
            op: op.into(),
            message: message.into(),
        }
    }
}

/// Convenience Result type used throughout skein.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
