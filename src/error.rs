use thiserror::Error;

/// Errors raised while classifying an upload by its file extension
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    /// Format is recognized but has no converter (should map to HTTP 501)
    #[error("{extension} conversion not implemented")]
    NotImplemented { extension: String },

    /// Format is not recognized at all (should map to HTTP 400)
    #[error("Unsupported format: {extension}")]
    Unsupported { extension: String },
}

/// Errors that can occur while converting a mesh file to glTF
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Reading the source file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed statement in a text format
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Face references a vertex or normal that was never defined
    #[error("Index {index} out of range at line {line}: {count} {kind} defined")]
    IndexOutOfRange {
        line: usize,
        index: i64,
        count: usize,
        kind: &'static str,
    },

    /// Binary STL is shorter than its triangle count implies
    #[error("Truncated STL: expected {expected} bytes, got {actual}")]
    Truncated { expected: u64, actual: u64 },

    /// Binary STL record holds a NaN or infinite coordinate
    #[error("Non-finite coordinate in STL triangle {triangle}")]
    NonFinite { triangle: usize },

    /// Source contained no renderable triangles
    #[error("Model contains no triangles")]
    EmptyMesh,

    /// Text formats must be UTF-8
    #[error("Source is not valid UTF-8")]
    InvalidEncoding,
}

/// Errors from the filesystem model store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// glTF document could not be serialized
    #[error("Failed to serialize model: {0}")]
    Serialize(String),
}

/// Errors from the relational store
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// Query or connection failure reported by the database driver
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        RepositoryError::Database(err.to_string())
    }
}

/// Errors raised when turning a glTF document into a pickable scene
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoadError {
    /// Buffer references an external file; only embedded data URIs are supported
    #[error("Unsupported buffer URI: {0}")]
    UnsupportedUri(String),

    /// Buffer has no URI (GLB binary chunk)
    #[error("Buffer {0} has no URI")]
    MissingUri(usize),

    /// Data URI payload is not valid base64
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// Index into one of the document arrays is dangling
    #[error("Missing {kind} {index}")]
    MissingReference { kind: &'static str, index: usize },

    /// Accessor layout is not one the loader can read
    #[error("Unsupported accessor {index}: {reason}")]
    UnsupportedAccessor { index: usize, reason: String },

    /// Accessor reads past the end of its buffer
    #[error("Accessor {index} exceeds buffer bounds")]
    OutOfBounds { index: usize },

    /// Document has no scene to display
    #[error("Document has no scenes")]
    NoScene,
}

/// Errors from the viewer's HTTP API client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (connection refused, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned {status} ({error}): {message}")]
    Status {
        status: u16,
        error: String,
        message: String,
    },

    /// A protected call was made before a successful login
    #[error("Not logged in")]
    NotAuthenticated,

    /// Response body was not the expected JSON shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Fetched model could not be loaded into the scene
    #[error("Failed to load model: {0}")]
    Load(#[from] LoadError),
}
