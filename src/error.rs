use thiserror::Error;

/// Result alias used by the viewer layers.
pub type ViewerResult<T> = std::result::Result<T, ViewerError>;

/// Errors raised while resolving documents from storage
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Local filesystem error
    #[error("I/O error: {0}")]
    Io(String),

    /// Document does not exist in the storage
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Identifier is not acceptable for this storage (e.g. path traversal)
    #[error("Invalid document identifier: {0}")]
    InvalidIdentifier(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Errors raised by format detection and format adapters
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// No adapter understands this document
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// The adapter recognised the format but could not parse it
    #[error("Corrupt document: {reason}")]
    CorruptDocument { reason: String },
}

/// Errors raised by a page renderer for a single page
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// Source raster data could not be decoded
    #[error("decode failed: {0}")]
    Decode(String),

    /// Output could not be encoded
    #[error("encode failed: {0}")]
    Encode(String),

    /// Renderer does not support this page/target combination
    #[error("unsupported page content: {0}")]
    Unsupported(String),
}

/// License/activation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LicenseError {
    /// No license key was configured
    #[error("No license key configured")]
    Missing,

    /// The key is not in `licensee:expiry:signature` form
    #[error("Malformed license key")]
    Malformed,

    /// The license expired
    #[error("License expired at {expired_at} (current time: {current_time})")]
    Expired { expired_at: u64, current_time: u64 },

    /// Signature does not match the licensee and expiry
    #[error("Invalid license signature")]
    InvalidSignature,
}

/// Errors surfaced to callers of the viewer service
#[derive(Debug, Clone, Error)]
pub enum ViewerError {
    /// No adapter is able to load the document
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// The document could not be parsed
    #[error("Corrupt document: {reason}")]
    CorruptDocument { reason: String },

    /// Page number outside `1..=page_count`
    #[error("Invalid page number {page} (document has {page_count} pages)")]
    InvalidPageNumber { page: u32, page_count: u32 },

    /// Rotation angle is not a multiple of 90 degrees
    #[error("Invalid rotation angle {angle}: must be a multiple of 90")]
    InvalidRotation { angle: i32 },

    /// Render options are inconsistent
    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    /// Resource was never registered for this document
    #[error("Resource '{resource}' not found for document '{document}'")]
    ResourceNotFound { document: String, resource: String },

    /// Attachment does not exist in the parent document
    #[error("Attachment '{attachment}' not found in document '{document}'")]
    AttachmentNotFound { document: String, attachment: String },

    /// Rendering a page failed; the whole render call fails
    #[error("Failed to render page {page}: {cause}")]
    RenderFailure {
        page: u32,
        #[source]
        cause: RenderError,
    },

    /// License gate rejected the call
    #[error("License error: {0}")]
    License(#[from] LicenseError),

    /// Artifact store could not be read or written
    #[error("Cache I/O error: {0}")]
    CacheIo(String),

    /// Document does not exist
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(StorageError),

    /// Render was cancelled through its cancellation token
    #[error("Render cancelled")]
    Cancelled,

    /// Writing exported pages failed
    #[error("Export to '{path}' failed: {reason}")]
    Export { path: String, reason: String },

    /// A worker task failed unexpectedly
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ViewerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => ViewerError::DocumentNotFound(id),
            other => ViewerError::Storage(other),
        }
    }
}

impl From<FormatError> for ViewerError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::UnsupportedFormat { reason } => ViewerError::UnsupportedFormat { reason },
            FormatError::CorruptDocument { reason } => ViewerError::CorruptDocument { reason },
        }
    }
}
