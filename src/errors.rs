use thiserror::Error;

/// Errors surfaced by scheduling object nodes and their backends.
///
/// Backend failures pass through untouched; the node never retries or
/// masks them.
#[derive(Debug, Error)]
pub enum SchedulingError {
    /// The node was built from metadata that cannot identify an object.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A mutation the resource contractually refuses.
    #[error("operation not supported: {0}")]
    OperationNotSupported(&'static str),

    #[error("scheduling object `{uri}` not found for principal `{principal_uri}`")]
    NotFound { principal_uri: String, uri: String },

    #[error("scheduling object `{uri}` already exists for principal `{principal_uri}`")]
    AlreadyExists { principal_uri: String, uri: String },

    #[error("invalid scheduling object uri")]
    InvalidObjectUri,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SchedulingError {
    /// True for contractual rejections, as opposed to backend or lookup failures.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, SchedulingError::OperationNotSupported(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SchedulingError::NotFound { .. })
    }
}

pub type SchedulingResult<T> = Result<T, SchedulingError>;
