use thiserror::Error;
use uuid::Uuid;

/// Failures returned by external capabilities (embedding, language model,
/// catalog). Transient variants are retried with backoff before surfacing.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("capability call timed out: {0}")]
    Timeout(String),

    #[error("provider failure: {0}")]
    Provider(String),

    #[error("malformed structured output: {0}")]
    MalformedOutput(String),
}

impl CapabilityError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CapabilityError::RateLimited(_) | CapabilityError::Timeout(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("version conflict on {record}: expected {expected}, found {found}")]
    Conflict {
        record: String,
        expected: u64,
        found: u64,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => PersistenceError::NotFound(err.to_string()),
            other => PersistenceError::Backend(other.to_string()),
        }
    }
}

/// Failure of a single pipeline stage. Transient failures abort the batch
/// only after the retry budget is exhausted; structural failures skip the
/// affected document and let the batch continue.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("transient failure in stage {stage}: {source}")]
    Transient {
        stage: &'static str,
        #[source]
        source: CapabilityError,
    },

    #[error("structural failure in document {document_id}: {message}")]
    Structural { document_id: Uuid, message: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Wraps any reconciliation failure with the entity it was operating on.
#[derive(Error, Debug)]
#[error("reconciliation of entity {entity} failed: {source}")]
pub struct ReconciliationError {
    pub entity: String,
    #[source]
    pub source: ReconciliationCause,
}

impl ReconciliationError {
    pub fn new(entity: impl Into<String>, source: impl Into<ReconciliationCause>) -> Self {
        Self {
            entity: entity.into(),
            source: source.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReconciliationCause {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("invalid task state: {0}")]
    InvalidTaskState(String),
}

#[derive(Error, Debug)]
pub enum GraphFuseError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type GraphFuseResult<T> = Result<T, GraphFuseError>;
pub type CapabilityResult<T> = Result<T, CapabilityError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;
