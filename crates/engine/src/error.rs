use stride_core::error::CoreError;
use stride_core::types::DbId;

/// Boxed cause of a failed source-of-truth query.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reading from or writing to the source of truth.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source-of-truth query failed: {0}")]
    Query(#[source] BoxError),

    #[error("{entity} with id {id} not found in source of truth")]
    Missing { entity: &'static str, id: DbId },

    #[error("Concurrent progress update still conflicting after {attempts} attempts")]
    Conflict { attempts: u32 },
}

impl SourceError {
    pub fn query(err: impl Into<BoxError>) -> Self {
        Self::Query(err.into())
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Failure of an engine operation that has no degraded answer.
///
/// Cache failures never appear here: they are always recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

pub type EngineResult<T> = Result<T, EngineError>;
