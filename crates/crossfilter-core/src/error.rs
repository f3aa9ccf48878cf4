use crate::value::RowId;

pub type BuildResult<T> = Result<T, BuildError>;
pub type QueryResult<T> = Result<T, QueryError>;
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Failure to produce an [`Index`](crate::Index) for a dataset version.
///
/// A failed build never installs anything; the engine moves to
/// [`EngineState::Failed`](crate::EngineState::Failed) until the next dataset is loaded.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("cannot index an empty dataset")]
    EmptyDataset,

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("non-numeric value in column {column} for row {row}")]
    NonNumericValue { column: String, row: RowId },

    #[error("index build was cancelled")]
    Cancelled,

    #[error("index build worker exited without reporting a result")]
    WorkerLost,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("no index is installed")]
    NotReady,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DatasetError {
    #[error("schema mismatch: expected {expected} values, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
}
