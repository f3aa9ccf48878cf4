mod config;
mod dataset;
mod engine;
mod error;
mod filter;
mod index;
pub mod query;
mod value;
mod worker;

pub use crate::dataset::{Dataset, DatasetInfo, Row};
pub use crate::engine::{CrossFilterEngine, EngineSnapshot, EngineState};
pub use crate::filter::FilterState;
pub use crate::index::{ColumnIndex, Index, IndexBuilder};
pub use crate::value::{Cell, RowId, Value};
pub use crate::worker::{BuildOutcome, IndexWorker};

pub use crate::config::{EngineOptions, DEFAULT_CANCEL_CHECK_INTERVAL};
pub use crate::query::{
    available_values, available_values_by_column, eligible_ids, filtered_rows, search_values,
};

pub use crate::error::{
    BuildError, BuildResult, DatasetError, DatasetResult, QueryError, QueryResult,
};
