//! The engine ties an index lifecycle to a filter state.
//!
//! ```text
//! NoIndex ──load──▶ Indexing ──ok──▶ Ready
//!                      ▲   └──err──▶ Failed
//!                      └────load────────┘ (from any state)
//! ```
//!
//! Only the build requested last may be installed. Installing swaps in a fully built
//! `Arc<Index>`, so readers holding a [`EngineSnapshot`] never observe a partial index.
use crate::config::EngineOptions;
use crate::dataset::{Dataset, Row};
use crate::error::{BuildError, QueryError, QueryResult};
use crate::filter::FilterState;
use crate::index::{Index, IndexBuilder};
use crate::query;
use crate::value::{RowId, Value};
use crate::worker::{BuildOutcome, IndexWorker};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineState {
    NoIndex,
    Indexing { generation: u64 },
    Ready { generation: u64 },
    Failed { generation: u64, error: BuildError },
}

impl EngineState {
    pub fn is_ready(&self) -> bool {
        matches!(self, EngineState::Ready { .. })
    }

    pub fn is_indexing(&self) -> bool {
        matches!(self, EngineState::Indexing { .. })
    }
}

/// A consistent (index, filters) pair that can be queried from any thread.
#[derive(Clone, Debug)]
pub struct EngineSnapshot {
    pub index: Arc<Index>,
    pub filters: FilterState,
}

impl EngineSnapshot {
    pub fn eligible_ids(&self) -> QueryResult<Cow<'_, HashSet<RowId>>> {
        query::eligible_ids(&self.index, &self.filters)
    }

    pub fn available_values(&self, column: &str) -> QueryResult<Vec<Value>> {
        query::available_values(&self.index, &self.filters, column)
    }

    pub fn available_values_by_column(&self) -> QueryResult<BTreeMap<String, Vec<Value>>> {
        query::available_values_by_column(&self.index, &self.filters)
    }

    pub fn filtered_rows(&self) -> QueryResult<Vec<&Row>> {
        query::filtered_rows(&self.index, &self.filters)
    }
}

pub struct CrossFilterEngine {
    options: EngineOptions,
    worker: Option<IndexWorker>,
    latest_generation: u64,
    state: EngineState,
    index: Option<Arc<Index>>,
    filters: FilterState,
}

impl Default for CrossFilterEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl CrossFilterEngine {
    pub fn new(options: EngineOptions) -> Self {
        let worker = options
            .background_build
            .then(|| IndexWorker::new(options.clone()));
        Self {
            options,
            worker,
            latest_generation: 0,
            state: EngineState::NoIndex,
            index: None,
            filters: FilterState::empty(),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn index(&self) -> Option<&Arc<Index>> {
        self.index.as_ref()
    }

    pub fn snapshot(&self) -> Option<EngineSnapshot> {
        Some(EngineSnapshot {
            index: Arc::clone(self.index.as_ref()?),
            filters: self.filters.clone(),
        })
    }

    /// Replace the dataset. The active index is dropped and the filter state reset to one
    /// inactive entry per column; a build for the new dataset starts immediately.
    ///
    /// Returns the generation of the requested build.
    pub fn load_dataset(&mut self, dataset: Arc<Dataset>, columns: Vec<String>) -> u64 {
        self.index = None;
        self.filters.reset_for_columns(&columns);

        let generation = match self.worker.as_mut() {
            Some(worker) => worker.submit(dataset, columns),
            None => {
                let generation = self.latest_generation + 1;
                self.latest_generation = generation;
                self.state = EngineState::Indexing { generation };
                let result = IndexBuilder::new()
                    .with_options(&self.options)
                    .with_generation(generation)
                    .build(dataset, &columns);
                self.install(BuildOutcome { generation, result });
                return generation;
            }
        };

        self.latest_generation = generation;
        self.state = EngineState::Indexing { generation };
        generation
    }

    /// Install a finished background build, if any, without blocking.
    pub fn poll(&mut self) -> &EngineState {
        while let Some(outcome) = self.worker.as_mut().and_then(IndexWorker::try_recv) {
            self.install(outcome);
        }
        &self.state
    }

    /// Block until the latest requested build has finished and been installed.
    pub fn wait(&mut self) -> &EngineState {
        while self.state.is_indexing() {
            let Some(outcome) = self.worker.as_mut().and_then(IndexWorker::recv) else {
                break;
            };
            self.install(outcome);
        }
        &self.state
    }

    fn install(&mut self, outcome: BuildOutcome) -> bool {
        let BuildOutcome { generation, result } = outcome;
        if generation != self.latest_generation {
            log::debug!(
                "discarding index generation {generation}; generation {} is current",
                self.latest_generation
            );
            return false;
        }

        match result {
            Ok(index) => {
                log::info!(
                    "installed index generation {generation} ({} rows)",
                    index.row_count()
                );
                self.filters.reset_for_columns(index.columns());
                self.index = Some(Arc::new(index));
                self.state = EngineState::Ready { generation };
            }
            Err(error) => {
                log::warn!("index generation {generation} failed: {error}");
                self.index = None;
                self.state = EngineState::Failed { generation, error };
            }
        }
        true
    }

    fn ready_index(&self) -> QueryResult<&Index> {
        match (&self.state, &self.index) {
            (EngineState::Ready { .. }, Some(index)) => Ok(index.as_ref()),
            _ => Err(QueryError::NotReady),
        }
    }

    pub fn set_filter(
        &mut self,
        column: &str,
        values: impl IntoIterator<Item = Value>,
    ) -> QueryResult<()> {
        self.ready_index()?;
        self.filters.set_filter(column, values);
        Ok(())
    }

    /// Select `value` if it is not selected, deselect it otherwise. Returns the new selection
    /// state of `value`.
    pub fn toggle_value(&mut self, column: &str, value: Value) -> QueryResult<bool> {
        self.ready_index()?;
        Ok(self.filters.toggle_value(column, value))
    }

    pub fn clear_filter(&mut self, column: &str) -> QueryResult<()> {
        self.ready_index()?;
        self.filters.clear_filter(column);
        Ok(())
    }

    pub fn clear_all(&mut self) -> QueryResult<()> {
        self.ready_index()?;
        self.filters.clear_all();
        Ok(())
    }

    /// Select every value currently available for `column`, or clear the column when all of
    /// them are already selected.
    pub fn select_all_available(&mut self, column: &str) -> QueryResult<()> {
        self.select_all_matching(column, "")
    }

    /// [`CrossFilterEngine::select_all_available`] restricted to the available values that
    /// match `search` (see [`query::search_values`]). The selection becomes exactly the
    /// matching values, or is cleared when all of them are already selected.
    pub fn select_all_matching(&mut self, column: &str, search: &str) -> QueryResult<()> {
        let available = query::available_values(self.ready_index()?, &self.filters, column)?;
        let matching = query::search_values(available, search);
        let all_selected = matching
            .iter()
            .all(|value| self.filters.is_selected(column, value));
        if all_selected {
            self.filters.clear_filter(column);
        } else {
            self.filters.set_filter(column, matching);
        }
        Ok(())
    }

    pub fn eligible_ids(&self) -> QueryResult<Cow<'_, HashSet<RowId>>> {
        query::eligible_ids(self.ready_index()?, &self.filters)
    }

    pub fn available_values(&self, column: &str) -> QueryResult<Vec<Value>> {
        query::available_values(self.ready_index()?, &self.filters, column)
    }

    pub fn available_values_by_column(&self) -> QueryResult<BTreeMap<String, Vec<Value>>> {
        query::available_values_by_column(self.ready_index()?, &self.filters)
    }

    pub fn filtered_rows(&self) -> QueryResult<Vec<&Row>> {
        query::filtered_rows(self.ready_index()?, &self.filters)
    }
}
