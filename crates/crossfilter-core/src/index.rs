//! Index construction.
//!
//! An [`Index`] is derived state for exactly one [`Dataset`] version. It is never updated in
//! place: a new dataset gets a new index, built off the interactive path (see
//! [`IndexWorker`](crate::IndexWorker)) and swapped in whole.
//!
//! Per filterable column the index keeps:
//! - an inverted index `value -> {row ids}` whose buckets partition the full id set,
//! - a reverse index `row id -> value`, the functional inverse of that partition,
//! - the ascending list of distinct values (the column's catalog).
//!
//! Plus a forward map `row id -> row` shared across columns.
use crate::config::{EngineOptions, DEFAULT_CANCEL_CHECK_INTERVAL};
use crate::dataset::{Dataset, Row};
use crate::error::{BuildError, BuildResult};
use crate::value::{Cell, RowId, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Debug, Default)]
pub struct ColumnIndex {
    buckets: HashMap<Value, HashSet<RowId>>,
    reverse: HashMap<RowId, Value>,
    unique_values: Vec<Value>,
}

impl ColumnIndex {
    /// Row ids holding `value` in this column.
    pub fn bucket(&self, value: &Value) -> Option<&HashSet<RowId>> {
        self.buckets.get(value)
    }

    pub fn buckets(&self) -> &HashMap<Value, HashSet<RowId>> {
        &self.buckets
    }

    /// The value of `row` in this column.
    pub fn value_of(&self, row: RowId) -> Option<Value> {
        self.reverse.get(&row).copied()
    }

    pub fn reverse(&self) -> &HashMap<RowId, Value> {
        &self.reverse
    }

    /// Distinct values in ascending order.
    pub fn unique_values(&self) -> &[Value] {
        &self.unique_values
    }

    fn with_capacity(rows: usize) -> Self {
        Self {
            buckets: HashMap::new(),
            reverse: HashMap::with_capacity(rows),
            unique_values: Vec::new(),
        }
    }

    fn insert(&mut self, row: RowId, value: Value) {
        if let Some(previous) = self.reverse.insert(row, value) {
            // A repeated id: the later row wins, so pull the id out of the bucket it was in.
            if previous != value {
                if let Some(bucket) = self.buckets.get_mut(&previous) {
                    bucket.remove(&row);
                    if bucket.is_empty() {
                        self.buckets.remove(&previous);
                    }
                }
            }
        }
        self.buckets.entry(value).or_default().insert(row);
    }

    fn finish(&mut self) {
        let mut unique: Vec<Value> = self.buckets.keys().copied().collect();
        unique.sort_unstable();
        self.unique_values = unique;
    }
}

/// The four derived structures for one dataset version.
#[derive(Clone, Debug)]
pub struct Index {
    generation: u64,
    dataset: Arc<Dataset>,
    forward: HashMap<RowId, usize>,
    row_ids: HashSet<RowId>,
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    column_indexes: Vec<ColumnIndex>,
}

impl Index {
    /// Build generation this index was produced by (0 for indexes built outside a worker).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    /// Forward map lookup.
    pub fn row(&self, id: RowId) -> Option<&Row> {
        let pos = *self.forward.get(&id)?;
        self.dataset.rows().get(pos)
    }

    /// Every row id in the dataset version.
    pub fn row_ids(&self) -> &HashSet<RowId> {
        &self.row_ids
    }

    pub fn row_count(&self) -> usize {
        self.row_ids.len()
    }

    /// Indexed (filterable) columns, in the order they were requested.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, column: &str) -> Option<&ColumnIndex> {
        let idx = *self.column_index.get(column)?;
        self.column_indexes.get(idx)
    }

    /// The column's catalog: its distinct values in ascending order.
    pub fn unique_values(&self, column: &str) -> Option<&[Value]> {
        self.column(column).map(ColumnIndex::unique_values)
    }
}

/// Builds an [`Index`] from a dataset in a single pass over its rows.
#[derive(Clone, Debug)]
pub struct IndexBuilder {
    generation: u64,
    cancel: Option<Arc<AtomicBool>>,
    cancel_check_interval: usize,
    parallel: bool,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self {
            generation: 0,
            cancel: None,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
            parallel: false,
        }
    }

    pub fn with_options(mut self, options: &EngineOptions) -> Self {
        self.cancel_check_interval = options.cancel_check_interval.max(1);
        self.parallel = options.parallel_build;
        self
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Abort with [`BuildError::Cancelled`] once `flag` is observed set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn build(&self, dataset: Arc<Dataset>, columns: &[String]) -> BuildResult<Index> {
        if dataset.is_empty() {
            return Err(BuildError::EmptyDataset);
        }

        let started = Instant::now();
        let mut names: Vec<String> = Vec::with_capacity(columns.len());
        let mut positions: Vec<usize> = Vec::with_capacity(columns.len());
        let mut column_index: HashMap<String, usize> = HashMap::with_capacity(columns.len());
        for name in columns {
            if column_index.contains_key(name) {
                continue;
            }
            let pos = dataset
                .column_position(name)
                .ok_or_else(|| BuildError::UnknownColumn(name.clone()))?;
            column_index.insert(name.clone(), names.len());
            names.push(name.clone());
            positions.push(pos);
        }

        log::debug!(
            "building index generation {} over {} rows x {} columns",
            self.generation,
            dataset.len(),
            names.len()
        );

        let (forward, column_indexes, duplicates) = if self.parallel_enabled() {
            self.build_parallel(&dataset, &names, &positions)?
        } else {
            self.build_sequential(&dataset, &names, &positions)?
        };

        if duplicates > 0 {
            log::warn!(
                "index generation {}: {duplicates} rows reuse an earlier row id; later rows win",
                self.generation
            );
        }

        let row_ids: HashSet<RowId> = forward.keys().copied().collect();
        log::info!(
            "built index generation {} ({} rows, {} columns, distinct values {:?}) in {:?}",
            self.generation,
            row_ids.len(),
            names.len(),
            column_indexes
                .iter()
                .map(|c| c.unique_values.len())
                .collect::<Vec<_>>(),
            started.elapsed()
        );

        Ok(Index {
            generation: self.generation,
            dataset,
            forward,
            row_ids,
            columns: names,
            column_index,
            column_indexes,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn check_cancelled(&self, pos: usize) -> BuildResult<()> {
        if pos % self.cancel_check_interval == 0 && self.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        Ok(())
    }

    fn build_sequential(
        &self,
        dataset: &Dataset,
        names: &[String],
        positions: &[usize],
    ) -> BuildResult<(HashMap<RowId, usize>, Vec<ColumnIndex>, usize)> {
        let rows = dataset.rows();
        let mut forward: HashMap<RowId, usize> = HashMap::with_capacity(rows.len());
        let mut column_indexes: Vec<ColumnIndex> = positions
            .iter()
            .map(|_| ColumnIndex::with_capacity(rows.len()))
            .collect();
        let mut duplicates = 0usize;

        for (pos, row) in rows.iter().enumerate() {
            self.check_cancelled(pos)?;
            if forward.insert(row.id, pos).is_some() {
                duplicates += 1;
            }
            for ((column, &idx), name) in column_indexes.iter_mut().zip(positions).zip(names) {
                column.insert(row.id, numeric_cell(row, idx, name)?);
            }
        }

        for column in &mut column_indexes {
            column.finish();
        }
        Ok((forward, column_indexes, duplicates))
    }

    #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
    fn parallel_enabled(&self) -> bool {
        self.parallel
    }

    #[cfg(not(all(feature = "parallel", not(target_arch = "wasm32"))))]
    fn parallel_enabled(&self) -> bool {
        false
    }

    #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
    fn build_parallel(
        &self,
        dataset: &Dataset,
        names: &[String],
        positions: &[usize],
    ) -> BuildResult<(HashMap<RowId, usize>, Vec<ColumnIndex>, usize)> {
        use rayon::prelude::*;

        let rows = dataset.rows();
        let mut forward: HashMap<RowId, usize> = HashMap::with_capacity(rows.len());
        let mut duplicates = 0usize;
        for (pos, row) in rows.iter().enumerate() {
            self.check_cancelled(pos)?;
            if forward.insert(row.id, pos).is_some() {
                duplicates += 1;
            }
        }

        let column_indexes = positions
            .par_iter()
            .zip(names.par_iter())
            .map(|(&idx, name)| -> BuildResult<ColumnIndex> {
                let mut column = ColumnIndex::with_capacity(rows.len());
                for (pos, row) in rows.iter().enumerate() {
                    self.check_cancelled(pos)?;
                    column.insert(row.id, numeric_cell(row, idx, name)?);
                }
                column.finish();
                Ok(column)
            })
            .collect::<BuildResult<Vec<ColumnIndex>>>()?;

        Ok((forward, column_indexes, duplicates))
    }

    #[cfg(not(all(feature = "parallel", not(target_arch = "wasm32"))))]
    fn build_parallel(
        &self,
        dataset: &Dataset,
        names: &[String],
        positions: &[usize],
    ) -> BuildResult<(HashMap<RowId, usize>, Vec<ColumnIndex>, usize)> {
        self.build_sequential(dataset, names, positions)
    }
}

fn numeric_cell(row: &Row, idx: usize, column: &str) -> BuildResult<Value> {
    row.cell(idx)
        .and_then(Cell::as_value)
        .ok_or_else(|| BuildError::NonNumericValue {
            column: column.to_string(),
            row: row.id,
        })
}
