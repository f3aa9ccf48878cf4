#![allow(dead_code)]

use crossfilter_core::{Cell, Dataset, Index, IndexBuilder, RowId, Value};
use std::collections::HashSet;
use std::sync::Arc;

pub const MODULO_COLUMNS: [&str; 3] = ["number", "mod2", "mod3"];

pub fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// Rows `{id:1, number:1, mod3:1}`, `{id:2, number:2, mod3:2}`, `{id:3, number:3, mod3:0}`.
pub fn three_row_dataset() -> Arc<Dataset> {
    let mut dataset = Dataset::new(vec!["number", "mod3"]).unwrap();
    for n in 1..=3i64 {
        dataset
            .push_row(n as u64, vec![Cell::from(n), Cell::from(n % 3)])
            .unwrap();
    }
    Arc::new(dataset)
}

/// `number` = 1..=rows, `mod2` = number % 2, `mod3` = number % 3, plus a text `label` column
/// that is never indexed.
pub fn modulo_dataset(rows: u64) -> Arc<Dataset> {
    let mut dataset = Dataset::new(vec!["number", "mod2", "mod3", "label"]).unwrap();
    for n in 1..=rows {
        let label = format!("row-{n}");
        dataset
            .push_row(
                n,
                vec![
                    Cell::Number(n as f64),
                    Cell::Number((n % 2) as f64),
                    Cell::Number((n % 3) as f64),
                    Cell::from(label.as_str()),
                ],
            )
            .unwrap();
    }
    Arc::new(dataset)
}

pub fn build_index(dataset: Arc<Dataset>, names: &[&str]) -> Index {
    IndexBuilder::new().build(dataset, &columns(names)).unwrap()
}

pub fn sorted_ids<'a>(ids: impl IntoIterator<Item = &'a RowId>) -> Vec<u64> {
    let mut ids: Vec<u64> = ids.into_iter().map(|id| id.get()).collect();
    ids.sort_unstable();
    ids
}

pub fn values(raw: &[i64]) -> Vec<Value> {
    raw.iter().map(|&v| Value::from(v)).collect()
}

/// Checks the structural invariants every built index must satisfy.
pub fn assert_index_invariants(index: &Index) {
    let all: &HashSet<RowId> = index.row_ids();
    assert_eq!(all.len(), index.row_count());
    for id in all {
        let row = index.row(*id).expect("forward map covers every id");
        assert_eq!(row.id, *id);
    }

    for name in index.columns() {
        let column = index.column(name).expect("indexed column");

        // Buckets partition the id set.
        let mut seen: HashSet<RowId> = HashSet::new();
        for (value, bucket) in column.buckets() {
            assert!(!bucket.is_empty(), "empty bucket for {value} in {name}");
            for id in bucket {
                assert!(seen.insert(*id), "{id} appears in two buckets of {name}");
                assert_eq!(column.value_of(*id), Some(*value));
            }
        }
        assert_eq!(&seen, all);

        // Reverse index is the inverse of the partition.
        assert_eq!(column.reverse().len(), all.len());

        // Catalog is the sorted, distinct key set of the buckets.
        let catalog = column.unique_values();
        assert!(catalog.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(catalog.len(), column.buckets().len());
        assert!(catalog.iter().all(|v| column.bucket(v).is_some()));
    }
}
