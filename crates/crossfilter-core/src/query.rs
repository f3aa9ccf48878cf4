//! The intersection engine.
//!
//! Every function here is a pure read of an [`Index`] and a [`FilterState`]: nothing is cached
//! between calls, so any number of callers can evaluate queries against the same snapshot
//! concurrently.
//!
//! Filters are resolved per column into an OR-set (the union of the buckets of every selected
//! value) and the OR-sets are folded with set intersection. Each fold step iterates the smaller
//! operand and probes the larger, and the fold stops as soon as the running set is empty.
use crate::dataset::Row;
use crate::error::{QueryError, QueryResult};
use crate::filter::FilterState;
use crate::index::{ColumnIndex, Index};
use crate::value::{RowId, Value};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

/// Row ids that satisfy every active filter.
///
/// With no active filter this borrows the index's full id set. Iteration order of the result is
/// unspecified; use [`filtered_rows`] for a stable order.
pub fn eligible_ids<'a>(
    index: &'a Index,
    filters: &FilterState,
) -> QueryResult<Cow<'a, HashSet<RowId>>> {
    eligible_ids_except(index, filters, None)
}

/// Values of `column` still reachable under every active filter on the *other* columns, in
/// ascending order.
///
/// `column`'s own selection never narrows its own options.
pub fn available_values(
    index: &Index,
    filters: &FilterState,
    column: &str,
) -> QueryResult<Vec<Value>> {
    let target = index
        .column(column)
        .ok_or_else(|| QueryError::UnknownColumn(column.to_string()))?;
    available_for(index, filters, column, target)
}

/// [`available_values`] for every indexed column.
pub fn available_values_by_column(
    index: &Index,
    filters: &FilterState,
) -> QueryResult<BTreeMap<String, Vec<Value>>> {
    let pairs = per_column(index, |column| {
        Ok((column.to_string(), available_values(index, filters, column)?))
    })?;
    Ok(pairs.into_iter().collect())
}

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
fn per_column<T, F>(index: &Index, f: F) -> QueryResult<Vec<T>>
where
    T: Send,
    F: Fn(&str) -> QueryResult<T> + Sync + Send,
{
    use rayon::prelude::*;

    index.columns().par_iter().map(|column| f(column)).collect()
}

#[cfg(not(all(feature = "parallel", not(target_arch = "wasm32"))))]
fn per_column<T, F>(index: &Index, f: F) -> QueryResult<Vec<T>>
where
    F: Fn(&str) -> QueryResult<T>,
{
    index.columns().iter().map(|column| f(column)).collect()
}

/// Eligible rows resolved through the forward map, ordered by row id.
pub fn filtered_rows<'a>(index: &'a Index, filters: &FilterState) -> QueryResult<Vec<&'a Row>> {
    let eligible = eligible_ids(index, filters)?;
    let mut ids: Vec<RowId> = eligible.iter().copied().collect();
    ids.sort_unstable();
    Ok(ids.into_iter().filter_map(|id| index.row(id)).collect())
}

/// Narrow `values` to those whose displayed form contains `term`, ignoring case. A blank term
/// keeps everything.
pub fn search_values(values: Vec<Value>, term: &str) -> Vec<Value> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return values;
    }
    values
        .into_iter()
        .filter(|value| value.to_string().to_lowercase().contains(&term))
        .collect()
}

fn available_for(
    index: &Index,
    filters: &FilterState,
    column: &str,
    target: &ColumnIndex,
) -> QueryResult<Vec<Value>> {
    if filters.active_filters_except(Some(column)).is_empty() {
        return Ok(target.unique_values().to_vec());
    }

    let eligible = eligible_ids_except(index, filters, Some(column))?;
    if eligible.is_empty() {
        return Ok(Vec::new());
    }

    let distinct: HashSet<Value> = eligible
        .iter()
        .filter_map(|&id| target.value_of(id))
        .collect();
    let mut values: Vec<Value> = distinct.into_iter().collect();
    values.sort_unstable();
    Ok(values)
}

fn eligible_ids_except<'a>(
    index: &'a Index,
    filters: &FilterState,
    excluded: Option<&str>,
) -> QueryResult<Cow<'a, HashSet<RowId>>> {
    let active = filters.active_filters_except(excluded);
    if active.is_empty() {
        return Ok(Cow::Borrowed(index.row_ids()));
    }

    // Resolve every column up front so an unknown column is reported even when an earlier
    // column already emptied the result.
    let mut resolved: Vec<(&'a ColumnIndex, &HashSet<Value>)> = Vec::with_capacity(active.len());
    for (column, selected) in active {
        let column_index = index
            .column(column)
            .ok_or_else(|| QueryError::UnknownColumn(column.to_string()))?;
        resolved.push((column_index, selected));
    }

    let mut eligible: Option<Cow<'a, HashSet<RowId>>> = None;
    for (column_index, selected) in resolved {
        let matches = column_matches(column_index, selected);
        let next = match eligible.take() {
            None => matches,
            Some(current) => Cow::Owned(intersect(&current, &matches)),
        };
        if next.is_empty() {
            return Ok(Cow::Owned(HashSet::new()));
        }
        eligible = Some(next);
    }

    Ok(eligible.unwrap_or_else(|| Cow::Owned(HashSet::new())))
}

/// The OR-set of one column: every row whose value is among `selected`.
///
/// A single matching bucket is borrowed rather than copied. Selected values with no bucket
/// contribute nothing.
fn column_matches<'a>(column: &'a ColumnIndex, selected: &HashSet<Value>) -> Cow<'a, HashSet<RowId>> {
    let mut buckets = selected.iter().filter_map(|value| column.bucket(value));
    let Some(first) = buckets.next() else {
        return Cow::Owned(HashSet::new());
    };
    let Some(second) = buckets.next() else {
        return Cow::Borrowed(first);
    };

    let mut ids: HashSet<RowId> = HashSet::with_capacity(first.len() + second.len());
    ids.extend(first);
    ids.extend(second);
    for bucket in buckets {
        ids.extend(bucket);
    }
    Cow::Owned(ids)
}

/// Iterate the smaller set and probe the larger one.
fn intersect(a: &HashSet<RowId>, b: &HashSet<RowId>) -> HashSet<RowId> {
    let (smaller, larger) = if a.len() < b.len() { (a, b) } else { (b, a) };
    smaller
        .iter()
        .copied()
        .filter(|id| larger.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::index::IndexBuilder;
    use crate::value::Cell;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn index() -> Index {
        // number: 1..=12, mod2 = number % 2, mod3 = number % 3
        let mut dataset = Dataset::new(vec!["number", "mod2", "mod3"]).unwrap();
        for n in 1..=12i64 {
            dataset
                .push_row(n as u64, vec![Cell::from(n), Cell::from(n % 2), Cell::from(n % 3)])
                .unwrap();
        }
        IndexBuilder::new()
            .build(
                Arc::new(dataset),
                &["number".to_string(), "mod2".to_string(), "mod3".to_string()],
            )
            .unwrap()
    }

    fn ids(set: &HashSet<RowId>) -> Vec<u64> {
        let mut ids: Vec<u64> = set.iter().map(|id| id.get()).collect();
        ids.sort_unstable();
        ids
    }

    fn values(raw: &[i64]) -> Vec<Value> {
        raw.iter().map(|&v| Value::from(v)).collect()
    }

    #[test]
    fn no_active_filter_borrows_full_id_set() {
        let index = index();
        let filters = FilterState::for_columns(index.columns());
        let eligible = eligible_ids(&index, &filters).unwrap();
        assert!(matches!(eligible, Cow::Borrowed(_)));
        assert_eq!(eligible.len(), 12);
    }

    #[test]
    fn values_within_a_column_are_ored_and_columns_are_anded() {
        let index = index();
        let filters = FilterState::empty()
            .with_column_in("mod3", values(&[0, 1]))
            .with_column_equals("mod2", Value::from(0));
        let eligible = eligible_ids(&index, &filters).unwrap();
        assert_eq!(ids(&eligible), vec![4, 6, 10, 12]);
    }

    #[test]
    fn disjoint_filters_yield_nothing() {
        let index = index();
        let filters = FilterState::empty()
            .with_column_equals("number", Value::from(2))
            .with_column_equals("mod2", Value::from(1));
        assert!(eligible_ids(&index, &filters).unwrap().is_empty());
    }

    #[test]
    fn unknown_selected_values_match_nothing() {
        let index = index();
        let filters = FilterState::empty().with_column_in("mod3", values(&[1, 99]));
        assert_eq!(
            ids(&eligible_ids(&index, &filters).unwrap()),
            vec![1, 4, 7, 10]
        );

        let filters = FilterState::empty().with_column_equals("mod3", Value::from(99));
        assert!(eligible_ids(&index, &filters).unwrap().is_empty());
    }

    #[test]
    fn unknown_active_column_is_rejected_even_after_an_empty_fold() {
        let index = index();
        let filters = FilterState::empty()
            .with_column_equals("mod2", Value::from(7))
            .with_column_equals("zzz", Value::from(1));
        assert_eq!(
            eligible_ids(&index, &filters).unwrap_err(),
            QueryError::UnknownColumn("zzz".into())
        );
    }

    #[test]
    fn inactive_unknown_column_is_ignored() {
        let index = index();
        let filters = FilterState::for_columns(&["zzz"]);
        assert_eq!(eligible_ids(&index, &filters).unwrap().len(), 12);
    }

    #[test]
    fn available_values_ignore_own_selection() {
        let index = index();
        let filters = FilterState::empty().with_column_equals("mod3", Value::from(0));
        assert_eq!(
            available_values(&index, &filters, "mod3").unwrap(),
            values(&[0, 1, 2])
        );
        assert_eq!(
            available_values(&index, &filters, "number").unwrap(),
            values(&[3, 6, 9, 12])
        );
        assert_eq!(
            available_values(&index, &filters, "mod2").unwrap(),
            values(&[0, 1])
        );
    }

    #[test]
    fn available_values_for_unknown_column_is_rejected() {
        let index = index();
        assert_eq!(
            available_values(&index, &FilterState::empty(), "zzz").unwrap_err(),
            QueryError::UnknownColumn("zzz".into())
        );
    }

    #[test]
    fn available_values_by_column_covers_every_column() {
        let index = index();
        let filters = FilterState::empty().with_column_in("number", values(&[1, 2]));
        let all = available_values_by_column(&index, &filters).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all["mod2"], values(&[0, 1]));
        assert_eq!(all["mod3"], values(&[1, 2]));
        assert_eq!(all["number"].len(), 12);
    }

    #[test]
    fn filtered_rows_are_sorted_by_id() {
        let index = index();
        let filters = FilterState::empty().with_column_equals("mod3", Value::from(2));
        let rows: Vec<u64> = filtered_rows(&index, &filters)
            .unwrap()
            .into_iter()
            .map(|row| row.id.get())
            .collect();
        assert_eq!(rows, vec![2, 5, 8, 11]);
    }

    #[test]
    fn search_narrows_by_displayed_form() {
        let index = index();
        let numbers = available_values(&index, &FilterState::empty(), "number").unwrap();
        assert_eq!(search_values(numbers.clone(), "1"), values(&[1, 10, 11, 12]));
        assert_eq!(search_values(numbers.clone(), " "), numbers);
        assert!(search_values(numbers, "x").is_empty());

        let fractions = vec![Value::new(2.5), Value::new(f64::NAN), Value::new(3.0)];
        assert_eq!(search_values(fractions.clone(), ".5"), vec![Value::new(2.5)]);
        assert_eq!(search_values(fractions, "nan"), vec![Value::new(f64::NAN)]);
    }

    #[test]
    fn intersect_probes_the_larger_set() {
        let small: HashSet<RowId> = [1, 2].into_iter().map(RowId).collect();
        let large: HashSet<RowId> = (2..100).map(RowId).collect();
        assert_eq!(ids(&intersect(&small, &large)), vec![2]);
        assert_eq!(ids(&intersect(&large, &small)), vec![2]);
    }
}
