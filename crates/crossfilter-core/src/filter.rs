use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The user's current selections: column name to the set of selected values.
///
/// A column that is absent, or whose set is empty, is inactive and constrains nothing. Within a
/// column the selected values are OR-ed; active columns are AND-ed together.
///
/// Selections are not validated against any index. A value that no row carries simply matches
/// nothing, which is also what happens to selections that outlive the dataset they were made on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterState {
    column_filters: HashMap<String, HashSet<Value>>,
}

impl FilterState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// One inactive entry per column, as after loading a new dataset.
    pub fn for_columns<S: AsRef<str>>(columns: &[S]) -> Self {
        let mut state = Self::default();
        state.reset_for_columns(columns);
        state
    }

    pub fn with_column_equals(mut self, column: &str, value: Value) -> Self {
        self.set_filter(column, [value]);
        self
    }

    pub fn with_column_in(mut self, column: &str, values: impl IntoIterator<Item = Value>) -> Self {
        self.set_filter(column, values);
        self
    }

    /// Replace the selection for `column`.
    pub fn set_filter(&mut self, column: &str, values: impl IntoIterator<Item = Value>) {
        self.column_filters
            .insert(column.to_string(), values.into_iter().collect());
    }

    /// Make `column` inactive.
    pub fn clear_filter(&mut self, column: &str) {
        if let Some(values) = self.column_filters.get_mut(column) {
            values.clear();
        }
    }

    /// Make every known column inactive.
    pub fn clear_all(&mut self) {
        for values in self.column_filters.values_mut() {
            values.clear();
        }
    }

    /// Drop every selection and start over with one inactive entry per column.
    pub fn reset_for_columns<S: AsRef<str>>(&mut self, columns: &[S]) {
        self.column_filters = columns
            .iter()
            .map(|c| (c.as_ref().to_string(), HashSet::new()))
            .collect();
    }

    pub fn select_value(&mut self, column: &str, value: Value) {
        self.column_filters
            .entry(column.to_string())
            .or_default()
            .insert(value);
    }

    pub fn deselect_value(&mut self, column: &str, value: Value) {
        if let Some(values) = self.column_filters.get_mut(column) {
            values.remove(&value);
        }
    }

    /// Flip `value` in `column`'s selection; returns whether it is selected afterwards.
    pub fn toggle_value(&mut self, column: &str, value: Value) -> bool {
        let values = self.column_filters.entry(column.to_string()).or_default();
        if values.remove(&value) {
            false
        } else {
            values.insert(value);
            true
        }
    }

    pub fn selected(&self, column: &str) -> Option<&HashSet<Value>> {
        self.column_filters.get(column)
    }

    pub fn is_selected(&self, column: &str, value: &Value) -> bool {
        self.column_filters
            .get(column)
            .is_some_and(|values| values.contains(value))
    }

    pub fn is_active(&self, column: &str) -> bool {
        self.column_filters
            .get(column)
            .is_some_and(|values| !values.is_empty())
    }

    pub fn has_active_filters(&self) -> bool {
        self.column_filters.values().any(|values| !values.is_empty())
    }

    /// Known columns, active or not, sorted by name.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self.column_filters.keys().map(String::as_str).collect();
        columns.sort_unstable();
        columns
    }

    /// Active columns and their selections, sorted by column name.
    pub fn active_columns(&self) -> Vec<(&str, &HashSet<Value>)> {
        self.active_filters_except(None)
    }

    /// Like [`FilterState::active_columns`], skipping `excluded`.
    pub fn active_filters_except(&self, excluded: Option<&str>) -> Vec<(&str, &HashSet<Value>)> {
        let mut active: Vec<(&str, &HashSet<Value>)> = self
            .column_filters
            .iter()
            .filter(|(column, values)| !values.is_empty() && Some(column.as_str()) != excluded)
            .map(|(column, values)| (column.as_str(), values))
            .collect();
        active.sort_unstable_by(|a, b| a.0.cmp(b.0));
        active
    }
}
