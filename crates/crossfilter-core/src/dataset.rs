use crate::error::{DatasetError, DatasetResult};
use crate::value::{Cell, RowId};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(id: impl Into<RowId>, cells: Vec<Cell>) -> Self {
        Self {
            id: id.into(),
            cells,
        }
    }

    pub fn cell(&self, idx: usize) -> Option<&Cell> {
        self.cells.get(idx)
    }
}

/// Summary of a dataset as reported to the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatasetInfo {
    pub row_count: usize,
    /// Number of fields per row, counting the identifier.
    pub column_count: usize,
    pub columns: Vec<String>,
}

/// The row store: one immutable snapshot of a dataset.
///
/// Field names exclude the identifier, which lives on [`Row::id`]. Rows are kept in feed order;
/// identifier uniqueness is the feed's responsibility.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(columns: Vec<impl Into<String>>) -> DatasetResult<Self> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut column_index = HashMap::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            if column_index.insert(column.clone(), idx).is_some() {
                return Err(DatasetError::DuplicateColumn(column.clone()));
            }
        }

        Ok(Self {
            columns,
            column_index,
            rows: Vec::new(),
        })
    }

    pub fn with_rows(
        columns: Vec<impl Into<String>>,
        rows: impl IntoIterator<Item = Row>,
    ) -> DatasetResult<Self> {
        let mut dataset = Self::new(columns)?;
        for row in rows {
            dataset.push(row)?;
        }
        Ok(dataset)
    }

    pub fn push_row(&mut self, id: impl Into<RowId>, cells: Vec<Cell>) -> DatasetResult<()> {
        self.push(Row::new(id, cells))
    }

    pub fn push(&mut self, row: Row) -> DatasetResult<()> {
        if row.cells.len() != self.columns.len() {
            return Err(DatasetError::SchemaMismatch {
                expected: self.columns.len(),
                actual: row.cells.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_position(&self, column: &str) -> Option<usize> {
        self.column_index.get(column).copied()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value<'a>(&self, row: &'a Row, column: &str) -> Option<&'a Cell> {
        let idx = self.column_position(column)?;
        row.cell(idx)
    }

    /// Columns whose value in the first row is numeric, in field order.
    ///
    /// This is the conventional choice of filterable columns. Only the first row is inspected, so
    /// a column that starts numeric and later holds text will be rejected by the index builder.
    pub fn numeric_columns(&self) -> Vec<String> {
        let Some(first) = self.rows.first() else {
            return Vec::new();
        };
        self.columns
            .iter()
            .zip(&first.cells)
            .filter(|(_, cell)| cell.is_number())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            row_count: self.rows.len(),
            column_count: self.columns.len() + 1,
            columns: self.columns.clone(),
        }
    }
}
