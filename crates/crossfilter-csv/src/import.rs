use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crossfilter_core::{Cell, Dataset, DatasetError, RowId};
use csv::ByteRecord;
use thiserror::Error;

pub type CsvLoadResult<T> = Result<T, CsvLoadError>;

/// 2^53. Ids written in float notation must be below it: past it, distinct decimal ids can round
/// to the same f64.
const FLOAT_ID_LIMIT: f64 = 9_007_199_254_740_992.0;

#[derive(Clone, Debug)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Header name of the row identifier column. When the header has no such column, rows are
    /// numbered by position starting at 1.
    pub id_column: String,
    /// Strip surrounding whitespace from headers and fields before typing them.
    pub trim: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            id_column: "id".to_string(),
            trim: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum CsvLoadError {
    #[error("csv input was empty")]
    EmptyInput,
    #[error("csv parse error at row {row}: {reason}")]
    Parse { row: u64, reason: String },
    #[error("invalid row id {value:?} at row {row}: expected a non-negative integer")]
    InvalidId { row: u64, value: String },
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Load a CSV file from disk. See [`load_csv`].
pub fn load_csv_path(path: impl AsRef<Path>, options: CsvOptions) -> CsvLoadResult<Dataset> {
    let file = File::open(path.as_ref())?;
    load_csv(file, options)
}

/// Read a CSV stream into a [`Dataset`].
///
/// The first record names the fields. Every other field is typed on its own: blank fields become
/// [`Cell::Blank`], fields that parse as a finite number become [`Cell::Number`], and anything
/// else is kept as [`Cell::Text`]. The identifier column (see [`CsvOptions::id_column`]) is not
/// a field of the resulting dataset.
pub fn load_csv<R: Read>(reader: R, options: CsvOptions) -> CsvLoadResult<Dataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        // Headers are read by hand so row numbers in errors count the header as row 1.
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut record = ByteRecord::new();
    let mut record_index: u64 = 0;

    let has_header = csv_reader
        .read_byte_record(&mut record)
        .map_err(|e| map_csv_error(e, record_index + 1))?;
    if !has_header {
        return Err(CsvLoadError::EmptyInput);
    }
    record_index += 1;

    let header = decode_record(&record, record_index, options.trim)?;
    let id_position = header.iter().position(|name| *name == options.id_column);
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .filter(|(pos, _)| Some(*pos) != id_position)
        .map(|(_, name)| name.clone())
        .collect();
    let mut dataset = Dataset::new(columns)?;

    let width = header.len();
    let mut ragged = 0usize;
    loop {
        record.clear();
        match csv_reader.read_byte_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {}
            Err(e) => return Err(map_csv_error(e, record_index + 1)),
        }
        record_index += 1;
        if record.len() != width {
            ragged += 1;
        }

        let position = dataset.len() as u64 + 1;
        let mut id = RowId(position);
        let mut cells: Vec<Cell> = Vec::with_capacity(width);
        for pos in 0..width {
            let raw = record.get(pos).unwrap_or(b"");
            let field = decode_field(raw, record_index, options.trim)?;
            if Some(pos) == id_position {
                if let Some(parsed) = parse_id(&field, record_index)? {
                    id = parsed;
                }
                continue;
            }
            cells.push(parse_cell(&field));
        }
        dataset.push_row(id, cells)?;
    }

    if ragged > 0 {
        log::warn!(
            "{ragged} csv rows did not have {width} fields; short rows were padded with blanks and long rows truncated"
        );
    }
    log::debug!(
        "loaded {} csv rows x {} fields (id column {})",
        dataset.len(),
        dataset.columns().len(),
        if id_position.is_some() { "present" } else { "absent, numbering rows" }
    );
    Ok(dataset)
}

fn parse_cell(field: &str) -> Cell {
    if field.is_empty() {
        return Cell::Blank;
    }
    match field.parse::<f64>() {
        Ok(n) if n.is_finite() => Cell::Number(n),
        _ => Cell::from(field),
    }
}

/// A blank id falls back to the row's position.
fn parse_id(field: &str, row: u64) -> CsvLoadResult<Option<RowId>> {
    if field.is_empty() {
        return Ok(None);
    }
    if let Ok(id) = field.parse::<u64>() {
        return Ok(Some(RowId(id)));
    }
    // Accept integral numbers written as floats ("3.0", "1e3").
    match field.parse::<f64>() {
        Ok(n) if n >= 0.0 && n.fract() == 0.0 && n < FLOAT_ID_LIMIT => {
            Ok(Some(RowId(n as u64)))
        }
        _ => Err(CsvLoadError::InvalidId {
            row,
            value: field.to_string(),
        }),
    }
}

fn decode_record(record: &ByteRecord, row: u64, trim: bool) -> CsvLoadResult<Vec<String>> {
    let mut out = Vec::with_capacity(record.len());
    for (idx, field) in record.iter().enumerate() {
        // Excel-exported files often start with a UTF-8 BOM.
        let field = if idx == 0 && field.starts_with(&[0xEF, 0xBB, 0xBF]) {
            &field[3..]
        } else {
            field
        };
        out.push(decode_field(field, row, trim)?.into_owned());
    }
    Ok(out)
}

fn decode_field(field: &[u8], row: u64, trim: bool) -> CsvLoadResult<Cow<'_, str>> {
    let text = std::str::from_utf8(field).map_err(|e| CsvLoadError::Parse {
        row,
        reason: format!("invalid UTF-8: {e}"),
    })?;
    Ok(Cow::Borrowed(if trim { text.trim() } else { text }))
}

fn map_csv_error(err: csv::Error, fallback_row: u64) -> CsvLoadError {
    let reason = err.to_string();
    let pos = err.position().cloned();

    match err.into_kind() {
        csv::ErrorKind::Io(e) => CsvLoadError::Io(e),
        _ => {
            let row = pos
                .map(|p| p.record() + 1)
                .filter(|r| *r > 1)
                .unwrap_or(fallback_row);
            CsvLoadError::Parse { row, reason }
        }
    }
}
