mod import;

pub use crate::import::{load_csv, load_csv_path, CsvLoadError, CsvLoadResult, CsvOptions};
