use crossfilter_core::{CrossFilterEngine, EngineOptions, EngineState, Value};
use crossfilter_csv::{load_csv, load_csv_path, CsvLoadError, CsvOptions};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;

const SALES: &str = "\
id,region,year,units,product
1,1,2022,10,apple
2,1,2023,5,pear
3,2,2022,7,apple
4,2,2023,,plum
5,3,2023,2,pear
";

#[test]
fn loads_from_disk_and_feeds_the_engine() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SALES.as_bytes()).unwrap();

    let dataset = load_csv_path(file.path(), CsvOptions::default()).unwrap();
    let info = dataset.info();
    assert_eq!(info.row_count, 5);
    assert_eq!(info.column_count, 5);
    assert_eq!(dataset.numeric_columns(), vec!["region", "year", "units"]);

    let mut engine = CrossFilterEngine::new(EngineOptions::synchronous());
    let generation = engine.load_dataset(Arc::new(dataset), vec!["region".into(), "year".into()]);
    assert_eq!(engine.state(), &EngineState::Ready { generation });

    engine.set_filter("year", [Value::from(2022)]).unwrap();
    assert_eq!(
        engine.available_values("region").unwrap(),
        vec![Value::from(1), Value::from(2)]
    );
    let products: Vec<String> = engine
        .filtered_rows()
        .unwrap()
        .into_iter()
        .map(|row| row.cells[3].to_string())
        .collect();
    assert_eq!(products, vec!["apple", "apple"]);
}

#[test]
fn blank_cells_fail_the_index_build_for_that_column() {
    let dataset = load_csv(SALES.as_bytes(), CsvOptions::default()).unwrap();
    let mut engine = CrossFilterEngine::new(EngineOptions::synchronous());
    engine.load_dataset(Arc::new(dataset), vec!["units".into()]);
    assert!(matches!(engine.state(), EngineState::Failed { .. }));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_csv_path(dir.path().join("missing.csv"), CsvOptions::default()).unwrap_err();
    assert!(matches!(err, CsvLoadError::Io(_)));
}
