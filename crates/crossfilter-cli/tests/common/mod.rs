#![allow(dead_code)]

use std::io::Write;

use tempfile::NamedTempFile;

/// `number` = 1..=rows, `mod2` = number % 2, `mod3` = number % 3, `label` = "row-<number>".
pub fn modulo_csv(rows: u64) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("create temp csv");
    writeln!(file, "id,number,mod2,mod3,label").expect("write header");
    for n in 1..=rows {
        writeln!(file, "{n},{n},{},{},row-{n}", n % 2, n % 3).expect("write row");
    }
    file.flush().expect("flush temp csv");
    file
}

pub fn csv_with(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("create temp csv");
    file.write_all(contents.as_bytes()).expect("write csv");
    file.flush().expect("flush temp csv");
    file
}
