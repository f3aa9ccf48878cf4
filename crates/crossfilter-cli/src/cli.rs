use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use crossfilter_core::{
    search_values, Cell, CrossFilterEngine, DatasetInfo, EngineOptions, EngineState, Row, RowId,
    Value,
};
use crossfilter_csv::{load_csv_path, CsvOptions};
use serde::Serialize;

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "crossfilter",
    about = "Cross-filter a CSV file: apply per-column filters and report the eligible rows and the values still available in every column."
)]
pub struct Args {
    /// CSV file to load. The first record is the header.
    csv: PathBuf,

    /// Column to index and report (repeatable).
    ///
    /// Defaults to every column whose value in the first row is a number.
    #[arg(long = "column", value_name = "NAME")]
    columns: Vec<String>,

    /// Filter a column to a set of values (repeatable).
    ///
    /// Format: `<column>=<v1>,<v2>,...`. A row matches a filter when its value is any of the
    /// listed values; a row is eligible when it matches every filter.
    #[arg(long = "filter", value_name = "COLUMN=VALUES")]
    filters: Vec<String>,

    /// Narrow a column's listed values to those containing TEXT, ignoring case (repeatable).
    #[arg(long = "search", value_name = "COLUMN=TEXT")]
    searches: Vec<String>,

    /// Select every available value of a column that matches its --search, or clear the
    /// column when all of them are already selected (repeatable). Applied after --filter.
    #[arg(long = "select-all", value_name = "COLUMN")]
    select_all: Vec<String>,

    /// Maximum number of eligible rows to print.
    #[arg(long, default_value_t = 10)]
    rows: usize,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Header name of the row identifier column.
    #[arg(long, default_value = "id")]
    id_column: String,

    /// Field delimiter (a single ASCII character).
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Build the index on the calling thread instead of a background worker.
    #[arg(long)]
    sync: bool,

    /// Build per-column indexes in parallel (requires the `parallel` feature).
    #[arg(long)]
    parallel: bool,

    /// Increase log verbosity (`-v` info, `-vv` debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Serialize)]
struct JsonRow<'a> {
    id: RowId,
    #[serde(flatten)]
    cells: BTreeMap<&'a str, &'a Cell>,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    file: &'a str,
    dataset: &'a DatasetInfo,
    filters: BTreeMap<&'a str, Vec<Value>>,
    indexed_row_count: usize,
    eligible_count: usize,
    available_values: &'a BTreeMap<String, Vec<Value>>,
    rows: Vec<JsonRow<'a>>,
}

struct Report<'a> {
    file: String,
    info: DatasetInfo,
    columns: &'a [String],
    filters: BTreeMap<&'a str, Vec<Value>>,
    /// Distinct row ids in the index; rows that reuse an id count once.
    indexed_row_count: usize,
    eligible_count: usize,
    available: BTreeMap<String, Vec<Value>>,
    rows: Vec<&'a Row>,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    run_with_args(args)
}

pub fn run_with_args(args: Args) -> Result<()> {
    init_logging(args.verbose);

    if !args.delimiter.is_ascii() {
        anyhow::bail!("delimiter must be a single ASCII character, got {:?}", args.delimiter);
    }
    let filters = parse_filters(&args.filters)?;
    let searches = parse_searches(&args.searches)?;

    let csv_options = CsvOptions {
        delimiter: args.delimiter as u8,
        id_column: args.id_column.clone(),
        ..CsvOptions::default()
    };
    let dataset = load_csv_path(&args.csv, csv_options)
        .with_context(|| format!("load {}", args.csv.display()))?;
    let info = dataset.info();

    let columns = if args.columns.is_empty() {
        dataset.numeric_columns()
    } else {
        args.columns.clone()
    };
    if columns.is_empty() {
        anyhow::bail!(
            "{} has no numeric columns to filter on; pass --column explicitly",
            args.csv.display()
        );
    }

    let mut options = EngineOptions::from_env();
    if args.sync {
        options.background_build = false;
    }
    if args.parallel {
        if !cfg!(feature = "parallel") {
            log::warn!("--parallel has no effect: built without the `parallel` feature");
        }
        options.parallel_build = true;
    }

    let mut engine = CrossFilterEngine::new(options);
    engine.load_dataset(Arc::new(dataset), columns);
    match engine.wait() {
        EngineState::Ready { .. } => {}
        EngineState::Failed { error, .. } => {
            anyhow::bail!("failed to index {}: {error}", args.csv.display())
        }
        state => anyhow::bail!("index build did not finish (state: {state:?})"),
    }

    for (column, values) in &filters {
        engine.set_filter(column, values.iter().copied())?;
    }
    for column in &args.select_all {
        let search = searches.get(column.as_str()).map_or("", String::as_str);
        engine.select_all_matching(column, search)?;
    }
    let mut available = engine.available_values_by_column()?;
    for (column, search) in &searches {
        let values = available
            .remove(column)
            .with_context(|| format!("--search names unknown column '{column}'"))?;
        available.insert(column.clone(), search_values(values, search));
    }

    let index = engine
        .index()
        .context("index missing after a successful build")?;
    let report = Report {
        file: args.csv.to_string_lossy().into_owned(),
        info,
        columns: index.columns(),
        filters: active_filters(&engine),
        indexed_row_count: index.row_count(),
        eligible_count: engine.eligible_ids()?.len(),
        available,
        rows: engine.filtered_rows()?.into_iter().take(args.rows).collect(),
    };

    let written = match args.format {
        OutputFormat::Text => write_text(&report, index.dataset().columns()),
        OutputFormat::Json => write_json(&report, index.dataset().columns()),
    };
    match written {
        // The reader went away (e.g. `crossfilter ... | head`); nothing left to report to.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other.context("write report"),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}

/// Parse repeated `COLUMN=V1,V2` arguments. Repeating a column adds to its selection.
fn parse_filters(raw: &[String]) -> Result<BTreeMap<String, Vec<Value>>> {
    let mut filters: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for arg in raw {
        let Some((column, values)) = arg.split_once('=') else {
            anyhow::bail!("invalid --filter '{arg}' (expected format: <column>=<v1>,<v2>,...)");
        };
        let column = column.trim();
        if column.is_empty() {
            anyhow::bail!("invalid --filter '{arg}': missing column name");
        }
        let selected = filters.entry(column.to_string()).or_default();
        for value in values.split(',').map(str::trim).filter(|v| !v.is_empty()) {
            let number: f64 = value
                .parse()
                .with_context(|| format!("invalid value '{value}' in --filter '{arg}'"))?;
            selected.push(Value::new(number));
        }
    }
    Ok(filters)
}

/// Parse repeated `COLUMN=TEXT` arguments. A later search for the same column replaces the
/// earlier one.
fn parse_searches(raw: &[String]) -> Result<BTreeMap<String, String>> {
    let mut searches = BTreeMap::new();
    for arg in raw {
        let Some((column, term)) = arg.split_once('=') else {
            anyhow::bail!("invalid --search '{arg}' (expected format: <column>=<text>)");
        };
        let column = column.trim();
        if column.is_empty() {
            anyhow::bail!("invalid --search '{arg}': missing column name");
        }
        searches.insert(column.to_string(), term.to_string());
    }
    Ok(searches)
}

fn active_filters(engine: &CrossFilterEngine) -> BTreeMap<&str, Vec<Value>> {
    engine
        .filters()
        .active_columns()
        .into_iter()
        .map(|(column, selected)| (column, sorted(selected)))
        .collect()
}

fn sorted(values: &HashSet<Value>) -> Vec<Value> {
    let mut values: Vec<Value> = values.iter().copied().collect();
    values.sort_unstable();
    values
}

fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_text(report: &Report<'_>, fields: &[String]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "Dataset: {}", report.file)?;
    writeln!(
        out,
        "  rows: {}  fields: {} ({})",
        report.info.row_count,
        report.info.column_count,
        report.info.columns.join(", ")
    )?;
    writeln!(out, "  indexed: {}", report.columns.join(", "))?;
    if report.filters.is_empty() {
        writeln!(out, "  filters: (none)")?;
    } else {
        let filters: Vec<String> = report
            .filters
            .iter()
            .map(|(column, values)| format!("{column} in [{}]", join_values(values)))
            .collect();
        writeln!(out, "  filters: {}", filters.join("; "))?;
    }
    writeln!(out)?;

    writeln!(
        out,
        "Eligible rows: {} of {}",
        report.eligible_count, report.indexed_row_count
    )?;
    writeln!(out)?;

    writeln!(out, "Available values:")?;
    for (column, values) in &report.available {
        let shown = if values.is_empty() {
            "(none)".to_string()
        } else {
            join_values(values)
        };
        writeln!(out, "  {column}: {shown}")?;
    }

    if report.rows.is_empty() {
        return out.flush();
    }
    writeln!(out)?;
    writeln!(
        out,
        "Rows (first {} of {}):",
        report.rows.len(),
        report.eligible_count
    )?;
    for row in &report.rows {
        let cells: Vec<String> = fields
            .iter()
            .zip(&row.cells)
            .map(|(name, cell)| format!("{name}={cell}"))
            .collect();
        writeln!(out, "  {}: {}", row.id, cells.join(", "))?;
    }
    out.flush()
}

fn write_json(report: &Report<'_>, fields: &[String]) -> io::Result<()> {
    let rows = report
        .rows
        .iter()
        .map(|row| JsonRow {
            id: row.id,
            cells: fields
                .iter()
                .map(String::as_str)
                .zip(&row.cells)
                .collect(),
        })
        .collect();
    let json_report = JsonReport {
        file: &report.file,
        dataset: &report.info,
        filters: report.filters.clone(),
        indexed_row_count: report.indexed_row_count,
        eligible_count: report.eligible_count,
        available_values: &report.available,
        rows,
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer(&mut handle, &json_report)?;
    handle.write_all(b"\n")?;
    handle.flush()
}
