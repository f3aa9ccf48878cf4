//! The `crossfilter` command: load a CSV file, index the requested columns, apply filters and
//! report what is left.
pub mod cli;
