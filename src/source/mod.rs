//! Input loading: fetch the triggering object and decode it into a raw table.

pub mod reader;

pub use reader::{CsvReader, CsvReaderConfig, RawTable};
