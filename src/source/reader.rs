//! Delimited text reader.
//!
//! Decodes the bytes of one object into a [`RawTable`]: a header row of column
//! names and the data rows as string records. No typing happens here; column
//! presence and value parsing belong to the transform stage.

use bytes::Bytes;
use csv::StringRecord;
use snafu::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use crate::emit;
use crate::error::{CsvSnafu, DecodeError, DuplicateColumnSnafu, MissingHeaderSnafu};
use crate::metrics::events::{BytesRead, RowsLoaded};

/// Configuration for the CSV reader.
#[derive(Debug, Clone)]
pub struct CsvReaderConfig {
    /// Field delimiter byte.
    pub delimiter: u8,
}

impl Default for CsvReaderConfig {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// A decoded but untyped table with named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<StringRecord>,
}

impl RawTable {
    /// Column names in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Data rows, header excluded.
    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads delimited text into a [`RawTable`].
#[derive(Debug, Clone, Default)]
pub struct CsvReader {
    config: CsvReaderConfig,
}

impl CsvReader {
    pub fn new(config: CsvReaderConfig) -> Self {
        Self { config }
    }

    /// Decode the full content of an object.
    ///
    /// `path` is only used in error messages and logs.
    pub fn read(&self, content: &Bytes, path: &str) -> Result<RawTable, DecodeError> {
        emit!(BytesRead {
            bytes: content.len() as u64,
        });

        // Spreadsheet exports often start with a UTF-8 byte order mark.
        let content: &[u8] = content.as_ref();
        let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(content);

        let headers: Vec<String> = reader
            .headers()
            .context(CsvSnafu { path })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        ensure!(
            headers.iter().any(|h| !h.is_empty()),
            MissingHeaderSnafu { path }
        );

        let mut index = HashMap::with_capacity(headers.len());
        for (i, name) in headers.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return DuplicateColumnSnafu {
                    path,
                    column: name.clone(),
                }
                .fail();
            }
        }

        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .context(CsvSnafu { path })?;

        debug!(
            "Decoded {} rows x {} columns from {}",
            rows.len(),
            headers.len(),
            path
        );
        emit!(RowsLoaded {
            count: rows.len() as u64,
        });

        Ok(RawTable {
            headers,
            index,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str) -> Result<RawTable, DecodeError> {
        CsvReader::default().read(&Bytes::from(text.to_string()), "test.csv")
    }

    #[test]
    fn test_reads_headers_and_rows() {
        let table = read("Order ID,Sales\nCA-1,10.5\nCA-2,3\n").unwrap();
        assert_eq!(table.headers(), &["Order ID", "Sales"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.column_index("Sales"), Some(1));
        assert_eq!(&table.rows()[1][0], "CA-2");
    }

    #[test]
    fn test_quoted_fields_keep_delimiters() {
        let table = read("Product Name,Sales\n\"Chair, Oak\",10\n").unwrap();
        assert_eq!(&table.rows()[0][0], "Chair, Oak");
    }

    #[test]
    fn test_byte_order_mark_is_stripped() {
        let table = read("\u{feff}Row ID,Sales\n1,2\n").unwrap();
        assert_eq!(table.column_index("Row ID"), Some(0));
    }

    #[test]
    fn test_custom_delimiter() {
        let reader = CsvReader::new(CsvReaderConfig { delimiter: b';' });
        let table = reader
            .read(&Bytes::from_static(b"a;b\n1;2\n"), "semi.csv")
            .unwrap();
        assert_eq!(table.headers(), &["a", "b"]);
    }

    #[test]
    fn test_ragged_rows_are_a_decode_error() {
        let err = read("a,b\n1,2\n3\n").unwrap_err();
        assert!(matches!(err, DecodeError::Csv { .. }));
    }

    #[test]
    fn test_empty_object_has_no_header() {
        let err = read("").unwrap_err();
        assert!(matches!(err, DecodeError::MissingHeader { .. }));
    }

    #[test]
    fn test_duplicate_header() {
        let err = read("Sales,Sales\n1,2\n").unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_header_only_is_an_empty_table() {
        let table = read("Order ID,Sales\n").unwrap();
        assert!(table.is_empty());
    }
}
