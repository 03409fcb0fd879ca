//! Sink for the analytical store.
//!
//! The store is reached through the [`TableSink`] trait: one call writes one
//! whole table, replacing whatever the table held before. [`write_star_schema`]
//! drives the five writes of a run in a fixed order.

pub mod parquet;
pub mod warehouse;

use arrow::array::RecordBatch;
use async_trait::async_trait;
use tracing::{error, info};

pub use self::parquet::ParquetWriterConfig;
pub use warehouse::WarehouseSink;

use crate::error::SinkError;
use crate::transform::TableName;

/// Outcome of one table write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenTable {
    /// Fully qualified table id (`{namespace}.{table}`).
    pub table_id: String,
    /// Rows in the table.
    pub rows: usize,
    /// Size of the written object in bytes.
    pub bytes: usize,
}

/// Trait for destinations that store whole tables.
///
/// Implementations overwrite or create the table; the returned future
/// resolves only once the table is durable.
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Namespace prefixed to every table id.
    fn namespace(&self) -> &str;

    /// Fully qualified id of a destination table.
    fn table_id(&self, table: TableName) -> String {
        format!("{}.{}", self.namespace(), table.as_str())
    }

    /// Replace the contents of `table` with `batch`.
    async fn write_table(
        &self,
        table: TableName,
        batch: &RecordBatch,
    ) -> Result<WrittenTable, SinkError>;
}

/// Write every table, in order, stopping at the first failure.
///
/// Tables written before a failure are left in place.
pub async fn write_star_schema<S: TableSink + ?Sized>(
    sink: &S,
    tables: &[(TableName, RecordBatch)],
) -> Result<Vec<WrittenTable>, SinkError> {
    let mut written = Vec::with_capacity(tables.len());

    for (table, batch) in tables {
        match sink.write_table(*table, batch).await {
            Ok(result) => {
                info!(
                    "Wrote {} ({} rows, {} bytes)",
                    result.table_id, result.rows, result.bytes
                );
                written.push(result);
            }
            Err(e) => {
                let completed: Vec<&str> = written.iter().map(|w| w.table_id.as_str()).collect();
                error!(
                    "Failed to write {}; tables already written: {:?}",
                    sink.table_id(*table),
                    completed
                );
                return Err(e);
            }
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::{Arc, Mutex};

    /// Records the order of writes and fails on a chosen table.
    struct RecordingSink {
        writes: Mutex<Vec<TableName>>,
        fail_on: Option<TableName>,
    }

    impl RecordingSink {
        fn new(fail_on: Option<TableName>) -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl TableSink for RecordingSink {
        fn namespace(&self) -> &str {
            "project.dataset"
        }

        async fn write_table(
            &self,
            table: TableName,
            batch: &RecordBatch,
        ) -> Result<WrittenTable, SinkError> {
            let table_id = self.table_id(table);
            if self.fail_on == Some(table) {
                return Err(SinkError::Upload {
                    table_id,
                    source: StorageError::InvalidUrl {
                        url: "memory://offline".to_string(),
                    },
                });
            }
            self.writes.lock().unwrap().push(table);
            Ok(WrittenTable {
                table_id,
                rows: batch.num_rows(),
                bytes: 0,
            })
        }
    }

    fn tables() -> Vec<(TableName, RecordBatch)> {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap();
        TableName::ALL
            .into_iter()
            .map(|t| (t, batch.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_tables_written_in_order() {
        let sink = RecordingSink::new(None);
        let written = write_star_schema(&sink, &tables()).await.unwrap();

        assert_eq!(*sink.writes.lock().unwrap(), TableName::ALL.to_vec());
        assert_eq!(written[0].table_id, "project.dataset.customer_dim");
        assert_eq!(written[4].table_id, "project.dataset.sales_fact");
        assert_eq!(written[4].rows, 2);
    }

    #[tokio::test]
    async fn test_failure_stops_remaining_writes() {
        let sink = RecordingSink::new(Some(TableName::OrderDim));
        let err = write_star_schema(&sink, &tables()).await.unwrap_err();

        assert_eq!(err.table_id(), Some("project.dataset.order_dim"));
        assert_eq!(
            *sink.writes.lock().unwrap(),
            vec![TableName::CustomerDim, TableName::ProductDim]
        );
    }
}
