//! Object-store backed warehouse.
//!
//! Every table lives in its own directory named by its fully qualified id and
//! holds exactly one data file, so a write is a single overwrite of a fixed key.

use arrow::array::RecordBatch;
use async_trait::async_trait;
use object_store::PutPayload;
use object_store::path::Path;
use snafu::prelude::*;
use tracing::debug;

use super::parquet::{ParquetWriterConfig, encode_table};
use super::{TableSink, WrittenTable};
use crate::config::SinkConfig;
use crate::emit;
use crate::error::{SinkError, SinkStorageSnafu, UploadSnafu};
use crate::metrics::events::TableWritten;
use crate::storage::StorageProvider;
use crate::transform::TableName;

/// File name of the single data file in each table directory.
pub const DATA_FILE: &str = "part-00000.parquet";

/// Writes tables as Parquet files under `{root}/{namespace}.{table}/`.
#[derive(Debug, Clone)]
pub struct WarehouseSink {
    storage: StorageProvider,
    namespace: String,
    writer_config: ParquetWriterConfig,
}

impl WarehouseSink {
    pub fn new(storage: StorageProvider, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
            writer_config: ParquetWriterConfig::default(),
        }
    }

    /// Open the warehouse described by the sink configuration.
    pub async fn from_config(config: &SinkConfig) -> Result<Self, SinkError> {
        let storage =
            StorageProvider::for_url_with_options(&config.path, config.storage_options.clone())
                .await
                .context(SinkStorageSnafu)?;

        let writer_config = ParquetWriterConfig::default().with_compression(config.compression);
        Ok(Self::new(storage, config.namespace.clone()).with_writer_config(writer_config))
    }

    pub fn with_writer_config(mut self, writer_config: ParquetWriterConfig) -> Self {
        self.writer_config = writer_config;
        self
    }

    /// Location of a table's data file, relative to the warehouse root.
    pub fn data_file_path(&self, table: TableName) -> Path {
        Path::from_iter([self.table_id(table).as_str(), DATA_FILE])
    }

    pub fn storage(&self) -> &StorageProvider {
        &self.storage
    }
}

#[async_trait]
impl TableSink for WarehouseSink {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn write_table(
        &self,
        table: TableName,
        batch: &RecordBatch,
    ) -> Result<WrittenTable, SinkError> {
        let table_id = self.table_id(table);
        let bytes = encode_table(batch, &self.writer_config, &table_id)?;
        let size = bytes.len();
        let path = self.data_file_path(table);

        debug!("Uploading {} bytes to {}", size, path);
        self.storage
            .put_payload(&path, PutPayload::from_bytes(bytes))
            .await
            .context(UploadSnafu {
                table_id: table_id.clone(),
            })?;

        emit!(TableWritten {
            table: table.as_str(),
            rows: batch.num_rows() as u64,
            bytes: size as u64,
        });

        Ok(WrittenTable {
            table_id,
            rows: batch.num_rows(),
            bytes: size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_NAMESPACE;
    use arrow::array::StringArray;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn local_sink(dir: &TempDir) -> WarehouseSink {
        let storage = StorageProvider::for_url_with_options(
            dir.path().to_str().unwrap(),
            HashMap::new(),
        )
        .await
        .unwrap();
        WarehouseSink::new(storage, DEFAULT_NAMESPACE)
    }

    fn batch(ids: &[&str]) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "Customer ID",
            DataType::Utf8,
            false,
        )]));
        RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(ids.to_vec()))],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_table_lands_under_namespaced_directory() {
        let dir = TempDir::new().unwrap();
        let sink = local_sink(&dir).await;

        let written = sink
            .write_table(TableName::CustomerDim, &batch(&["C-1", "C-2"]))
            .await
            .unwrap();

        assert_eq!(
            written.table_id,
            "data-mining-assignment-442318.etl_output.customer_dim"
        );
        let file = dir
            .path()
            .join("data-mining-assignment-442318.etl_output.customer_dim")
            .join(DATA_FILE);
        assert_eq!(std::fs::metadata(&file).unwrap().len() as usize, written.bytes);
    }

    #[tokio::test]
    async fn test_rewrite_replaces_table() {
        let dir = TempDir::new().unwrap();
        let sink = local_sink(&dir).await;

        sink.write_table(TableName::ProductDim, &batch(&["P-1", "P-2", "P-3"]))
            .await
            .unwrap();
        let second = sink
            .write_table(TableName::ProductDim, &batch(&["P-9"]))
            .await
            .unwrap();
        assert_eq!(second.rows, 1);

        let stored = sink
            .storage()
            .get(sink.data_file_path(TableName::ProductDim))
            .await
            .unwrap();
        assert_eq!(stored.len(), second.bytes);

        let entries = std::fs::read_dir(
            dir.path()
                .join("data-mining-assignment-442318.etl_output.product_dim"),
        )
        .unwrap()
        .count();
        assert_eq!(entries, 1);
    }
}
