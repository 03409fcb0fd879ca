//! Main processing pipeline.
//!
//! One run handles one trigger event and moves through four stages in order:
//! load (fetch and decode the object), features, schema, sink. Any stage
//! failure aborts the stages after it.

use snafu::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::emit;
use crate::error::{
    ConfigSnafu, DecodeSnafu, PipelineError, RetrievalSnafu, TransformSnafu, WriteSnafu,
};
use crate::event::StorageEvent;
use crate::metrics::events::{PipelineFailed, PipelineSucceeded, Stage, StageCompleted};
use crate::sink::{TableSink, WarehouseSink, WrittenTable, write_star_schema};
use crate::source::{CsvReader, CsvReaderConfig, RawTable};
use crate::storage::StorageProvider;
use crate::transform::{
    RecordOptions, TableName, build_star_schema, engineer_features, parse_records,
};

/// Statistics about the pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Data rows in the source object.
    pub rows_read: usize,
    /// Size of the source object.
    pub bytes_read: usize,
    /// Tables written, in write order.
    pub tables: Vec<WrittenTable>,
}

impl PipelineStats {
    pub fn tables_written(&self) -> usize {
        self.tables.len()
    }

    pub fn bytes_written(&self) -> usize {
        self.tables.iter().map(|t| t.bytes).sum()
    }

    /// Rows written to the table with the given fully qualified id.
    pub fn rows_written(&self, table_id: &str) -> Option<usize> {
        self.tables
            .iter()
            .find(|t| t.table_id == table_id)
            .map(|t| t.rows)
    }
}

/// Runs the load, transform and write stages for trigger events.
pub struct Pipeline {
    config: Config,
    sink: Arc<dyn TableSink>,
}

impl Pipeline {
    /// Create a pipeline writing to the warehouse named in the configuration.
    pub async fn new(config: Config) -> Result<Self, PipelineError> {
        config.validate().context(ConfigSnafu)?;
        let sink = WarehouseSink::from_config(&config.sink)
            .await
            .context(WriteSnafu)?;
        info!(
            "Writing to {} under namespace {}",
            sink.storage().canonical_url(),
            config.sink.namespace
        );

        Ok(Self::with_sink(config, Arc::new(sink)))
    }

    /// Create a pipeline with a caller-provided sink.
    pub fn with_sink(config: Config, sink: Arc<dyn TableSink>) -> Self {
        Self { config, sink }
    }

    /// Process one event. Failures are logged and counted before being returned.
    pub async fn run(&self, event: &StorageEvent) -> Result<PipelineStats, PipelineError> {
        info!("Processing {}", event);

        match self.execute(event).await {
            Ok(stats) => {
                emit!(PipelineSucceeded);
                Ok(stats)
            }
            Err(e) => {
                error!(
                    "Pipeline failed during {}: {}",
                    e.stage(),
                    snafu::Report::from_error(&e)
                );
                emit!(PipelineFailed { stage: e.stage() });
                Err(e)
            }
        }
    }

    async fn execute(&self, event: &StorageEvent) -> Result<PipelineStats, PipelineError> {
        let mut stats = PipelineStats::default();

        let start = Instant::now();
        let (raw, bytes_read) = self.load(event).await?;
        stats.rows_read = raw.len();
        stats.bytes_read = bytes_read;
        emit!(StageCompleted {
            stage: Stage::Load,
            duration: start.elapsed(),
        });
        info!("Loaded {} rows from {}", raw.len(), event);

        let start = Instant::now();
        let options = RecordOptions {
            date_formats: self.config.source.date_formats.clone(),
            null_keys: self.config.transform.null_keys,
        };
        let records = parse_records(&raw, &options).context(TransformSnafu)?;
        let features = engineer_features(&records);
        emit!(StageCompleted {
            stage: Stage::Features,
            duration: start.elapsed(),
        });
        info!(
            "Computed features for {} customers and {} products",
            features.customer_sales_sum.len(),
            features.product_sales_sum.len()
        );

        let start = Instant::now();
        let schema = build_star_schema(&records, &features);
        let tables = schema.to_tables().context(TransformSnafu)?;
        emit!(StageCompleted {
            stage: Stage::Schema,
            duration: start.elapsed(),
        });
        for table in TableName::ALL {
            debug!("{}: {} rows", table, schema.row_count(table));
        }

        let start = Instant::now();
        stats.tables = write_star_schema(self.sink.as_ref(), &tables)
            .await
            .context(WriteSnafu)?;
        emit!(StageCompleted {
            stage: Stage::Sink,
            duration: start.elapsed(),
        });

        Ok(stats)
    }

    /// Fetch the event's object and decode it.
    async fn load(&self, event: &StorageEvent) -> Result<(RawTable, usize), PipelineError> {
        let source = &self.config.source;
        let url = source.container_url(&event.bucket);

        let storage = StorageProvider::for_url_with_options(&url, source.storage_options.clone())
            .await
            .context(RetrievalSnafu { url: url.clone() })?;
        let bytes = storage
            .get(event.name.as_str())
            .await
            .context(RetrievalSnafu {
                url: format!("{}/{}", url, event.name),
            })?;
        debug!("Fetched {} bytes from {}", bytes.len(), event);

        let reader = CsvReader::new(CsvReaderConfig {
            delimiter: source.delimiter_byte(),
        });
        let raw = reader
            .read(&bytes, &event.to_string())
            .context(DecodeSnafu)?;

        Ok((raw, bytes.len()))
    }
}

/// Run the pipeline once for a trigger event.
pub async fn run_pipeline(
    config: Config,
    event: &StorageEvent,
) -> Result<PipelineStats, PipelineError> {
    let pipeline = Pipeline::new(config).await?;
    pipeline.run(event).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use arrow::array::RecordBatch;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const CSV: &str = "Order ID,Order Date,Ship Mode,Customer ID,Customer Name,Segment,Country,City,State,Postal Code,Region,Product ID,Category,Sub-Category,Product Name,Sales,Quantity,Discount,Profit
O-1,2024-03-15,First Class,C-1,Ann,Consumer,US,Austin,Texas,73301,Central,P-1,Office Supplies,Paper,Pad,10,2,0,1.5
O-2,2024-03-15,First Class,C-2,Bob,Corporate,US,Austin,Texas,73301,Central,P-2,Furniture,Chairs,Stool,20,1,0.2,-3
O-3,2024-03-15,Same Day,C-1,Ann,Consumer,US,Austin,Texas,73301,Central,P-2,Furniture,Chairs,Stool,30,4,0,6
";

    #[derive(Default)]
    struct MemorySink {
        tables: Mutex<Vec<(TableName, RecordBatch)>>,
    }

    #[async_trait]
    impl TableSink for MemorySink {
        fn namespace(&self) -> &str {
            "test.dataset"
        }

        async fn write_table(
            &self,
            table: TableName,
            batch: &RecordBatch,
        ) -> Result<WrittenTable, SinkError> {
            self.tables.lock().unwrap().push((table, batch.clone()));
            Ok(WrittenTable {
                table_id: self.table_id(table),
                rows: batch.num_rows(),
                bytes: 0,
            })
        }
    }

    fn setup(csv: &str) -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("landing")).unwrap();
        std::fs::write(dir.path().join("landing").join("sales.csv"), csv).unwrap();

        let mut config = Config::default();
        config.source.root = Some(dir.path().to_str().unwrap().to_string());
        (dir, config)
    }

    #[tokio::test]
    async fn test_run_writes_all_tables() {
        let (_dir, config) = setup(CSV);
        let sink = Arc::new(MemorySink::default());
        let pipeline = Pipeline::with_sink(config, sink.clone());

        let event = StorageEvent::new("landing", "sales.csv").unwrap();
        let stats = pipeline.run(&event).await.unwrap();

        assert_eq!(stats.rows_read, 3);
        assert_eq!(stats.tables_written(), 5);
        assert_eq!(stats.rows_written("test.dataset.customer_dim"), Some(2));
        assert_eq!(stats.rows_written("test.dataset.time_dim"), Some(1));
        assert_eq!(stats.rows_written("test.dataset.sales_fact"), Some(3));

        let tables = sink.tables.lock().unwrap();
        assert_eq!(tables.len(), 5);
        assert_eq!(tables[4].0, TableName::SalesFact);
    }

    #[tokio::test]
    async fn test_missing_object_is_retrieval_failure() {
        let (_dir, config) = setup(CSV);
        let sink = Arc::new(MemorySink::default());
        let pipeline = Pipeline::with_sink(config, sink.clone());

        let event = StorageEvent::new("landing", "absent.csv").unwrap();
        let err = pipeline.run(&event).await.unwrap_err();

        assert!(matches!(err, PipelineError::Retrieval { .. }));
        assert!(err.is_not_found());
        assert!(sink.tables.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ragged_rows_are_decode_failure() {
        let (_dir, config) = setup("Order ID,Sales\nO-1,1,extra\n");
        let pipeline = Pipeline::with_sink(config, Arc::new(MemorySink::default()));

        let event = StorageEvent::new("landing", "sales.csv").unwrap();
        let err = pipeline.run(&event).await.unwrap_err();
        assert_eq!(err.stage(), "decode");
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_running() {
        let config = Config::default();
        let err = match Pipeline::new(config).await {
            Ok(_) => panic!("Expected an empty sink path to be rejected"),
            Err(e) => e,
        };
        assert!(matches!(err, PipelineError::Config { .. }));
    }
}
