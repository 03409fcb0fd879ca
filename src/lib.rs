//! starload: loads sales extracts from object storage into a star schema.
//!
//! A run is triggered by an object-arrival event. The object is decoded as
//! delimited text, aggregate features are computed per customer and product,
//! and four dimension tables plus a fact table are written as Parquet to the
//! warehouse under `{namespace}.{table}`.
//!
//! # Example
//!
//! ```ignore
//! use starload::{Config, StorageEvent, run_pipeline, error::PipelineError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let config = Config::from_file("config.yaml")?;
//!     let event = StorageEvent::new("sales-landing", "superstore.csv")?;
//!     let stats = run_pipeline(config, &event).await?;
//!     println!("Wrote {} tables", stats.tables_written());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod storage;
pub mod transform;

// Re-export main types
pub use config::Config;
pub use event::StorageEvent;
pub use pipeline::{Pipeline, PipelineStats, run_pipeline};
pub use sink::{TableSink, WarehouseSink};
pub use storage::StorageProvider;
