//! Error types for starload using snafu.
//!
//! Each pipeline stage has its own error enum; [`PipelineError`] wraps them so
//! callers can tell a retrieval failure from a decode, transform or write
//! failure.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error: {source}"))]
    S3Config { source: object_store::Error },

    /// GCS configuration error.
    #[snafu(display("GCS configuration error: {source}"))]
    GcsConfig { source: object_store::Error },

    /// Azure configuration error.
    #[snafu(display("Azure configuration error: {source}"))]
    AzureConfig { source: object_store::Error },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Sink path is empty.
    #[snafu(display("Sink path cannot be empty"))]
    EmptySinkPath,

    /// Destination namespace is empty.
    #[snafu(display("Sink namespace cannot be empty"))]
    EmptyNamespace,

    /// Delimiter is not a single byte.
    #[snafu(display("Delimiter must be a single byte, got {delimiter:?}"))]
    InvalidDelimiter { delimiter: String },

    /// No date formats configured.
    #[snafu(display("At least one date format must be configured"))]
    EmptyDateFormats,

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file: {source}"))]
    ReadFile { source: std::io::Error },
}

// ============ Event Errors ============

/// Errors raised while reading the trigger event.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EventError {
    /// Failed to read the event file.
    #[snafu(display("Failed to read event file: {source}"))]
    ReadEvent { source: std::io::Error },

    /// Event is not valid JSON or lacks `bucket`/`name`.
    #[snafu(display("Failed to parse event: {source}"))]
    ParseEvent { source: serde_json::Error },

    /// Event carries an empty field.
    #[snafu(display("Event field '{field}' cannot be empty"))]
    EmptyEventField { field: &'static str },

    /// Neither an event file nor bucket/name were supplied.
    #[snafu(display("An event file or both --bucket and --name are required"))]
    MissingEvent,
}

// ============ Decode Errors ============

/// Errors that can occur while decoding delimited text.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    /// The object holds no header row.
    #[snafu(display("No header row in {path}"))]
    MissingHeader { path: String },

    /// The CSV reader rejected the content.
    #[snafu(display("Malformed delimited text in {path}: {source}"))]
    Csv { path: String, source: csv::Error },

    /// A header name appears twice.
    #[snafu(display("Duplicate column '{column}' in {path}"))]
    DuplicateColumn { path: String, column: String },
}

// ============ Transform Errors ============

/// Errors that can occur while building features and the star schema.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TransformError {
    /// A required input column is absent.
    #[snafu(display("Missing required column '{column}'"))]
    MissingColumn { column: String },

    /// An order date did not match any configured format.
    #[snafu(display("Row {row}: cannot parse date '{value}'"))]
    DateParse { row: usize, value: String },

    /// A numeric measure is not a number.
    #[snafu(display("Row {row}: column '{column}' has non-numeric value '{value}'"))]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },

    /// A key column is empty and the policy rejects null keys.
    #[snafu(display("Row {row}: key column '{column}' is empty"))]
    NullKey { row: usize, column: &'static str },

    /// Building an Arrow batch failed.
    #[snafu(display("Failed to build table '{table}': {source}"))]
    Arrow {
        table: String,
        source: arrow::error::ArrowError,
    },
}

// ============ Sink Errors ============

/// Errors that can occur while writing tables to the analytical store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// Failed to create the Parquet writer.
    #[snafu(display("Failed to create Parquet writer for {table_id}: {source}"))]
    WriterCreate {
        table_id: String,
        source: parquet::errors::ParquetError,
    },

    /// Parquet encoding failed.
    #[snafu(display("Parquet encoding failed for {table_id}: {source}"))]
    Encode {
        table_id: String,
        source: parquet::errors::ParquetError,
    },

    /// Uploading the encoded table failed.
    #[snafu(display("Failed to upload {table_id}: {source}"))]
    Upload {
        table_id: String,
        source: StorageError,
    },

    /// Failed to create the sink storage provider.
    #[snafu(display("Failed to open sink storage: {source}"))]
    SinkStorage { source: StorageError },
}

impl SinkError {
    /// Destination table the failed write targeted, if any.
    pub fn table_id(&self) -> Option<&str> {
        match self {
            SinkError::WriterCreate { table_id, .. }
            | SinkError::Encode { table_id, .. }
            | SinkError::Upload { table_id, .. } => Some(table_id),
            SinkError::SinkStorage { .. } => None,
        }
    }
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Pipeline Error (top-level) ============

/// Top-level pipeline errors, one variant per failure kind.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// The triggering object could not be retrieved.
    #[snafu(display("Retrieval failed for {url}"))]
    Retrieval { url: String, source: StorageError },

    /// The object is not valid delimited text.
    #[snafu(display("Decode failed"))]
    Decode { source: DecodeError },

    /// Feature or schema construction failed.
    #[snafu(display("Transform failed"))]
    Transform { source: TransformError },

    /// A destination table could not be written.
    #[snafu(display("Write failed"))]
    Write { source: SinkError },

    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Trigger event error.
    #[snafu(display("Invalid trigger event"))]
    InvalidEvent { source: EventError },

    /// Address parsing error.
    #[snafu(display("Failed to parse address"))]
    AddressParse { source: std::net::AddrParseError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },
}

impl PipelineError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            PipelineError::Retrieval { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Short label for the failed stage, used in logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Retrieval { .. } => "retrieval",
            PipelineError::Decode { .. } => "decode",
            PipelineError::Transform { .. } => "transform",
            PipelineError::Write { .. } => "write",
            PipelineError::Config { .. }
            | PipelineError::InvalidEvent { .. }
            | PipelineError::AddressParse { .. }
            | PipelineError::Metrics { .. } => "setup",
        }
    }
}
