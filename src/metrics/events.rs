//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in a run. Events
//! implement the `InternalEvent` trait which records the matching metric.

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Pipeline stages, used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Features,
    Schema,
    Sink,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Features => "features",
            Stage::Schema => "schema",
            Stage::Sink => "sink",
        }
    }
}

/// Event emitted when raw bytes are fetched from the source object.
pub struct BytesRead {
    pub bytes: u64,
}

impl InternalEvent for BytesRead {
    fn emit(self) {
        trace!(bytes = self.bytes, "Bytes read");
        counter!("starload_bytes_read_total").increment(self.bytes);
    }
}

/// Event emitted when the raw table has been decoded.
pub struct RowsLoaded {
    pub count: u64,
}

impl InternalEvent for RowsLoaded {
    fn emit(self) {
        trace!(count = self.count, "Rows loaded");
        counter!("starload_rows_loaded_total").increment(self.count);
    }
}

/// Event emitted for raw rows left out of a grouping because the key was empty.
pub struct NullKeysSkipped {
    pub column: &'static str,
    pub count: u64,
}

impl InternalEvent for NullKeysSkipped {
    fn emit(self) {
        trace!(column = self.column, count = self.count, "Null keys skipped");
        counter!("starload_null_keys_skipped_total", "column" => self.column)
            .increment(self.count);
    }
}

/// Event emitted when a stage finishes.
pub struct StageCompleted {
    pub stage: Stage,
    pub duration: Duration,
}

impl InternalEvent for StageCompleted {
    fn emit(self) {
        trace!(
            stage = self.stage.as_str(),
            duration_ms = self.duration.as_millis(),
            "Stage completed"
        );
        histogram!("starload_stage_duration_seconds", "stage" => self.stage.as_str())
            .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when one destination table has been written.
pub struct TableWritten {
    pub table: &'static str,
    pub rows: u64,
    pub bytes: u64,
}

impl InternalEvent for TableWritten {
    fn emit(self) {
        trace!(
            table = self.table,
            rows = self.rows,
            bytes = self.bytes,
            "Table written"
        );
        counter!("starload_table_rows_written_total", "table" => self.table).increment(self.rows);
        counter!("starload_bytes_written_total", "table" => self.table).increment(self.bytes);
    }
}

/// Event emitted when a run fails.
pub struct PipelineFailed {
    pub stage: &'static str,
}

impl InternalEvent for PipelineFailed {
    fn emit(self) {
        trace!(stage = self.stage, "Pipeline failed");
        counter!("starload_runs_failed_total", "stage" => self.stage).increment(1);
    }
}

/// Event emitted when a run succeeds.
pub struct PipelineSucceeded;

impl InternalEvent for PipelineSucceeded {
    fn emit(self) {
        trace!("Pipeline succeeded");
        counter!("starload_runs_succeeded_total").increment(1);
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Get,
    Put,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
    pub duration: Duration,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request"
        );
        counter!(
            "starload_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
        histogram!(
            "starload_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}
