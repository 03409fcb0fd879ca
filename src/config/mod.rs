//! Configuration parsing.
//!
//! Handles loading configuration from YAML files. Every section has defaults,
//! so the job can run without a config file as long as the sink path is
//! supplied.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{
    ConfigError, EmptyDateFormatsSnafu, EmptyNamespaceSnafu, EmptySinkPathSnafu,
    EnvInterpolationSnafu, InvalidDelimiterSnafu, ReadFileSnafu, YamlParseSnafu,
};

/// Default `project.dataset` the tables are written under.
pub const DEFAULT_NAMESPACE: &str = "data-mining-assignment-442318.etl_output";

/// Main configuration structure for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    /// Metrics configuration (optional, disabled by default).
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metrics configuration for Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether the metrics endpoint is served (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

/// Source configuration for fetching the triggering object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL scheme for the event's bucket when `root` is unset (default: "gs").
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Base location that contains one directory per bucket.
    /// Examples: "/data/landing", "s3://mirror/landing"
    #[serde(default)]
    pub root: Option<String>,

    /// Field delimiter of the extract (default: ",").
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// `chrono` formats tried in order when parsing order dates.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,

    /// Storage options (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            root: None,
            delimiter: default_delimiter(),
            date_formats: default_date_formats(),
            storage_options: HashMap::new(),
        }
    }
}

fn default_scheme() -> String {
    "gs".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

/// Date formats tried, in order, when none are configured.
pub fn default_date_formats() -> Vec<String> {
    ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl SourceConfig {
    /// URL of the container holding the event's object.
    pub fn container_url(&self, bucket: &str) -> String {
        match &self.root {
            Some(root) => format!("{}/{}", root.trim_end_matches('/'), bucket),
            None => format!("{}://{}", self.scheme, bucket),
        }
    }

    /// Delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }
}

/// Sink configuration for the analytical store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Root of the warehouse.
    /// Examples: "gs://warehouse", "/var/lib/starload"
    #[serde(default)]
    pub path: String,

    /// Namespace prefixed to every table id (default: [`DEFAULT_NAMESPACE`]).
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Parquet compression codec.
    #[serde(default)]
    pub compression: ParquetCompression,

    /// Storage options (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            namespace: default_namespace(),
            compression: ParquetCompression::default(),
            storage_options: HashMap::new(),
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Transform stage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformConfig {
    /// What to do with rows whose key columns are empty.
    #[serde(default)]
    pub null_keys: NullKeyPolicy,
}

/// Handling of rows with an empty key column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NullKeyPolicy {
    /// Leave the row out of aggregates and dimensions; keep it in the fact.
    #[default]
    Skip,
    /// Fail the run.
    Reject,
}

/// Parquet compression codec.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    Uncompressed,
    #[default]
    Snappy,
    Gzip,
    Zstd,
    Lz4,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_options(path, true)
    }

    /// Load configuration from a YAML file with optional environment variable interpolation.
    pub fn from_file_with_options(
        path: impl AsRef<Path>,
        interpolate_env: bool,
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;
        Self::from_yaml(&content, interpolate_env)
    }

    /// Parse configuration from YAML text without validating it.
    pub fn from_yaml(content: &str, interpolate_env: bool) -> Result<Self, ConfigError> {
        let content = if interpolate_env {
            let result = vars::interpolate(content);
            if !result.is_ok() {
                let error_msg = result.errors.join("\n");
                return EnvInterpolationSnafu { message: error_msg }.fail();
            }
            result.text
        } else {
            content.to_string()
        };

        serde_yaml::from_str(&content).context(YamlParseSnafu)
    }

    /// Validate the configuration. Called once command-line overrides are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.sink.path.is_empty(), EmptySinkPathSnafu);
        ensure!(!self.sink.namespace.is_empty(), EmptyNamespaceSnafu);
        ensure!(
            self.source.delimiter.len() == 1,
            InvalidDelimiterSnafu {
                delimiter: self.source.delimiter.clone(),
            }
        );
        ensure!(!self.source.date_formats.is_empty(), EmptyDateFormatsSnafu);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::from_yaml("sink:\n  path: /warehouse\n", false).unwrap();
        assert_eq!(config.source.scheme, "gs");
        assert_eq!(config.source.delimiter_byte(), b',');
        assert_eq!(config.sink.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.sink.compression, ParquetCompression::Snappy);
        assert_eq!(config.transform.null_keys, NullKeyPolicy::Skip);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_config_yaml_parsing() {
        let yaml = r#"
source:
  root: /data/landing/
  delimiter: ";"
  date_formats: ["%d.%m.%Y"]

sink:
  path: "s3://warehouse/tables"
  namespace: analytics.sales
  compression: zstd

transform:
  null_keys: reject
"#;
        let config = Config::from_yaml(yaml, false).unwrap();
        assert_eq!(config.source.delimiter_byte(), b';');
        assert_eq!(config.source.date_formats, vec!["%d.%m.%Y".to_string()]);
        assert_eq!(config.sink.namespace, "analytics.sales");
        assert_eq!(config.sink.compression, ParquetCompression::Zstd);
        assert_eq!(config.transform.null_keys, NullKeyPolicy::Reject);
    }

    #[test]
    fn test_container_url() {
        let mut source = SourceConfig::default();
        assert_eq!(source.container_url("landing"), "gs://landing");

        source.root = Some("/data/mirror/".to_string());
        assert_eq!(source.container_url("landing"), "/data/mirror/landing");
    }

    #[test]
    fn test_validation_errors() {
        let invalid = |yaml: &str| Config::from_yaml(yaml, false).unwrap().validate().unwrap_err();

        let err = invalid("source:\n  delimiter: ','\n");
        assert!(matches!(err, ConfigError::EmptySinkPath));

        let err = invalid("sink:\n  path: /w\nsource:\n  delimiter: '||'\n");
        assert!(matches!(err, ConfigError::InvalidDelimiter { .. }));

        let err = invalid("sink:\n  path: /w\nsource:\n  date_formats: []\n");
        assert!(matches!(err, ConfigError::EmptyDateFormats));

        let err = invalid("sink:\n  path: /w\n  namespace: ''\n");
        assert!(matches!(err, ConfigError::EmptyNamespace));
    }
}
