//! Object storage access for both ends of the pipeline.
//!
//! The source side only ever reads one whole object; the sink side only ever
//! writes whole objects. Both go through [`StorageProvider`], which resolves a
//! URL to an S3, GCS, Azure or local filesystem backend.

mod azure;
mod gcs;
mod local;
mod s3;

use bytes::Bytes;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use regex::{Captures, Regex};
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use crate::emit;
use crate::error::{InvalidUrlSnafu, ObjectStoreSnafu, StorageError};
use crate::metrics::events::{RequestStatus, StorageOperation, StorageRequest};

pub use azure::AzureConfig;
pub use gcs::GcsConfig;
pub use local::LocalConfig;
pub use s3::S3Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    S3,
    Gcs,
    Azure,
    Local,
}

/// URL patterns, tried in order. The first match decides the backend.
static MATCHERS: LazyLock<Vec<(Backend, Regex)>> = LazyLock::new(|| {
    [
        (
            Backend::S3,
            r"^[sS]3[aA]?::(?P<protocol>https?)://(?P<endpoint>[^:/]+):(?P<port>\d+)/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$",
        ),
        (
            Backend::S3,
            r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$",
        ),
        (
            Backend::Gcs,
            r"^[gG][sS]://(?P<bucket>[a-z0-9\-\._]+)(/(?P<key>.+))?$",
        ),
        (
            Backend::Gcs,
            r"^https://storage\.googleapis\.com/(?P<bucket>[a-z0-9\-_\.]+)(/(?P<key>.+))?$",
        ),
        (
            Backend::Azure,
            r"^abfss?://(?P<container>[a-z0-9\-]+)@(?P<account>[a-z0-9]+)\.dfs\.core\.windows\.net(/(?P<key>.+))?$",
        ),
        (
            Backend::Azure,
            r"^https://(?P<account>[a-z0-9]+)\.(blob|dfs)\.core\.windows\.net/(?P<container>[a-z0-9\-]+)(/(?P<key>.+))?$",
        ),
        (Backend::Local, r"^file://(?P<path>/.*)$"),
        (Backend::Local, r"^(?P<path>/.*)$"),
    ]
    .into_iter()
    .map(|(backend, pattern)| (backend, Regex::new(pattern).expect("Invalid URL pattern")))
    .collect()
});

/// Backend configuration resolved from a storage URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Gcs(GcsConfig),
    Azure(AzureConfig),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        let Some((backend, caps)) = MATCHERS
            .iter()
            .find_map(|(backend, regex)| regex.captures(url).map(|caps| (*backend, caps)))
        else {
            return InvalidUrlSnafu { url }.fail();
        };

        let group = |name: &str| caps.name(name).map(|m| m.as_str().to_string());
        let key = caps
            .name("key")
            .map(|m| Path::from(m.as_str().trim_end_matches('/')))
            .filter(|key| key.parts().next().is_some());

        let config = match backend {
            Backend::S3 => BackendConfig::S3(S3Config {
                endpoint: s3_endpoint(&caps),
                region: std::env::var("AWS_DEFAULT_REGION").ok(),
                bucket: group("bucket").unwrap_or_default(),
                key,
            }),
            Backend::Gcs => BackendConfig::Gcs(GcsConfig {
                bucket: group("bucket").unwrap_or_default(),
                key,
            }),
            Backend::Azure => BackendConfig::Azure(AzureConfig {
                account: group("account").unwrap_or_default(),
                container: group("container").unwrap_or_default(),
                key,
            }),
            Backend::Local => {
                let path = group("path").unwrap_or_default();
                let trimmed = path.trim_end_matches('/');
                BackendConfig::Local(LocalConfig {
                    path: if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() },
                })
            }
        };

        Ok(config)
    }

    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::S3(s3) => s3.key.as_ref(),
            BackendConfig::Gcs(gcs) => gcs.key.as_ref(),
            BackendConfig::Azure(azure) => azure.key.as_ref(),
            BackendConfig::Local(_) => None,
        }
    }
}

fn s3_endpoint(caps: &Captures) -> Option<String> {
    std::env::var("AWS_ENDPOINT").ok().or_else(|| {
        let endpoint = caps.name("endpoint")?;
        let protocol = caps.name("protocol").map_or("https", |p| p.as_str());
        let port = caps
            .name("port")
            .and_then(|p| p.as_str().parse::<u16>().ok())
            .unwrap_or(443);
        Some(format!("{}://{}:{}", protocol, endpoint.as_str(), port))
    })
}

/// Storage provider that abstracts over different cloud storage backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL with storage options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        match BackendConfig::parse_url(url)? {
            BackendConfig::S3(config) => Self::construct_s3(config, options),
            BackendConfig::Gcs(config) => Self::construct_gcs(config, options),
            BackendConfig::Azure(config) => Self::construct_azure(config, options),
            BackendConfig::Local(config) => Self::construct_local(config).await,
        }
    }

    /// Get the full contents of an object.
    pub async fn get(&self, path: impl Into<Path>) -> Result<Bytes, StorageError> {
        let path = path.into();
        let start = Instant::now();

        let result = match self.object_store.get(&self.qualify_path(&path)).await {
            Ok(response) => response.bytes().await,
            Err(e) => Err(e),
        };

        emit!(StorageRequest {
            operation: StorageOperation::Get,
            status: RequestStatus::from_result(&result),
            duration: start.elapsed(),
        });

        result.context(ObjectStoreSnafu)
    }

    /// Put a payload to a path, replacing any existing object.
    pub async fn put_payload(&self, path: &Path, payload: PutPayload) -> Result<(), StorageError> {
        let path = self.qualify_path(path);
        let start = Instant::now();
        let result = self.object_store.put(&path, payload).await;

        emit!(StorageRequest {
            operation: StorageOperation::Put,
            status: RequestStatus::from_result(&result),
            duration: start.elapsed(),
        });

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Qualify a path with the configured key prefix.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// URL identifying this provider's root, for logs.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }
}
