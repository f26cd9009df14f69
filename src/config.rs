use std::path::PathBuf;
use std::time::Duration;

use crate::storage::artifact_cache::{ArtifactCacheSettings, DEFAULT_CAPACITY, DEFAULT_SNAPSHOT_TTL};

pub const DEFAULT_NAME: &str = "ApiDoc Server";
pub const DEFAULT_REPOSITORY_URL: &str = "https://repo1.maven.org/maven2";
pub const DEFAULT_CLASSIFIER: &str = "javadoc";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct DocServerConfig {
    pub name: String,
    pub repository_url: String,
    pub default_classifier: String,
    /// checked in this order when listing the documentation available for a version
    pub classifiers: Vec<String>,
    pub snapshots_enabled: bool,
    /// applies to cached snapshot jars and to resolved 'latest' versions
    pub snapshot_cache_timeout: Duration,
    pub cache_capacity: u64,
    /// a fresh directory below the system's temp dir if not set
    pub local_storage: Option<PathBuf>,
    pub metadata_temp_dir: Option<PathBuf>,
    pub fetch_timeout: Duration,
}

impl Default for DocServerConfig {
    fn default() -> Self {
        DocServerConfig {
            name: DEFAULT_NAME.to_string(),
            repository_url: DEFAULT_REPOSITORY_URL.to_string(),
            default_classifier: DEFAULT_CLASSIFIER.to_string(),
            classifiers: vec![DEFAULT_CLASSIFIER.to_string()],
            snapshots_enabled: true,
            snapshot_cache_timeout: DEFAULT_SNAPSHOT_TTL,
            cache_capacity: DEFAULT_CAPACITY,
            local_storage: None,
            metadata_temp_dir: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl DocServerConfig {
    pub fn cache_settings(&self) -> ArtifactCacheSettings {
        ArtifactCacheSettings {
            snapshots_enabled: self.snapshots_enabled,
            snapshot_ttl: self.snapshot_cache_timeout,
            capacity: self.cache_capacity,
        }
    }

    pub fn metadata_temp_dir(&self) -> PathBuf {
        self.metadata_temp_dir.clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
