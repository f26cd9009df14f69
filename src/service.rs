use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::archive::content_resolver::{ArchiveContent, ArchiveContentResolver};
use crate::config::DocServerConfig;
use crate::error::{FetchError, RepoError};
use crate::maven::coordinates::ArtifactIdentifier;
use crate::maven::remote_repo::{RemoteMavenRepo, RepositoryFetcher};
use crate::maven::version_resolver::VersionResolver;
use crate::storage::artifact_cache::ArtifactCache;
use crate::storage::local_storage::LocalStorage;

/// Entry point for serving documentation: resolves coordinates, keeps downloaded documentation
///  jars and looks up files inside them.
pub struct DocRepository {
    name: String,
    repository_url: String,
    default_classifier: String,
    classifiers: Vec<String>,
    remote: Arc<RemoteMavenRepo>,
    versions: VersionResolver,
    artifacts: ArtifactCache,
    archives: ArchiveContentResolver,
}

impl DocRepository {
    pub async fn new(config: &DocServerConfig, fetcher: Arc<dyn RepositoryFetcher>) -> Result<DocRepository, RepoError> {
        let storage_root = match &config.local_storage {
            Some(root) => root.clone(),
            None => std::env::temp_dir().join(format!("apidoc-{}", uuid::Uuid::new_v4())),
        };
        let storage = LocalStorage::open(storage_root).await?;
        info!("storing documentation jars in {}", storage.root().display());

        let remote = Arc::new(RemoteMavenRepo::new(fetcher, config.metadata_temp_dir()));

        Ok(DocRepository {
            name: config.name.clone(),
            repository_url: config.repository_url.clone(),
            default_classifier: config.default_classifier.clone(),
            classifiers: config.classifiers.clone(),
            versions: VersionResolver::new(remote.clone(), config.snapshot_cache_timeout, config.cache_capacity),
            artifacts: ArtifactCache::new(remote.clone(), storage, &config.cache_settings()),
            archives: ArchiveContentResolver,
            remote,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    pub fn default_classifier(&self) -> &str {
        &self.default_classifier
    }

    pub async fn list_available_versions(&self, group_id: &str, artifact_id: &str) -> Result<Vec<String>, RepoError> {
        self.versions.list_available_versions(group_id, artifact_id).await
    }

    /// the coordinate with 'latest' / 'release' replaced by the concrete version
    pub async fn resolve_coordinate(&self, group_id: &str, artifact_id: &str, version: &str, classifier: Option<&str>) -> Result<ArtifactIdentifier, RepoError> {
        let requested = ArtifactIdentifier::new(group_id, artifact_id, version, classifier.map(str::to_string))?;

        let resolved = self.versions.resolve(group_id, artifact_id, version).await?;
        if resolved == requested.version() {
            return Ok(requested);
        }
        debug!("{} resolves to version {}", requested, resolved);
        ArtifactIdentifier::new(group_id, artifact_id, resolved, classifier.map(str::to_string))
    }

    pub async fn retrieve_file(&self, group_id: &str, artifact_id: &str, version: &str, classifier: Option<&str>) -> Result<PathBuf, RepoError> {
        let artifact = self.resolve_coordinate(group_id, artifact_id, version, classifier).await?;
        self.artifacts.resolve_file(&artifact).await
    }

    pub async fn serve_sub_path(&self, archive: &Path, sub_path: &str) -> Result<ArchiveContent, RepoError> {
        self.archives.resolve(archive, sub_path).await
    }

    /// The configured classifiers for which the repository has a jar, in configuration order. All
    ///  classifiers are checked concurrently.
    pub async fn available_classifiers(&self, group_id: &str, artifact_id: &str, version: &str) -> Result<Vec<String>, RepoError> {
        let unclassified = self.resolve_coordinate(group_id, artifact_id, version, None).await?;

        let checks = self.classifiers.iter()
            .map(|classifier| self.has_classifier(&unclassified, classifier));
        let results = futures::future::join_all(checks).await;

        let mut available = Vec::new();
        for (classifier, result) in self.classifiers.iter().zip(results) {
            if result? {
                available.push(classifier.clone());
            }
        }
        Ok(available)
    }

    async fn has_classifier(&self, unclassified: &ArtifactIdentifier, classifier: &str) -> Result<bool, RepoError> {
        let artifact = ArtifactIdentifier::new(
            unclassified.group_id(),
            unclassified.artifact_id(),
            unclassified.version(),
            Some(classifier.to_string()),
        )?;

        match self.remote.exists(&artifact.repository_path()).await {
            Ok(exists) => Ok(exists),
            Err(e @ RepoError::Fetch(FetchError::AccessDenied(_))) => Err(e),
            Err(e) => {
                warn!("unable to check whether {} exists, treating it as absent: {}", artifact, e);
                Ok(false)
            }
        }
    }
}
