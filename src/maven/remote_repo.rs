use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::error::{FetchError, RepoError};
use crate::maven::metadata_xml::MetadataDocument;

/// Transport to a remote Maven repository. Paths are relative to the repository root, i.e. they
///  start with something like "org/..." or "com/...".
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    /// Downloads a file to `destination`. On failure, `destination` must not have been created.
    async fn fetch(&self, remote_path: &str, destination: &Path) -> Result<(), FetchError>;

    async fn exists(&self, remote_path: &str) -> Result<bool, FetchError>;
}

/// A remote Maven repository as seen by the caches: artifact downloads to local files, and
///  maven-metadata.xml documents that are parsed and discarded right away.
pub struct RemoteMavenRepo {
    fetcher: Arc<dyn RepositoryFetcher>,
    temp_root: PathBuf,
}

impl RemoteMavenRepo {
    /// `temp_root` is where metadata documents are downloaded to; each download gets its own
    ///  directory there which is removed as soon as the document is parsed
    pub fn new(fetcher: Arc<dyn RepositoryFetcher>, temp_root: PathBuf) -> RemoteMavenRepo {
        RemoteMavenRepo {
            fetcher,
            temp_root,
        }
    }

    pub async fn download(&self, remote_path: &str, destination: &Path) -> Result<(), RepoError> {
        debug!("downloading {} to {}", remote_path, destination.display());
        self.fetcher.fetch(remote_path, destination).await?;
        Ok(())
    }

    pub async fn exists(&self, remote_path: &str) -> Result<bool, RepoError> {
        Ok(self.fetcher.exists(remote_path).await?)
    }

    pub async fn metadata(&self, remote_path: &str) -> Result<MetadataDocument, RepoError> {
        // dropping the directory removes it with its content, on every exit path
        let temp_dir = tempfile::Builder::new()
            .prefix("maven-metadata-")
            .tempdir_in(&self.temp_root)
            .map_err(|e| RepoError::storage(&self.temp_root, e))?;

        let file = temp_dir.path().join("maven-metadata.xml");
        trace!("getting metadata {} via {}", remote_path, file.display());

        let result = self.read_metadata(remote_path, &file).await;

        let temp_path = temp_dir.path().to_path_buf();
        if let Err(e) = temp_dir.close() {
            warn!("failed to remove temporary metadata directory {}: {}", temp_path.display(), e);
        }
        result
    }

    async fn read_metadata(&self, remote_path: &str, file: &Path) -> Result<MetadataDocument, RepoError> {
        self.fetcher.fetch(remote_path, file).await?;
        let data = tokio::fs::read(file)
            .await
            .map_err(|e| RepoError::storage(file, e))?;
        MetadataDocument::parse(&data)
    }
}
