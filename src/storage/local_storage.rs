use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{create_dir_all, remove_file};
use tracing::{debug, trace, warn};

use crate::error::RepoError;
use crate::maven::coordinates::ArtifactIdentifier;
use crate::maven::paths::local_file_path;

/// Downloaded documentation jars, laid out as `<root>/<group>/<artifact>/<version>/<classifier>.jar`.
///
/// Files are only ever created and deleted on behalf of the artifact cache, which guarantees that
///  there is at most one download per path in flight.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub async fn open(root: PathBuf) -> Result<LocalStorage, RepoError> {
        create_dir_all(&root)
            .await
            .map_err(|e| RepoError::storage(&root, e))?;
        debug!("local artifact storage at {}", root.display());
        Ok(LocalStorage { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, artifact: &ArtifactIdentifier) -> PathBuf {
        local_file_path(&self.root, artifact)
    }

    /// the path to download an artifact to, with its parent directories in place
    pub async fn prepare(&self, artifact: &ArtifactIdentifier) -> Result<PathBuf, RepoError> {
        let path = self.path_for(artifact);
        if let Some(directory) = path.parent() {
            trace!("creating directory {} for {}", directory.display(), artifact);
            create_dir_all(directory)
                .await
                .map_err(|e| RepoError::storage(directory, e))?;
        }
        Ok(path)
    }

    /// Deletes a downloaded file. This is cleanup, so failures are logged and otherwise ignored.
    pub async fn remove_quietly(path: &Path, artifact: &ArtifactIdentifier) {
        match remove_file(path).await {
            Ok(()) => {
                debug!("removed downloaded jar {} for {}", path.display(), artifact);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("downloaded jar {} for {} does not exist, so it cannot be cleaned up", path.display(), artifact);
            }
            Err(e) => {
                warn!("could not remove downloaded jar {} for {}: {}", path.display(), artifact, e);
            }
        }
    }
}
