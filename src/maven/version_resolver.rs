use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, info};

use crate::error::RepoError;
use crate::maven::coordinates::{GroupArtifact, MavenVersionRef};
use crate::maven::paths::artifact_metadata_path;
use crate::maven::remote_repo::RemoteMavenRepo;

/// Resolves 'latest' and 'release' to concrete versions via the artifact's maven-metadata.xml.
///
/// 'latest' changes with every snapshot deployment, so it is cached for a limited time only.
///  A release, once published, does not change, so 'release' is only bounded by capacity.
pub struct VersionResolver {
    remote: Arc<RemoteMavenRepo>,
    latest: Cache<GroupArtifact, String>,
    release: Cache<GroupArtifact, String>,
}

impl VersionResolver {
    pub fn new(remote: Arc<RemoteMavenRepo>, latest_ttl: Duration, capacity: u64) -> VersionResolver {
        VersionResolver {
            remote,
            latest: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(latest_ttl)
                .build(),
            release: Cache::builder()
                .max_capacity(capacity)
                .build(),
        }
    }

    /// `version` unchanged unless it is a symbolic reference
    pub async fn resolve(&self, group_id: &str, artifact_id: &str, version: &str) -> Result<String, RepoError> {
        let Some(version_ref) = MavenVersionRef::parse(version) else {
            return Ok(version.to_string());
        };

        let cache = match version_ref {
            MavenVersionRef::Latest => &self.latest,
            MavenVersionRef::Release => &self.release,
        };

        let key = GroupArtifact::new(group_id, artifact_id);
        cache.try_get_with(key.clone(), self.load(&key, version_ref))
            .await
            .map_err(|e| e.as_ref().clone())
    }

    async fn load(&self, key: &GroupArtifact, version_ref: MavenVersionRef) -> Result<String, RepoError> {
        info!("reading {} version of {} from maven-metadata.xml", version_ref, key);

        let metadata = self.remote.metadata(&artifact_metadata_path(key))
            .await
            .map_err(|e| RepoError::wrapping(format!("could not read maven-metadata.xml for {}", key), e))?;

        // an ambiguous document was read fine, so this is reported as is
        match metadata.find_singleton(version_ref.xml_element_name())? {
            Some(version) => {
                debug!("resolved {} for {} to {}", version_ref, key, version);
                Ok(version)
            }
            None => Err(RepoError::VersionNotFound {
                reference: version_ref.to_string(),
                group: key.group_id.clone(),
                artifact: key.artifact_id.clone(),
            }),
        }
    }

    /// All published versions, newest first by lexicographic (not semantic version) ordering
    pub async fn list_available_versions(&self, group_id: &str, artifact_id: &str) -> Result<Vec<String>, RepoError> {
        let key = GroupArtifact::new(group_id, artifact_id);
        info!("listing versions of {}", key);

        let metadata = self.remote.metadata(&artifact_metadata_path(&key))
            .await
            .map_err(|e| RepoError::wrapping(format!("could not read maven-metadata.xml for {}", key), e))?;

        Ok(sorted_descending(metadata.list_versions()))
    }
}

fn sorted_descending(mut versions: Vec<String>) -> Vec<String> {
    versions.sort_by(|a, b| b.cmp(a));
    versions.dedup();
    versions
}
