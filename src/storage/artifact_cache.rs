use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::FutureExt;
use moka::future::Cache;
use moka::notification::{ListenerFuture, RemovalCause};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::RepoError;
use crate::maven::coordinates::ArtifactIdentifier;
use crate::maven::paths::{release_file_name, remote_file_path, snapshot_file_name, version_metadata_path};
use crate::maven::remote_repo::RemoteMavenRepo;
use crate::storage::local_storage::LocalStorage;

pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_CAPACITY: u64 = 1000;

#[derive(Debug, Clone)]
pub struct ArtifactCacheSettings {
    pub snapshots_enabled: bool,
    pub snapshot_ttl: Duration,
    pub capacity: u64,
}
impl Default for ArtifactCacheSettings {
    fn default() -> Self {
        ArtifactCacheSettings {
            snapshots_enabled: true,
            snapshot_ttl: DEFAULT_SNAPSHOT_TTL,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachedArtifact {
    pub file: PathBuf,
    pub loaded_at: SystemTime,
    generation: u64,
}

/// Tracks which load of a snapshot currently owns the file at a given path. A snapshot that expires
///  and is downloaded again reuses the same path, and the expired entry's removal must not delete
///  the fresh download.
#[derive(Default)]
struct FileOwners {
    next_generation: AtomicU64,
    owners: Mutex<HashMap<PathBuf, u64>>,
}

impl FileOwners {
    async fn claim(&self, path: &Path) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.owners.lock()
            .await
            .insert(path.to_path_buf(), generation);
        generation
    }

    /// Deletes the file if `generation` still owns it. The lock is held while deleting so that a
    ///  concurrent claim can not start downloading to the path before the file is gone.
    async fn delete_if_owner(&self, path: &Path, generation: u64, artifact: &ArtifactIdentifier) -> bool {
        let mut owners = self.owners.lock().await;
        if owners.get(path) != Some(&generation) {
            return false;
        }
        owners.remove(path);
        LocalStorage::remove_quietly(path, artifact).await;
        true
    }

    /// gives up ownership after a failed download, discarding whatever stale file is at the path
    async fn abandon(&self, path: &Path, generation: u64, artifact: &ArtifactIdentifier) {
        let mut owners = self.owners.lock().await;
        if owners.get(path) == Some(&generation) {
            owners.remove(path);
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                LocalStorage::remove_quietly(path, artifact).await;
            }
        }
    }
}

/// Resolves artifact coordinates to downloaded documentation jars.
///
/// There is at most one download per coordinate in flight; concurrent callers wait for it and
///  share its outcome. Snapshots are kept for a limited time and their files are deleted when they
///  leave the cache, releases are kept (and their files retained) until capacity is exceeded.
pub struct ArtifactCache {
    remote: Arc<RemoteMavenRepo>,
    storage: LocalStorage,
    snapshots_enabled: bool,
    owners: Arc<FileOwners>,
    snapshots: Cache<ArtifactIdentifier, CachedArtifact>,
    releases: Cache<ArtifactIdentifier, CachedArtifact>,
}

impl ArtifactCache {
    pub fn new(remote: Arc<RemoteMavenRepo>, storage: LocalStorage, settings: &ArtifactCacheSettings) -> ArtifactCache {
        let owners = Arc::new(FileOwners::default());

        let listener_owners = owners.clone();
        let snapshots = Cache::builder()
            .max_capacity(settings.capacity)
            .time_to_live(settings.snapshot_ttl)
            .async_eviction_listener(move |artifact: Arc<ArtifactIdentifier>, cached: CachedArtifact, cause: RemovalCause| -> ListenerFuture {
                let owners = listener_owners.clone();
                async move {
                    trace!("snapshot {} left the cache ({:?})", artifact, cause);
                    if !owners.delete_if_owner(&cached.file, cached.generation, &artifact).await {
                        debug!("{} was downloaded again since, keeping {}", artifact, cached.file.display());
                    }
                }.boxed()
            })
            .build();

        let releases = Cache::builder()
            .max_capacity(settings.capacity)
            .build();

        ArtifactCache {
            remote,
            storage,
            snapshots_enabled: settings.snapshots_enabled,
            owners,
            snapshots,
            releases,
        }
    }

    pub async fn resolve_file(&self, artifact: &ArtifactIdentifier) -> Result<PathBuf, RepoError> {
        let tier = if artifact.is_snapshot() {
            if !self.snapshots_enabled {
                return Err(RepoError::repository("snapshots disabled"));
            }
            &self.snapshots
        }
        else {
            &self.releases
        };

        let cached = tier.try_get_with(artifact.clone(), self.load(artifact))
            .await
            .map_err(|e| e.as_ref().clone())?;
        Ok(cached.file)
    }

    /// number of cached artifacts, both tiers; approximate until pending maintenance has run
    pub fn entry_count(&self) -> u64 {
        self.snapshots.entry_count() + self.releases.entry_count()
    }

    /// performs pending evictions, including the deletion of expired snapshots' files
    pub async fn run_pending_tasks(&self) {
        self.snapshots.run_pending_tasks().await;
        self.releases.run_pending_tasks().await;
    }

    async fn load(&self, artifact: &ArtifactIdentifier) -> Result<CachedArtifact, RepoError> {
        let file_name = self.documentation_file_name(artifact).await?;
        let remote_path = remote_file_path(artifact, &file_name);
        debug!("resolved download path for {} to {}", artifact, remote_path);

        let file = self.storage.prepare(artifact).await?;

        if !artifact.is_snapshot() {
            self.remote.download(&remote_path, &file).await?;
            return Ok(CachedArtifact { file, loaded_at: SystemTime::now(), generation: 0 });
        }

        let generation = self.owners.claim(&file).await;
        match self.remote.download(&remote_path, &file).await {
            Ok(()) => Ok(CachedArtifact { file, loaded_at: SystemTime::now(), generation }),
            Err(e) => {
                self.owners.abandon(&file, generation, artifact).await;
                Err(e)
            }
        }
    }

    async fn documentation_file_name(&self, artifact: &ArtifactIdentifier) -> Result<String, RepoError> {
        if !artifact.is_snapshot() {
            return Ok(release_file_name(artifact));
        }

        let metadata = self.remote.metadata(&version_metadata_path(artifact)).await?;
        match metadata.snapshot_file_descriptor(artifact.classifier()) {
            Some(descriptor) => Ok(snapshot_file_name(artifact, &descriptor)),
            None => {
                // best effort: the download's NotFound is the actual signal if this guess is wrong
                debug!("no snapshot file information for {}, using the release file name", artifact);
                Ok(release_file_name(artifact))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use crate::error::FetchError;
    use crate::maven::transient_repo::TransientRepo;

    use super::*;

    const RELEASE_PATH: &str = "com/foo/bar/1.0/bar-1.0-javadoc.jar";
    const SNAPSHOT_METADATA_PATH: &str = "com/foo/bar/2.0-SNAPSHOT/maven-metadata.xml";
    const SNAPSHOT_PATH: &str = "com/foo/bar/2.0-SNAPSHOT/bar-2.0-20240102.030405-7-javadoc.jar";

    const SNAPSHOT_METADATA: &str = r#"<metadata>
  <versioning>
    <snapshot><timestamp>20240102.030405</timestamp><buildNumber>7</buildNumber></snapshot>
    <snapshotVersions>
      <snapshotVersion><classifier>javadoc</classifier><extension>jar</extension><value>2.0-20240102.030405-7</value></snapshotVersion>
    </snapshotVersions>
  </versioning>
</metadata>"#;

    struct Fixture {
        dir: TempDir,
        repo: Arc<TransientRepo>,
        cache: ArtifactCache,
    }

    async fn fixture(repo: TransientRepo, settings: ArtifactCacheSettings) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(repo);
        repo.put(RELEASE_PATH, "release jar");
        repo.put(SNAPSHOT_METADATA_PATH, SNAPSHOT_METADATA);
        repo.put(SNAPSHOT_PATH, "snapshot jar");

        let remote = Arc::new(RemoteMavenRepo::new(repo.clone(), dir.path().to_path_buf()));
        let storage = LocalStorage::open(dir.path().join("storage")).await.unwrap();
        let cache = ArtifactCache::new(remote, storage, &settings);
        Fixture { dir, repo, cache }
    }

    fn artifact(version: &str, classifier: Option<&str>) -> ArtifactIdentifier {
        ArtifactIdentifier::new("com.foo", "bar", version, classifier.map(str::to_string)).unwrap()
    }

    fn short_ttl() -> ArtifactCacheSettings {
        ArtifactCacheSettings {
            snapshot_ttl: Duration::from_millis(200),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_only_the_current_owner_deletes_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("javadoc.jar");
        std::fs::write(&path, "snapshot jar").unwrap();
        let snapshot = artifact("2.0-SNAPSHOT", Some("javadoc"));

        let owners = FileOwners::default();
        let expired = owners.claim(&path).await;
        let current = owners.claim(&path).await;

        assert!(!owners.delete_if_owner(&path, expired, &snapshot).await);
        assert!(path.exists());

        assert!(owners.delete_if_owner(&path, current, &snapshot).await);
        assert!(!path.exists());

        // ownership ends with the deletion
        assert!(!owners.delete_if_owner(&path, current, &snapshot).await);
    }

    #[tokio::test]
    async fn test_abandoned_download_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("javadoc.jar");
        let snapshot = artifact("2.0-SNAPSHOT", Some("javadoc"));

        let owners = FileOwners::default();
        let generation = owners.claim(&path).await;
        std::fs::write(&path, "stale").unwrap();
        owners.abandon(&path, generation, &snapshot).await;

        assert!(!path.exists());
        assert!(!owners.delete_if_owner(&path, generation, &snapshot).await);
    }

    #[tokio::test]
    async fn test_release_is_downloaded_once() {
        let f = fixture(TransientRepo::new(), Default::default()).await;
        let release = artifact("1.0", Some("javadoc"));

        let file = f.cache.resolve_file(&release).await.unwrap();
        assert_eq!(file, f.dir.path().join("storage/com.foo/bar/1.0/javadoc.jar"));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "release jar");

        assert_eq!(f.cache.resolve_file(&release).await.unwrap(), file);
        assert_eq!(f.repo.fetch_count(RELEASE_PATH), 1);
    }

    #[tokio::test]
    async fn test_type_does_not_matter_for_caching() {
        let f = fixture(TransientRepo::new(), Default::default()).await;
        let jar = artifact("1.0", Some("javadoc"));
        let zip = ArtifactIdentifier::with_type("com.foo", "bar", "1.0", Some("javadoc".to_string()), Some("zip".to_string())).unwrap();

        let first = f.cache.resolve_file(&jar).await.unwrap();
        let second = f.cache.resolve_file(&zip).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(f.repo.total_fetch_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_share_one_download() {
        let f = fixture(TransientRepo::with_delay(Duration::from_millis(200)), Default::default()).await;
        let cache = Arc::new(f.cache);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.resolve_file(&artifact("1.0", Some("javadoc"))).await })
            })
            .collect();

        let mut files = Vec::new();
        for handle in handles {
            files.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(f.repo.fetch_count(RELEASE_PATH), 1);
        assert!(files.iter().all(|file| file == &files[0]));
    }

    #[tokio::test]
    async fn test_concurrent_snapshot_requests_share_one_download() {
        let f = fixture(TransientRepo::with_delay(Duration::from_millis(100)), Default::default()).await;
        let snapshot = artifact("2.0-SNAPSHOT", Some("javadoc"));

        let results = futures::future::join_all((0..5).map(|_| f.cache.resolve_file(&snapshot))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(f.repo.fetch_count(SNAPSHOT_METADATA_PATH), 1);
        assert_eq!(f.repo.fetch_count(SNAPSHOT_PATH), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_share_one_failure() {
        let f = fixture(TransientRepo::with_delay(Duration::from_millis(200)), Default::default()).await;
        let cache = Arc::new(f.cache);

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.resolve_file(&artifact("9.9", Some("javadoc"))).await })
            })
            .collect();

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(matches!(result, Err(RepoError::Fetch(FetchError::NotFound(_)))));
        }
        assert_eq!(f.repo.fetch_count("com/foo/bar/9.9/bar-9.9-javadoc.jar"), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let f = fixture(TransientRepo::new(), Default::default()).await;
        let missing = artifact("3.0", Some("javadoc"));

        assert!(f.cache.resolve_file(&missing).await.unwrap_err().is_missing());

        f.repo.put("com/foo/bar/3.0/bar-3.0-javadoc.jar", "late jar");
        let file = f.cache.resolve_file(&missing).await.unwrap();
        assert_eq!(std::fs::read_to_string(file).unwrap(), "late jar");
    }

    #[tokio::test]
    async fn test_access_denied_is_reported() {
        let f = fixture(TransientRepo::new(), Default::default()).await;
        f.repo.deny(RELEASE_PATH);

        let result = f.cache.resolve_file(&artifact("1.0", Some("javadoc"))).await;
        assert!(matches!(result, Err(RepoError::Fetch(FetchError::AccessDenied(_)))));
    }

    #[tokio::test]
    async fn test_snapshot_file_name_from_metadata() {
        let f = fixture(TransientRepo::new(), Default::default()).await;

        let file = f.cache.resolve_file(&artifact("2.0-SNAPSHOT", Some("javadoc"))).await.unwrap();
        assert_eq!(file, f.dir.path().join("storage/com.foo/bar/2.0-SNAPSHOT/javadoc.jar"));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "snapshot jar");
    }

    #[tokio::test]
    async fn test_snapshot_file_name_from_timestamp() {
        let f = fixture(TransientRepo::new(), Default::default()).await;
        f.repo.put("com/foo/bar/2.0-SNAPSHOT/bar-2.0-20240102.030405-7-groovydoc.jar", "groovydoc jar");

        let file = f.cache.resolve_file(&artifact("2.0-SNAPSHOT", Some("groovydoc"))).await.unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "groovydoc jar");
    }

    #[tokio::test]
    async fn test_snapshot_without_metadata_information_uses_release_name() {
        let f = fixture(TransientRepo::new(), Default::default()).await;
        f.repo.put("com/foo/bar/3.0-SNAPSHOT/maven-metadata.xml", "<metadata><versioning/></metadata>");
        f.repo.put("com/foo/bar/3.0-SNAPSHOT/bar-3.0-SNAPSHOT-javadoc.jar", "plain snapshot jar");

        let file = f.cache.resolve_file(&artifact("3.0-SNAPSHOT", Some("javadoc"))).await.unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "plain snapshot jar");
    }

    #[tokio::test]
    async fn test_snapshots_disabled() {
        let settings = ArtifactCacheSettings {
            snapshots_enabled: false,
            ..Default::default()
        };
        let f = fixture(TransientRepo::new(), settings).await;

        let result = f.cache.resolve_file(&artifact("2.0-SNAPSHOT", Some("javadoc"))).await;
        assert!(matches!(result, Err(RepoError::Repository { .. })));
        assert_eq!(f.repo.total_fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_snapshot_file_is_deleted() {
        let f = fixture(TransientRepo::new(), short_ttl()).await;
        let snapshot = artifact("2.0-SNAPSHOT", Some("javadoc"));

        let file = f.cache.resolve_file(&snapshot).await.unwrap();
        assert!(file.exists());

        tokio::time::sleep(Duration::from_millis(400)).await;
        f.cache.run_pending_tasks().await;
        assert!(!file.exists());

        let again = f.cache.resolve_file(&snapshot).await.unwrap();
        assert_eq!(again, file);
        assert!(again.exists());
        assert_eq!(f.repo.fetch_count(SNAPSHOT_PATH), 2);
    }

    #[tokio::test]
    async fn test_refreshed_snapshot_survives_removal_of_expired_entry() {
        let f = fixture(TransientRepo::new(), short_ttl()).await;
        let snapshot = artifact("2.0-SNAPSHOT", Some("javadoc"));

        f.cache.resolve_file(&snapshot).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        let file = f.cache.resolve_file(&snapshot).await.unwrap();
        f.cache.run_pending_tasks().await;

        assert!(file.exists());
        assert_eq!(f.repo.fetch_count(SNAPSHOT_PATH), 2);
    }

    #[tokio::test]
    async fn test_releases_do_not_expire() {
        let f = fixture(TransientRepo::new(), short_ttl()).await;
        let release = artifact("1.0", Some("javadoc"));

        let file = f.cache.resolve_file(&release).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        f.cache.run_pending_tasks().await;

        assert!(file.exists());
        f.cache.resolve_file(&release).await.unwrap();
        assert_eq!(f.repo.fetch_count(RELEASE_PATH), 1);
    }

    #[tokio::test]
    async fn test_snapshots_evicted_for_capacity_are_deleted() {
        let settings = ArtifactCacheSettings {
            capacity: 1,
            ..Default::default()
        };
        let f = fixture(TransientRepo::new(), settings).await;

        let mut files = Vec::new();
        for version in ["4.0-SNAPSHOT", "5.0-SNAPSHOT", "6.0-SNAPSHOT"] {
            f.repo.put(&format!("com/foo/bar/{}/maven-metadata.xml", version), "<metadata/>");
            f.repo.put(&format!("com/foo/bar/{}/bar-{}-javadoc.jar", version, version), "jar");
            files.push(f.cache.resolve_file(&artifact(version, Some("javadoc"))).await.unwrap());
        }
        f.cache.run_pending_tasks().await;

        let remaining = files.iter().filter(|file| file.exists()).count();
        assert!(remaining <= 1);
    }
}
