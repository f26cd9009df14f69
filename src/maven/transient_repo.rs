use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::maven::remote_repo::RepositoryFetcher;

/// in-memory repository, neither optimized nor particularly robust - for testing purposes
pub struct TransientRepo {
    files: Mutex<HashMap<String, Vec<u8>>>,
    denied: Mutex<Vec<String>>,
    fetches: Mutex<HashMap<String, usize>>,
    delay: Duration,
}

impl TransientRepo {
    pub fn new() -> TransientRepo {
        Self::with_delay(Duration::ZERO)
    }

    /// every fetch takes at least `delay`, which makes concurrent requests overlap
    pub fn with_delay(delay: Duration) -> TransientRepo {
        TransientRepo {
            files: Default::default(),
            denied: Default::default(),
            fetches: Default::default(),
            delay,
        }
    }

    pub fn put(&self, path: &str, data: impl Into<Vec<u8>>) {
        self.files.lock().unwrap().insert(path.to_string(), data.into());
    }

    pub fn deny(&self, path: &str) {
        self.denied.lock().unwrap().push(path.to_string());
    }

    pub fn fetch_count(&self, path: &str) -> usize {
        self.fetches.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl RepositoryFetcher for TransientRepo {
    async fn fetch(&self, remote_path: &str, destination: &Path) -> Result<(), FetchError> {
        *self.fetches.lock().unwrap()
            .entry(remote_path.to_string())
            .or_default() += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.denied.lock().unwrap().iter().any(|p| p == remote_path) {
            return Err(FetchError::AccessDenied(remote_path.to_string()));
        }

        let data = self.files.lock().unwrap().get(remote_path).cloned();
        match data {
            Some(data) => tokio::fs::write(destination, data)
                .await
                .map_err(|e| FetchError::TransferFailed(e.to_string())),
            None => Err(FetchError::NotFound(remote_path.to_string())),
        }
    }

    async fn exists(&self, remote_path: &str) -> Result<bool, FetchError> {
        if self.denied.lock().unwrap().iter().any(|p| p == remote_path) {
            return Err(FetchError::AccessDenied(remote_path.to_string()));
        }
        Ok(self.files.lock().unwrap().contains_key(remote_path))
    }
}
