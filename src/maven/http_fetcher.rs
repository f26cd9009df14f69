use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use hex::FromHex;
use hyper::body::HttpBody;
use hyper::client::HttpConnector;
use hyper::header::USER_AGENT;
use hyper::http::HeaderMap;
use hyper::{Body, Client, Method, Request, Response, StatusCode, Uri};
use hyper_tls::HttpsConnector;
use sha1::{Digest, Sha1};
use tokio::fs::{remove_file, rename, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::error::FetchError;
use crate::maven::remote_repo::RepositoryFetcher;

/// Fetches files relative to a fixed base URI, checking the body's integrity against hashcodes
///  if the response carries them in its headers.
///
/// Instances do HTTP connection caching internally, so keeping them alive has performance benefits.
pub struct HttpRepositoryFetcher {
    client: Client<HttpsConnector<HttpConnector>>,
    base_uri: String, // with trailing '/'
    timeout: Duration,
}

impl HttpRepositoryFetcher {
    pub fn new(base_uri: &str, timeout: Duration) -> anyhow::Result<HttpRepositoryFetcher> {
        let mut base_uri = base_uri.to_string();
        if !base_uri.ends_with('/') {
            base_uri.push('/');
        }

        // check that the base URI is valid
        Uri::try_from(base_uri.clone())?;

        Ok(HttpRepositoryFetcher {
            client: Client::builder()
                .build::<_, Body>(HttpsConnector::new()),
            base_uri,
            timeout,
        })
    }

    async fn request(&self, method: Method, remote_path: &str) -> Result<Response<Body>, FetchError> {
        let uri = format!("{}{}", self.base_uri, remote_path.trim_start_matches('/'));
        let uri = Uri::try_from(uri.as_str())
            .map_err(|e| FetchError::TransferFailed(format!("invalid URI {}: {}", uri, e)))?;

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_AGENT, concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .body(Body::empty())
            .map_err(|e| FetchError::TransferFailed(e.to_string()))?;

        trace!("requesting {:?}", request);

        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(FetchError::Connection(format!("{}: {}", remote_path, e))),
            Err(_) => Err(FetchError::Connection(format!("{}: no response after {:?}", remote_path, self.timeout))),
        }
    }

    fn check_status(status: StatusCode, remote_path: &str) -> Result<(), FetchError> {
        if status.is_success() {
            return Ok(());
        }
        let message = format!("{} (status {})", remote_path, status);
        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(FetchError::NotFound(message)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::AccessDenied(message)),
            _ => Err(FetchError::TransferFailed(message)),
        }
    }

    /// `idle_timeout` applies to every chunk, a body that stops arriving is a connection failure
    async fn write_body(mut body: Body, file_path: &Path, mut checksums: ExpectedChecksums, idle_timeout: Duration) -> Result<(), FetchError> {
        let mut file = File::create(file_path)
            .await
            .map_err(|e| FetchError::TransferFailed(format!("cannot create {}: {}", file_path.display(), e)))?;

        loop {
            let chunk = match tokio::time::timeout(idle_timeout, body.data()).await {
                Ok(Some(chunk)) => chunk.map_err(|e| FetchError::TransferFailed(e.to_string()))?,
                Ok(None) => break,
                Err(_) => {
                    return Err(FetchError::Connection(format!("no data received for {:?} while downloading to {}", idle_timeout, file_path.display())));
                }
            };
            checksums.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::TransferFailed(format!("cannot write {}: {}", file_path.display(), e)))?;
        }
        file.flush()
            .await
            .map_err(|e| FetchError::TransferFailed(format!("cannot write {}: {}", file_path.display(), e)))?;

        checksums.verify()
    }
}

#[async_trait]
impl RepositoryFetcher for HttpRepositoryFetcher {
    async fn fetch(&self, remote_path: &str, destination: &Path) -> Result<(), FetchError> {
        let response = self.request(Method::GET, remote_path).await?;
        Self::check_status(response.status(), remote_path)?;

        let checksums = ExpectedChecksums::from_headers(response.headers());

        // the body goes to a uniquely named file next to the destination, which is renamed once
        //  the download is complete and verified
        let partial = partial_path(destination);
        let result = match Self::write_body(response.into_body(), &partial, checksums, self.timeout).await {
            Ok(()) => rename(&partial, destination)
                .await
                .map_err(|e| FetchError::TransferFailed(format!("cannot move download to {}: {}", destination.display(), e))),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            debug!("download of {} failed: {}", remote_path, e);
            match remove_file(&partial).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    error!("error cleaning up partial download {}: {}", partial.display(), e);
                }
            }
        }
        result
    }

    async fn exists(&self, remote_path: &str) -> Result<bool, FetchError> {
        let response = self.request(Method::HEAD, remote_path).await?;
        match Self::check_status(response.status(), remote_path) {
            Ok(()) => Ok(true),
            Err(FetchError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut file_name = destination.file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    file_name.push(format!(".{}.part", Uuid::new_v4().as_hyphenated()));
    destination.with_file_name(file_name)
}

/// Hashes advertised by the repository for a response body, verified once the body is complete
struct ExpectedChecksums {
    sha1: Option<([u8; 20], Sha1)>,
    md5: Option<([u8; 16], md5::Context)>,
}

impl ExpectedChecksums {
    fn from_headers(headers: &HeaderMap) -> ExpectedChecksums {
        let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());

        let sha1 = header("x-checksum-sha1")
            .or_else(|| header("x-goog-meta-checksum-sha1"))
            .or_else(|| header("etag").map(|s| s.trim_matches('"')))
            .and_then(|s| <[u8; 20]>::from_hex(s).ok());

        let md5 = header("x-checksum-md5")
            .or_else(|| header("x-goog-meta-checksum-md5"))
            .and_then(|s| <[u8; 16]>::from_hex(s).ok());

        ExpectedChecksums {
            sha1: sha1.map(|expected| (expected, Sha1::new())),
            md5: md5.map(|expected| (expected, md5::Context::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        if let Some((_, hasher)) = &mut self.sha1 {
            hasher.update(data);
        }
        if let Some((_, context)) = &mut self.md5 {
            context.consume(data);
        }
    }

    fn verify(self) -> Result<(), FetchError> {
        if let Some((expected, hasher)) = self.sha1 {
            trace!("validating SHA1 hash");
            if hasher.finalize().as_slice() != expected {
                return Err(FetchError::TransferFailed("SHA1 checksum mismatch".to_string()));
            }
        }
        if let Some((expected, context)) = self.md5 {
            trace!("validating MD5 hash");
            let actual = context.compute().0;
            if actual != expected {
                return Err(FetchError::TransferFailed("MD5 checksum mismatch".to_string()));
            }
        }
        Ok(())
    }
}
