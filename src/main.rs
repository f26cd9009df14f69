use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::StreamBody;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router, Server};
use clap::Parser;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use apidoc_vault::config::{DocServerConfig, DEFAULT_CLASSIFIER, DEFAULT_NAME, DEFAULT_REPOSITORY_URL};
use apidoc_vault::error::RepoError;
use apidoc_vault::maven::http_fetcher::HttpRepositoryFetcher;
use apidoc_vault::service::DocRepository;

/// Serves documentation jars (javadoc, scaladoc, ...) straight out of a Maven repository
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, env = "APIDOC_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    #[arg(long, env = "APIDOC_NAME", default_value = DEFAULT_NAME)]
    name: String,

    #[arg(long, env = "APIDOC_REPOSITORY_URL", default_value = DEFAULT_REPOSITORY_URL)]
    repository_url: String,

    #[arg(long, env = "APIDOC_DEFAULT_CLASSIFIER", default_value = DEFAULT_CLASSIFIER)]
    default_classifier: String,

    /// Classifiers to look for when listing what is available for a version
    #[arg(long, env = "APIDOC_CLASSIFIERS", value_delimiter = ',', default_value = DEFAULT_CLASSIFIER)]
    classifiers: Vec<String>,

    #[arg(long, env = "APIDOC_SNAPSHOTS_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    snapshots_enabled: bool,

    /// Seconds until a cached snapshot (or the resolved 'latest' version) is refreshed
    #[arg(long, env = "APIDOC_SNAPSHOT_CACHE_TIMEOUT", default_value_t = 1800)]
    snapshot_cache_timeout: u64,

    #[arg(long, env = "APIDOC_CACHE_CAPACITY", default_value_t = 1000)]
    cache_capacity: u64,

    /// Where downloaded jars are kept (defaults to a fresh directory in the system's temp dir)
    #[arg(long, env = "APIDOC_LOCAL_STORAGE")]
    local_storage: Option<PathBuf>,

    #[arg(long, env = "APIDOC_METADATA_TEMP_DIR")]
    metadata_temp_dir: Option<PathBuf>,

    /// Seconds
    #[arg(long, env = "APIDOC_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,
}

impl From<Args> for DocServerConfig {
    fn from(args: Args) -> Self {
        DocServerConfig {
            name: args.name,
            repository_url: args.repository_url,
            default_classifier: args.default_classifier,
            classifiers: args.classifiers,
            snapshots_enabled: args.snapshots_enabled,
            snapshot_cache_timeout: Duration::from_secs(args.snapshot_cache_timeout),
            cache_capacity: args.cache_capacity,
            local_storage: args.local_storage,
            metadata_temp_dir: args.metadata_temp_dir,
            fetch_timeout: Duration::from_secs(args.fetch_timeout),
        }
    }
}

type AppState = Arc<DocRepository>;

/// `RUST_LOG` style directives if they are set and valid, `info` otherwise
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .init();

    let listen = args.listen;
    let config = DocServerConfig::from(args);

    let fetcher = Arc::new(HttpRepositoryFetcher::new(&config.repository_url, config.fetch_timeout)?);
    let repository = Arc::new(DocRepository::new(&config, fetcher).await?);
    info!("serving documentation from {}", config.repository_url);

    let app = Router::new()
        .route("/", get(root))
        .route("/:group/:artifact", get(versions))
        .route("/:group/:artifact/:version", get(version_details))
        .route("/:group/:artifact/:version/:classifier", get(documentation_root))
        .route("/:group/:artifact/:version/:classifier/*path", get(documentation_file))
        .layer(TraceLayer::new_for_http())
        .with_state(repository);

    info!("listening on {}", listen);
    Server::bind(&listen)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

struct ApiError(RepoError);

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RepoError::InvalidCoordinate(_) => StatusCode::BAD_REQUEST,
            e if e.is_missing() => StatusCode::NOT_FOUND,
            e => {
                error!("request failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.0.to_string()).into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfo {
    name: String,
    repository_url: String,
    default_classifier: String,
}

#[derive(Serialize)]
struct VersionDetails {
    group: String,
    artifact: String,
    version: String,
    classifiers: Vec<String>,
}

async fn root(State(repository): State<AppState>) -> Json<ServerInfo> {
    Json(ServerInfo {
        name: repository.name().to_string(),
        repository_url: repository.repository_url().to_string(),
        default_classifier: repository.default_classifier().to_string(),
    })
}

async fn versions(
    State(repository): State<AppState>,
    Path((group, artifact)): Path<(String, String)>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(repository.list_available_versions(&group, &artifact).await?))
}

async fn version_details(
    State(repository): State<AppState>,
    Path((group, artifact, version)): Path<(String, String, String)>,
) -> Result<Json<VersionDetails>, ApiError> {
    let resolved = repository.resolve_coordinate(&group, &artifact, &version, None).await?;
    let classifiers = repository.available_classifiers(&group, &artifact, resolved.version()).await?;
    Ok(Json(VersionDetails {
        version: resolved.version().to_string(),
        group,
        artifact,
        classifiers,
    }))
}

async fn documentation_root(
    Path((group, artifact, version, classifier)): Path<(String, String, String, String)>,
) -> Redirect {
    Redirect::to(&format!("/{}/{}/{}/{}/index.html", group, artifact, version, classifier))
}

async fn documentation_file(
    State(repository): State<AppState>,
    Path((group, artifact, version, classifier, path)): Path<(String, String, String, String, String)>,
) -> Result<Response, ApiError> {
    let file = repository.retrieve_file(&group, &artifact, &version, Some(&classifier)).await?;
    let content = repository.serve_sub_path(&file, &path).await?;

    Ok((
        [
            (header::CONTENT_TYPE, content.content_type),
            (header::CONTENT_LENGTH, content.length.to_string()),
        ],
        StreamBody::new(content.data),
    ).into_response())
}
