use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::content::{
    ContentAccessService, ContentError, ContentFile, ContentKind, ContentResult, ConversionError,
    Resolution,
};

use super::metrics::{self, metrics_handler, record_feature_fallback, record_resolution};
use super::serve_file::{serve_file, ByteRange};
use super::state::{GuardedContentService, ServerState};
use super::{http_cache, log_requests, RequestsLoggingLevel, ServerConfig};
use std::future::IntoFuture;
use std::sync::Arc;

impl IntoResponse for ContentError {
    fn into_response(self) -> Response {
        let status = match &self {
            ContentError::NotFound(_) => StatusCode::NOT_FOUND,
            ContentError::Unimplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ContentError::Transcode(ConversionError::UnsupportedFormat(_)) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Content request failed: {}", self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

fn error_outcome(err: &ContentError) -> &'static str {
    match err {
        ContentError::NotFound(_) => "not_found",
        ContentError::Unimplemented(_) => "unimplemented",
        _ => "error",
    }
}

async fn respond_with_file(
    kind: ContentKind,
    result: ContentResult<ContentFile>,
    byte_range: Option<ByteRange>,
) -> Response {
    match result {
        Ok(file) => {
            record_resolution(kind.as_str(), file.resolution.as_str());
            serve_file(&file, byte_range).await
        }
        Err(err) => {
            record_resolution(kind.as_str(), error_outcome(&err));
            err.into_response()
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    mode: String,
    content_root: String,
    cdn_url: String,
}

async fn health(State(content): State<GuardedContentService>) -> impl IntoResponse {
    let settings = content.settings();
    Json(HealthResponse {
        status: "healthy",
        mode: settings.mode.to_string(),
        content_root: settings.content_root.display().to_string(),
        cdn_url: settings.cdn_url.clone(),
    })
}

#[derive(Deserialize)]
struct AudioQuery {
    format: Option<String>,
    sample_rate: Option<u32>,
}

async fn get_audio(
    byte_range: Option<ByteRange>,
    State(content): State<GuardedContentService>,
    Path((category, species, filename)): Path<(String, String, String)>,
    Query(query): Query<AudioQuery>,
) -> Response {
    // Blank parameters request no transform.
    let format = query.format.as_deref().filter(|f| !f.is_empty());
    let sample_rate = query.sample_rate.filter(|rate| *rate != 0);
    let result = content
        .get_audio(&category, &species, &filename, format, sample_rate)
        .await;
    respond_with_file(ContentKind::Audio, result, byte_range).await
}

#[derive(Deserialize)]
struct IconQuery {
    size: Option<String>,
}

async fn get_icon(
    byte_range: Option<ByteRange>,
    State(content): State<GuardedContentService>,
    Path((category, name)): Path<(String, String)>,
    Query(query): Query<IconQuery>,
) -> Response {
    let result = content
        .get_icon(&category, &name, query.size.as_deref())
        .await;
    respond_with_file(ContentKind::Icon, result, byte_range).await
}

#[derive(Deserialize)]
struct ResearchQuery {
    extract: Option<String>,
}

async fn get_research_paper(
    byte_range: Option<ByteRange>,
    State(content): State<GuardedContentService>,
    Path((category, paper_id)): Path<(String, String)>,
    Query(query): Query<ResearchQuery>,
) -> Response {
    let result = content
        .get_research_paper(&category, &paper_id, query.extract.as_deref())
        .await;
    respond_with_file(ContentKind::Document, result, byte_range).await
}

async fn get_features(
    State(content): State<GuardedContentService>,
    Path(audio_id): Path<String>,
) -> Response {
    let kind = ContentKind::Features.as_str();
    match content.get_features(&audio_id).await {
        Ok(resolved) => {
            record_resolution(kind, resolved.resolution.as_str());
            if resolved.resolution == Resolution::Fallback {
                record_feature_fallback();
            }
            Json(resolved.response).into_response()
        }
        Err(err) => {
            record_resolution(kind, error_outcome(&err));
            err.into_response()
        }
    }
}

async fn get_audio_index(State(content): State<GuardedContentService>) -> Response {
    match content.load_audio_index().await {
        Ok(index) => Json(index).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_audio_ids(State(content): State<GuardedContentService>) -> Response {
    match content.audio_ids().await {
        Ok(ids) => Json(ids).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_manifest(State(content): State<GuardedContentService>) -> Response {
    match content.content_registry().await {
        Ok(manifest) => Json(manifest).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn make_app(config: ServerConfig, content: GuardedContentService) -> Router {
    let static_files_service = ServeDir::new(content.content_root().path());
    let state = ServerState::new(config.clone(), content);

    let content_routes: Router = Router::new()
        .route("/audio/index", get(get_audio_index))
        .route("/audio/ids", get(get_audio_ids))
        .route("/audio/{category}/{species}/{filename}", get(get_audio))
        .route("/icons/{category}/{name}", get(get_icon))
        .route("/research/{category}/{paper_id}", get(get_research_paper))
        .route("/ml/features/{audio_id}", get(get_features))
        .route("/manifest", get(get_manifest))
        .layer(middleware::from_fn_with_state(
            config.content_cache_age_sec,
            http_cache,
        ))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health))
        .with_state(state.clone())
        .nest("/api", content_routes)
        .nest_service("/static", static_files_service)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

pub async fn run_server(
    content: ContentAccessService,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    metrics_port: u16,
    content_cache_age_sec: usize,
) -> Result<()> {
    let config = ServerConfig {
        requests_logging_level,
        port,
        metrics_port,
        content_cache_age_sec,
    };
    metrics::init_metrics();
    let app = make_app(config, Arc::new(content));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    let metrics_listener =
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    tokio::select! {
        result = axum::serve(listener, app).into_future() => Ok(result?),
        result = axum::serve(metrics_listener, make_metrics_app()).into_future() => Ok(result?),
    }
}
