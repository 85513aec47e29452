use crate::backend::SearchBackend;
use crate::listing::{list_docs, DocEntry};
use crate::service::{SearchResult, SearchService, ServiceState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// ========== Request/Response Types ==========

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub index: ServiceState,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub details: String,
}

// ========== State ==========

pub struct AppState<B> {
    pub service: Arc<SearchService<B>>,
    pub docs_dir: PathBuf,
    pub extension: String,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            docs_dir: self.docs_dir.clone(),
            extension: self.extension.clone(),
        }
    }
}

impl<B> AppState<B> {
    pub fn new(
        service: Arc<SearchService<B>>,
        docs_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            service,
            docs_dir: docs_dir.into(),
            extension: extension.into(),
        }
    }
}

// ========== Error Handling ==========

struct AppError {
    error: &'static str,
    source: anyhow::Error,
}

impl AppError {
    fn new(error: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self {
            error,
            source: source.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let details = self.source.to_string();
        tracing::error!("API error: {}: {}", self.error, details);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: self.error,
                details,
            }),
        )
            .into_response()
    }
}

// ========== Handlers ==========

async fn health_check<B: SearchBackend>(State(state): State<AppState<B>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        index: state.service.state(),
    })
}

async fn search_documents<B: SearchBackend>(
    State(state): State<AppState<B>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = params.q.unwrap_or_default();
    let results = state
        .service
        .query(&query)
        .await
        .map_err(|err| AppError::new("Search failed", err))?;

    Ok(Json(SearchResponse { results }))
}

async fn list_documents<B: SearchBackend>(
    State(state): State<AppState<B>>,
) -> Result<Json<Vec<DocEntry>>, AppError> {
    let AppState {
        docs_dir, extension, ..
    } = state;
    let entries = tokio::task::spawn_blocking(move || list_docs(&docs_dir, &extension))
        .await
        .map_err(|err| AppError::new("Failed to load docs", err))?
        .map_err(|err| AppError::new("Failed to load docs", err))?;

    Ok(Json(entries))
}

// ========== Router ==========

pub fn create_router<B: SearchBackend>(state: AppState<B>) -> Router {
    Router::new()
        .route("/health", get(health_check::<B>))
        .route("/api/search", get(search_documents::<B>))
        .route("/api/docs", get(list_documents::<B>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn site() -> anyhow::Result<TempDir> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("docs"))?;
        fs::write(
            dir.path().join("docs/getting-started.mdx"),
            "---\ntitle: Getting Started\ndescription: First steps\n---\nThe quick brown fox\n",
        )?;
        fs::write(
            dir.path().join("docs/api-reference.mdx"),
            "---\ntitle: API Reference\n---\nEndpoints and parameters\n",
        )?;
        Ok(dir)
    }

    fn router(
        content: &std::path::Path,
    ) -> anyhow::Result<(Router, Arc<SearchService<LocalBackend>>)> {
        let service = Arc::new(SearchService::new(LocalBackend::in_memory()?, content));
        let state = AppState::new(Arc::clone(&service), content.join("docs"), "mdx");
        Ok((create_router(state), service))
    }

    async fn get_json(app: Router, uri: &str) -> anyhow::Result<(StatusCode, Value)> {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty())?)
            .await?;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&body)?))
    }

    #[tokio::test]
    async fn test_search_endpoint() -> anyhow::Result<()> {
        let dir = site()?;
        let (app, _) = router(dir.path())?;

        let (status, body) = get_json(app, "/api/search?q=quick%20fox").await?;
        assert_eq!(status, StatusCode::OK);

        let results = body["results"].as_array().cloned().unwrap_or_default();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["slug"], "/docs/getting-started");
        assert_eq!(results[0]["description"], "First steps");
        assert!(results[0]["snippet"]
            .as_str()
            .unwrap_or_default()
            .contains("<mark>quick</mark>"));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_query_does_not_initialize() -> anyhow::Result<()> {
        let dir = site()?;
        let (app, service) = router(dir.path())?;

        let (status, body) = get_json(app.clone(), "/api/search").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "results": [] }));

        let (_, body) = get_json(app, "/api/search?q=").await?;
        assert_eq!(body, serde_json::json!({ "results": [] }));
        assert_eq!(service.state(), ServiceState::Uninitialized);
        Ok(())
    }

    #[tokio::test]
    async fn test_search_failure_is_500() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (app, _) = router(&dir.path().join("missing"))?;

        let (status, body) = get_json(app, "/api/search?q=anything").await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Search failed");
        assert!(body["details"]
            .as_str()
            .unwrap_or_default()
            .contains("initialization failed"));
        Ok(())
    }

    #[tokio::test]
    async fn test_docs_endpoint() -> anyhow::Result<()> {
        let dir = site()?;
        let (app, _) = router(dir.path())?;

        let (status, body) = get_json(app, "/api/docs").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!([
                { "slug": "api-reference", "title": "api reference" },
                { "slug": "getting-started", "title": "getting started" },
            ])
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_docs_endpoint_missing_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (app, _) = router(dir.path())?;

        let (status, body) = get_json(app, "/api/docs").await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to load docs");
        Ok(())
    }

    #[tokio::test]
    async fn test_health_reports_state() -> anyhow::Result<()> {
        let dir = site()?;
        let (app, service) = router(dir.path())?;

        let (_, body) = get_json(app.clone(), "/health").await?;
        assert_eq!(body, serde_json::json!({ "status": "ok", "index": "uninitialized" }));

        service.ensure_ready().await?;
        let (_, body) = get_json(app, "/health").await?;
        assert_eq!(body["index"], "ready");
        Ok(())
    }
}
