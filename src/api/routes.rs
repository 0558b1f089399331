//! REST handlers for the control API

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::server::AppState;
use crate::camera::{CameraHealthState, FallbackRecord, RuntimeApparatusState};
use crate::config::ShowConfig;
use crate::error::{Error, ErrorCategory, ShowrunnerErrorTrait};
use crate::metrics;
use crate::runtime::ShowSummary;
use crate::scheduler::{EngineSnapshot, HistoryEntry, OverrideEntry};

const DEFAULT_ACTOR: &str = "operator";

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
}

/// Handler error mapped to a status code by category
#[derive(Debug)]
pub struct ApiError(pub Error);

impl<E: Into<Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.category() {
            ErrorCategory::Operator => StatusCode::CONFLICT,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Config => StatusCode::BAD_REQUEST,
            ErrorCategory::Network => StatusCode::BAD_GATEWAY,
            ErrorCategory::Storage | ErrorCategory::Other => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0, "Request failed");
        }

        let body = ErrorResponse {
            success: false,
            error: self.0.to_string(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub shows: usize,
}

/// One camera's configuration, health, coverage and active fallback
#[derive(Debug, Serialize)]
pub struct CameraView {
    pub id: String,
    pub name: String,
    pub health: Option<CameraHealthState>,
    pub runtime: Option<RuntimeApparatusState>,
    pub fallback: Option<FallbackRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActorQuery {
    pub actor: Option<String>,
}

impl ActorQuery {
    fn actor(&self) -> &str {
        self.actor.as_deref().unwrap_or(DEFAULT_ACTOR)
    }
}

#[derive(Debug, Deserialize)]
pub struct GotoRequest {
    pub segment_id: String,
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RehearsalRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub apparatus: Vec<String>,
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchFallbackRequest {
    pub fallback_camera_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearFallbackQuery {
    /// Put the original camera back on air
    #[serde(default)]
    pub switch_back: bool,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_text))
        // Show endpoints
        .route("/api/shows", get(list_shows).post(load_show))
        .route("/api/shows/{id}", get(get_show).delete(remove_show))
        .route("/api/shows/{id}/config", put(update_config))
        .route("/api/shows/{id}/state", get(get_state))
        .route("/api/shows/{id}/history", get(get_history))
        .route("/api/shows/{id}/overrides", get(get_overrides))
        .route("/api/shows/{id}/rehearsal", post(set_rehearsal))
        // Run-of-show control
        .route("/api/shows/{id}/start", post(start_show))
        .route("/api/shows/{id}/stop", post(stop_show))
        .route("/api/shows/{id}/pause", post(pause_show))
        .route("/api/shows/{id}/resume", post(resume_show))
        .route("/api/shows/{id}/advance", post(advance))
        .route("/api/shows/{id}/previous", post(previous))
        .route("/api/shows/{id}/goto", post(go_to_segment))
        // Camera endpoints
        .route("/api/shows/{id}/cameras", get(list_cameras))
        .route("/api/shows/{id}/cameras/{camera}/verify", post(verify_camera))
        .route("/api/shows/{id}/cameras/{camera}/unverify", post(unverify_camera))
        .route("/api/shows/{id}/cameras/{camera}/reassign", post(reassign_camera))
        .route("/api/shows/{id}/cameras/{camera}/reset", post(reset_camera))
        .route("/api/shows/{id}/cameras/{camera}/fallback", post(switch_fallback))
        // Fallback endpoints
        .route(
            "/api/shows/{id}/fallbacks",
            get(list_fallbacks).delete(clear_fallbacks),
        )
        .route("/api/shows/{id}/fallbacks/{camera}", axum::routing::delete(clear_fallback))
        .route_layer(axum::middleware::from_fn(track_requests))
        .with_state(state)
}

/// Record request count and latency per matched route
async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<axum::extract::MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    metrics::record_api_request(
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

// ============================================================================
// Health Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        shows: state.registry.list().await.len(),
    }))
}

async fn metrics_text() -> Response {
    match metrics::encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => ApiError(Error::other(format!("Failed to encode metrics: {e}"))).into_response(),
    }
}

// ============================================================================
// Show Handlers
// ============================================================================

async fn list_shows(State(state): State<AppState>) -> ApiResult<Vec<ShowSummary>> {
    ok(state.registry.list().await)
}

async fn load_show(
    State(state): State<AppState>,
    Json(show): Json<ShowConfig>,
) -> ApiResult<ShowSummary> {
    let runtime = state.registry.load(show).await?;
    ok(runtime.summary().await)
}

async fn get_show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ShowSummary> {
    let show = state.registry.get(&id).await?;
    ok(show.summary().await)
}

async fn remove_show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<String> {
    state.registry.remove(&id).await?;
    ok(format!("Show {id} unloaded"))
}

async fn update_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(config): Json<ShowConfig>,
) -> ApiResult<EngineSnapshot> {
    let show = state.registry.get(&id).await?;
    show.update_config(config).await?;
    ok(show.scheduler().get_state().await)
}

async fn get_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<EngineSnapshot> {
    let show = state.registry.get(&id).await?;
    ok(show.scheduler().get_state().await)
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<HistoryEntry>> {
    let show = state.registry.get(&id).await?;
    ok(show.scheduler().history().await)
}

async fn get_overrides(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<OverrideEntry>> {
    let show = state.registry.get(&id).await?;
    ok(show.scheduler().override_log().await)
}

async fn set_rehearsal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RehearsalRequest>,
) -> ApiResult<EngineSnapshot> {
    let show = state.registry.get(&id).await?;
    show.scheduler().set_rehearsal(request.enabled).await;
    ok(show.scheduler().get_state().await)
}

// ============================================================================
// Run-of-show Handlers
// ============================================================================

async fn start_show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<EngineSnapshot> {
    let show = state.registry.get(&id).await?;
    show.start_show().await?;
    ok(show.scheduler().get_state().await)
}

async fn stop_show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ActorQuery>,
) -> ApiResult<EngineSnapshot> {
    let show = state.registry.get(&id).await?;
    show.scheduler().stop(query.actor()).await?;
    ok(show.scheduler().get_state().await)
}

async fn pause_show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ActorQuery>,
) -> ApiResult<EngineSnapshot> {
    let show = state.registry.get(&id).await?;
    show.scheduler().pause(query.actor()).await?;
    ok(show.scheduler().get_state().await)
}

async fn resume_show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ActorQuery>,
) -> ApiResult<EngineSnapshot> {
    let show = state.registry.get(&id).await?;
    show.scheduler().resume(query.actor()).await?;
    ok(show.scheduler().get_state().await)
}

async fn advance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ActorQuery>,
) -> ApiResult<EngineSnapshot> {
    let show = state.registry.get(&id).await?;
    show.scheduler().advance(query.actor()).await?;
    ok(show.scheduler().get_state().await)
}

async fn previous(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ActorQuery>,
) -> ApiResult<EngineSnapshot> {
    let show = state.registry.get(&id).await?;
    show.scheduler().previous(query.actor()).await?;
    ok(show.scheduler().get_state().await)
}

async fn go_to_segment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<GotoRequest>,
) -> ApiResult<EngineSnapshot> {
    let show = state.registry.get(&id).await?;
    let actor = request.actor.as_deref().unwrap_or(DEFAULT_ACTOR);
    show.scheduler().go_to_segment(&request.segment_id, actor).await?;
    ok(show.scheduler().get_state().await)
}

// ============================================================================
// Camera Handlers
// ============================================================================

async fn list_cameras(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<CameraView>> {
    let show = state.registry.get(&id).await?;
    let config = show.scheduler().show_config().await;

    let mut cameras = Vec::with_capacity(config.cameras.len());
    for camera in config.cameras {
        cameras.push(CameraView {
            health: show.health().get_camera_health(&camera.id).await,
            runtime: show.cameras().get_state(&camera.id).await,
            fallback: show.fallback().get_fallback(&camera.id).await,
            id: camera.id,
            name: camera.name,
        });
    }
    ok(cameras)
}

async fn verify_camera(
    State(state): State<AppState>,
    Path((id, camera)): Path<(String, String)>,
    Query(query): Query<ActorQuery>,
) -> ApiResult<RuntimeApparatusState> {
    let show = state.registry.get(&id).await?;
    ok(show.cameras().verify_camera(&camera, query.actor()).await?)
}

async fn unverify_camera(
    State(state): State<AppState>,
    Path((id, camera)): Path<(String, String)>,
) -> ApiResult<RuntimeApparatusState> {
    let show = state.registry.get(&id).await?;
    ok(show.cameras().unverify_camera(&camera).await?)
}

async fn reassign_camera(
    State(state): State<AppState>,
    Path((id, camera)): Path<(String, String)>,
    Json(request): Json<ReassignRequest>,
) -> ApiResult<RuntimeApparatusState> {
    let show = state.registry.get(&id).await?;
    let actor = request.actor.as_deref().unwrap_or(DEFAULT_ACTOR);
    ok(show
        .cameras()
        .reassign_apparatus(&camera, request.apparatus, actor)
        .await?)
}

async fn reset_camera(
    State(state): State<AppState>,
    Path((id, camera)): Path<(String, String)>,
    Query(query): Query<ActorQuery>,
) -> ApiResult<RuntimeApparatusState> {
    let show = state.registry.get(&id).await?;
    ok(show.cameras().reset_to_expected(&camera, query.actor()).await?)
}

async fn switch_fallback(
    State(state): State<AppState>,
    Path((id, camera)): Path<(String, String)>,
    Json(request): Json<SwitchFallbackRequest>,
) -> ApiResult<Option<FallbackRecord>> {
    let show = state.registry.get(&id).await?;
    let reason = request.reason.as_deref().unwrap_or("operator substitution");
    show.fallback()
        .switch_to_fallback(&camera, &request.fallback_camera_id, reason)
        .await?;
    ok(show.fallback().get_fallback(&camera).await)
}

// ============================================================================
// Fallback Handlers
// ============================================================================

async fn list_fallbacks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<FallbackRecord>> {
    let show = state.registry.get(&id).await?;
    ok(show.fallback().active_fallbacks().await)
}

async fn clear_fallbacks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<usize> {
    let show = state.registry.get(&id).await?;
    ok(show.fallback().clear_all_fallbacks().await)
}

async fn clear_fallback(
    State(state): State<AppState>,
    Path((id, camera)): Path<(String, String)>,
    Query(query): Query<ClearFallbackQuery>,
) -> ApiResult<Option<FallbackRecord>> {
    let show = state.registry.get(&id).await?;
    ok(show.fallback().clear_fallback(&camera, query.switch_back).await)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::{CameraConfig, Segment, SegmentType};
    use crate::runtime::ShowRegistry;
    use crate::switcher::{MemoryConnector, PoolConfig, SwitcherConnectionPool};
    use axum::body::{to_bytes, Body};
    use axum::http::Method;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        let pool =
            SwitcherConnectionPool::new(PoolConfig::default(), Arc::new(MemoryConnector::new()));
        let registry = Arc::new(ShowRegistry::with_pool(AppConfig::default(), pool));
        registry
            .load(
                ShowConfig::new("finals")
                    .with_segments(vec![
                        Segment::new("open", "Open", SegmentType::Live).with_duration(60),
                        Segment::new("close", "Close", SegmentType::Live).with_duration(60),
                    ])
                    .with_cameras(vec![CameraConfig::new("cam1", "Cam 1", "k1")]),
            )
            .await
            .unwrap();

        create_router(AppState::new(registry))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("test data");
        assert!(response.success);
        assert!(response.data.is_some());
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = app().await;
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["shows"], 1);
    }

    #[tokio::test]
    async fn test_unknown_show_is_404() {
        let app = app().await;
        let (status, body) = call(&app, Method::GET, "/api/shows/heats/state", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "show_not_found");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_run_of_show_control() {
        let app = app().await;

        let (status, body) = call(&app, Method::POST, "/api/shows/finals/start", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["current_segment"]["id"], "open");

        let (status, body) =
            call(&app, Method::POST, "/api/shows/finals/advance?actor=td", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["current_segment"]["id"], "close");

        let (status, body) = call(&app, Method::POST, "/api/shows/finals/advance", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "at_last_segment");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/shows/finals/goto",
            Some(serde_json::json!({ "segment_id": "missing" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "segment_not_found");

        let (_, body) = call(&app, Method::GET, "/api/shows/finals/overrides", None).await;
        let overrides = body["data"].as_array().unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0]["actor"], "td");
    }

    #[tokio::test]
    async fn test_camera_endpoints() {
        let app = app().await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/shows/finals/cameras/cam1/verify?actor=producer",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["verified_by"], "producer");

        let (status, _) =
            call(&app, Method::POST, "/api/shows/finals/cameras/cam9/verify", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&app, Method::GET, "/api/shows/finals/cameras", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["runtime"]["verified"], true);
    }
}
