// ATM Siting - Web Server
// REST API with Axum + background refresher

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use atm_siting::{
    init_logging, AnalyzerConfig, AtmError, AtmRecord, AtmService, AtmStore, CandidateLocation,
    Config, HeuristicPredictor, JsonFileStore, PeriodicRefresher, RefresherConfig, VERSION,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared application state
#[derive(Clone)]
struct AppState {
    service: Arc<AtmService>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Map a library error onto an HTTP status for this one request
fn error_response(e: AtmError) -> Response {
    let status = match &e {
        AtmError::InvalidRecord { .. } | AtmError::MissingIdentity | AtmError::InvalidCandidate(_) => {
            StatusCode::BAD_REQUEST
        }
        AtmError::UnknownAtm(_) => StatusCode::NOT_FOUND,
        AtmError::PredictorNotTrained => StatusCode::SERVICE_UNAVAILABLE,
        AtmError::Storage(_) | AtmError::Serialization(_) | AtmError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status.is_server_error() {
        error!(error = %e, "Request failed");
    } else {
        warn!(error = %e, "Request rejected");
    }

    (status, Json(ApiResponse::err(e.to_string()))).into_response()
}

/// Malformed or mistyped JSON body, in the same envelope as other errors
fn rejection_response(rejection: JsonRejection) -> Response {
    let message = rejection.body_text();
    warn!(error = %message, "Malformed request body");
    (rejection.status(), Json(ApiResponse::err(message))).into_response()
}

fn internal_error(message: &str) -> Response {
    error!("{}", message);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::err(message))).into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET / - Service info
async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "ATM Siting API",
        "version": VERSION,
        "status": "active",
        "endpoints": {
            "predict": "/predict",
            "existing_atms": "/atms",
            "reload": "/atms/reload",
            "health": "/health",
            "dashboard": "/analytics/dashboard"
        }
    }))
}

/// GET /health - Health check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.service.health()))
}

/// POST /predict - Assess a candidate site
async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<CandidateLocation>, JsonRejection>,
) -> Response {
    let Json(candidate) = match payload {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };

    match state.service.assess(&candidate) {
        Ok(assessment) => {
            info!(
                latitude = candidate.latitude,
                longitude = candidate.longitude,
                global_score = assessment.global_score,
                risk = assessment.canibalization_analysis.cannibalization_risk,
                "Site assessed"
            );
            (StatusCode::OK, Json(ApiResponse::ok(assessment))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /atms - Current registry snapshot
async fn get_atms(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.service.atms()))
}

/// POST /atms - Add or replace one ATM
async fn add_atm(
    State(state): State<AppState>,
    payload: Result<Json<AtmRecord>, JsonRejection>,
) -> Response {
    let Json(record) = match payload {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };
    let service = state.service.clone();

    // Persisting touches the filesystem
    match tokio::task::spawn_blocking(move || service.add_atm(record)).await {
        Ok(Ok(outcome)) => {
            let status = if outcome.replaced {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (status, Json(ApiResponse::ok(outcome))).into_response()
        }
        Ok(Err(e)) => error_response(e),
        Err(_) => internal_error("ATM insertion task failed"),
    }
}

/// POST /atms/reload - Re-run reconciliation from the data file
async fn reload_atms(State(state): State<AppState>) -> Response {
    let service = state.service.clone();

    match tokio::task::spawn_blocking(move || service.reload()).await {
        Ok(report) => (StatusCode::OK, Json(ApiResponse::ok(report))).into_response(),
        Err(_) => internal_error("Reload task failed"),
    }
}

/// GET /analytics/dashboard - Network statistics
async fn dashboard(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.service.stats()))
}

// ============================================================================
// Middleware
// ============================================================================

/// Tag every request with an id, on its span and in the response header
async fn request_id(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring malformed CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn router(state: AppState, config: &Config) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/predict", post(predict))
        .route("/atms", get(get_atms).post(add_atm))
        .route("/atms/reload", post(reload_atms))
        .route("/analytics/dashboard", get(dashboard))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id))
                .layer(cors_layer(config)),
        )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;
    init_logging(config.log_format);

    info!(version = VERSION, data_file = ?config.data_file, "🏦 Starting ATM siting server");

    let store: Arc<dyn AtmStore> = Arc::new(JsonFileStore::new(&config.data_file));
    let service = Arc::new(
        AtmService::initialize(
            store,
            HeuristicPredictor::new(),
            AnalyzerConfig::with_radius(config.influence_radius_km),
        )
        .context("Failed to initialize ATM service")?,
    );
    info!(atms = service.registry().len(), "✓ Registry ready");

    // Background refresher, stopped through the shutdown channel
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let refresher = PeriodicRefresher::new(
        service.clone(),
        RefresherConfig {
            interval: config.refresh_interval,
            status_flip_probability: config.status_flip_probability,
            growth_probability: config.growth_probability,
        },
    );
    let refresher_handle = tokio::spawn(refresher.run(shutdown_rx));

    let app = router(AppState { service }, &config);

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server_addr))?;

    info!(addr = %config.server_addr, "🚀 Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // No receiver left is fine: the refresher already exited
    let _ = shutdown_tx.send(());
    if let Err(e) = refresher_handle.await {
        error!(error = %e, "Refresher task ended abnormally");
    }

    info!("Server stopped");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use atm_siting::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method};
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = AtmService::initialize(
            store.clone(),
            HeuristicPredictor::new(),
            AnalyzerConfig::default(),
        )
        .unwrap();
        let app = router(
            AppState {
                service: Arc::new(service),
            },
            &Config::default(),
        );
        (app, store)
    }

    async fn send(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Response) {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        (response.status(), response)
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_add_atm_without_name_uses_id() {
        let (app, store) = test_app();

        let (status, response) = send(
            app,
            Method::POST,
            "/atms",
            r#"{"id": "NEW9", "latitude": 33.0, "longitude": -7.0}"#,
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["atm"]["name"], "NEW9");
        assert!(store.raw().iter().any(|v| v["id"] == "NEW9"));
    }

    #[tokio::test]
    async fn test_malformed_json_gets_error_envelope() {
        let (app, _) = test_app();

        let (status, response) = send(app, Method::POST, "/predict", "{not json").await;

        assert!(status.is_client_error());
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_coordinates_gets_error_envelope() {
        let (app, _) = test_app();

        let (status, response) = send(app, Method::POST, "/atms", r#"{"id": "NOPOS"}"#).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_out_of_range_candidate_is_bad_request() {
        let (app, _) = test_app();

        let (status, response) = send(
            app,
            Method::POST,
            "/predict",
            r#"{"latitude": 33.0, "longitude": 200.0}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let (app, _) = test_app();

        let request = axum::http::Request::builder()
            .uri("/health")
            .header(REQUEST_ID_HEADER, "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc-123");
    }
}
