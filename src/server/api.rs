//! HTTP API server implementation

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::cache::CacheStats;
use crate::core::errors::TranslationError;
use crate::core::models::AUTO_DETECT;
use crate::core::router::FallbackRouter;
use crate::core::stats::ProviderStatsSnapshot;
use crate::processors::bundle::BundleProcessor;

/// Application state
#[derive(Clone)]
pub struct AppState {
    processor: BundleProcessor,
}

impl AppState {
    pub fn new(router: Arc<FallbackRouter>) -> Self {
        Self {
            processor: BundleProcessor::new(router),
        }
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

/// Providers list response
#[derive(Serialize)]
struct ProvidersResponse {
    object: String,
    data: Vec<ProviderInfo>,
    cache: CacheStats,
}

#[derive(Serialize)]
struct ProviderInfo {
    name: String,
    kind: String,
    tier: u32,
    enabled: bool,
    available: bool,
    batch_size: usize,
    rate_limit_per_second: u32,
    preferred_languages: Vec<String>,
    stats: ProviderStatsSnapshot,
}

/// Translation request
#[derive(Deserialize)]
pub struct TranslateRequest {
    pub source_lang: Option<String>,
    pub target_lang: String,
    pub text_list: Vec<String>,
}

/// Translation response
#[derive(Serialize)]
pub struct TranslateResponse {
    pub translations: Vec<String>,
    pub provider: String,
    pub fallback_count: usize,
    pub failures: Vec<FailureDetail>,
}

#[derive(Serialize)]
pub struct FailureDetail {
    pub provider: String,
    pub code: String,
    pub message: String,
    pub attempts: u32,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureDetail>,
}

/// Error returned by the handlers
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: ErrorDetail {
                    message: message.to_string(),
                    code: "invalid_request".to_string(),
                    failures: vec![],
                },
            },
        }
    }
}

impl From<TranslationError> for ApiError {
    fn from(err: TranslationError) -> Self {
        let status = match &err {
            TranslationError::NoProvidersAvailable { .. }
            | TranslationError::AllProvidersFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            TranslationError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = err.to_string();
        let code = err.code().to_string();
        let failures = match err {
            TranslationError::AllProvidersFailed { failures } => failures
                .into_iter()
                .map(|f| FailureDetail {
                    code: f.error.code().to_string(),
                    message: f.error.to_string(),
                    provider: f.provider,
                    attempts: f.attempts,
                })
                .collect(),
            _ => vec![],
        };
        Self {
            status,
            body: ErrorResponse {
                error: ErrorDetail {
                    message,
                    code,
                    failures,
                },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Health check handler
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get providers handler
async fn get_providers(State(state): State<Arc<AppState>>) -> Json<ProvidersResponse> {
    let router = state.processor.router();
    let data = router
        .providers()
        .iter()
        .map(|p| {
            let descriptor = p.descriptor();
            ProviderInfo {
                name: descriptor.name.clone(),
                kind: descriptor.kind.to_string(),
                tier: descriptor.tier,
                enabled: descriptor.enabled,
                available: p.is_available(),
                batch_size: descriptor.batch_size,
                rate_limit_per_second: descriptor.rate_limit_per_second,
                preferred_languages: descriptor.preferred_languages.clone(),
                stats: p.stats().snapshot(),
            }
        })
        .collect();

    Json(ProvidersResponse {
        object: "list".to_string(),
        data,
        cache: router.cache().stats().await,
    })
}

/// Translation handler
async fn translate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    if payload.text_list.is_empty() {
        return Err(ApiError::bad_request("text_list cannot be empty"));
    }
    if payload.target_lang.trim().is_empty() {
        return Err(ApiError::bad_request("target_lang cannot be empty"));
    }

    let source_lang = payload
        .source_lang
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| AUTO_DETECT.to_string());

    let routed = state
        .processor
        .translate_texts(&payload.text_list, &source_lang, &payload.target_lang)
        .await
        .map_err(|e| {
            warn!("Translation failed: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(TranslateResponse {
        translations: routed.texts,
        provider: routed.provider_used,
        fallback_count: routed.fallback_count,
        failures: routed
            .failures
            .into_iter()
            .map(|f| FailureDetail {
                code: f.error.code().to_string(),
                message: f.error.to_string(),
                provider: f.provider,
                attempts: f.attempts,
            })
            .collect(),
    }))
}

/// Build the application router
pub fn app(router: Arc<FallbackRouter>) -> Router {
    let state = Arc::new(AppState::new(router));

    Router::new()
        .route("/", get(health_check))
        .route("/v1/providers", get(get_providers))
        .route("/translate", post(translate))
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(router: Arc<FallbackRouter>, host: String, port: u16) -> anyhow::Result<()> {
    let app = app(router);

    // Bind address
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
