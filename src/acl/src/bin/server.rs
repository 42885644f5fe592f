//! # Access Control HTTP Server
//!
//! HTTP front end for the CretoAI access control service.
//!
//! ## Endpoints
//!
//! - `POST /v1/check` - Single resource access check
//! - `POST /v1/filter` - Compile the bulk-query filter for a resource type
//! - `POST /v1/hook` - Before-authorization hook (grant / deny / abstain)
//! - `GET /health` - Health check
//!
//! ## Configuration
//!
//! Environment variables:
//! - `PORT` - HTTP server port (default: 8080)
//! - `ACL_CONFIG` - Path to a TOML config file (default: built-in defaults)
//! - `ACL_RULES` - Path to a JSON rule seed file (default: no rules)
//! - `ACL_RESOLUTION`, `ACL_SCOPE_GROUPING`, `ACL_CACHE`, `ACL_CACHE_TTL` - config overrides
//! - `RUST_LOG` - Log level (default: info)

use anyhow::Context as _;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    serve, Router,
};
use cretoai_acl::provider::{CachedRuleProvider, InMemoryRuleStore, RuleSeed};
use cretoai_acl::{
    AccessControlService, AclConfig, AclError, Action, BeforeAuthorization, HookOutcome, Predicate,
    Principal, Query, Resource, ResourceTypeConfig, RuleSetProvider,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shared application state
#[derive(Clone)]
struct AppState {
    service: Arc<AccessControlService>,
    start_time: std::time::Instant,
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Application error type
#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Engine(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Engine(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "engine_error", msg),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<AclError> for AppError {
    fn from(err: AclError) -> Self {
        match err {
            AclError::InvalidInput(_) => AppError::BadRequest(err.to_string()),
            other => AppError::Engine(other.to_string()),
        }
    }
}

/// Access check request
#[derive(Debug, Deserialize)]
struct CheckRequest {
    principal: Principal,
    action: String,
    resource: Resource,
    #[serde(default)]
    overrides: Option<ResourceTypeConfig>,
}

#[derive(Debug, Serialize)]
struct CheckResponse {
    allowed: bool,
    decision: String,
}

/// Bulk filter request; `resources` are optionally filtered in memory
#[derive(Debug, Deserialize)]
struct FilterRequest {
    principal: Principal,
    action: String,
    resource_type: String,
    #[serde(default)]
    overrides: Option<ResourceTypeConfig>,
    #[serde(default)]
    resources: Vec<Resource>,
}

#[derive(Debug, Serialize)]
struct FilterResponse {
    resource_type: String,
    where_clause: String,
    filter: Predicate,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    matched: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct HookRequest {
    principal: Principal,
    ability: String,
    #[serde(default)]
    resource: Option<Resource>,
}

#[derive(Debug, Serialize)]
struct HookResponse {
    outcome: HookOutcome,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

/// POST /v1/check - Check access to a single resource
async fn check_access(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    let action = Action::new(req.action);
    let allowed = state
        .service
        .can_with(&req.principal, &action, &req.resource, req.overrides.as_ref())
        .await?;

    Ok(Json(CheckResponse {
        allowed,
        decision: if allowed { "allow".to_string() } else { "deny".to_string() },
    }))
}

/// POST /v1/filter - Compile the access filter for a resource type
async fn filter_resources(
    State(state): State<AppState>,
    Json(req): Json<FilterRequest>,
) -> Result<Json<FilterResponse>, AppError> {
    if req.resource_type.trim().is_empty() {
        return Err(AppError::BadRequest("resource_type must not be empty".to_string()));
    }

    let action = Action::new(req.action);
    let query = state
        .service
        .filter_query_with(
            &req.principal,
            &action,
            Some(Query::new(req.resource_type)),
            None,
            req.overrides.as_ref(),
        )
        .await?;

    let matched = query.apply(&req.resources).into_iter().cloned().collect();

    Ok(Json(FilterResponse {
        resource_type: query.resource_type().to_string(),
        where_clause: query.where_clause(),
        filter: query.predicate().clone(),
        matched,
    }))
}

/// POST /v1/hook - Before-authorization hook
async fn authorization_hook(
    State(state): State<AppState>,
    Json(req): Json<HookRequest>,
) -> Json<HookResponse> {
    let ability = Action::new(req.ability);
    let outcome = state
        .service
        .before_authorization(&req.principal, &ability, req.resource.as_ref())
        .await;

    Json(HookResponse { outcome })
}

/// GET /health - Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: cretoai_acl::VERSION.to_string(),
    })
}

/// Create the HTTP router with all endpoints
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/v1/check", post(check_access))
        .route("/v1/filter", post(filter_resources))
        .route("/v1/hook", post(authorization_hook))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(trace).layer(cors))
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

/// Build the rule provider: seeded in-memory store, optionally behind the cache
async fn build_provider(config: &AclConfig) -> anyhow::Result<Arc<dyn RuleSetProvider>> {
    let store = InMemoryRuleStore::new().with_role_inheritance(config.integrations.role_inheritance);

    if let Ok(path) = std::env::var("ACL_RULES") {
        let seed = RuleSeed::load(&path).with_context(|| format!("failed to read rule seed {}", path))?;
        store.load_seed(seed).await?;
    }

    if config.cache.enabled {
        info!(
            "  Rule cache: ttl={}s capacity={}",
            config.cache.ttl_secs, config.cache.capacity
        );
        Ok(Arc::new(CachedRuleProvider::from_config(store, &config.cache)))
    } else {
        Ok(Arc::new(store))
    }
}

/// Main server entrypoint
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CretoAI Access Control Server v{}", cretoai_acl::VERSION);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let config = match std::env::var("ACL_CONFIG") {
        Ok(path) => AclConfig::load(&path).with_context(|| format!("failed to load config {}", path))?,
        Err(_) => AclConfig::default(),
    }
    .apply_env_overrides();

    info!("Configuration:");
    info!("  Port: {}", port);
    info!("  Default resolution: {}", config.default_resolution);
    info!("  Default scope grouping: {}", config.default_scope_grouping);

    let provider = build_provider(&config).await?;

    let state = AppState {
        service: Arc::new(AccessControlService::new(provider, config)),
        start_time: std::time::Instant::now(),
    };

    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("HTTP server error: {}", e);
            e
        })?;

    info!("Server shut down gracefully");
    Ok(())
}
