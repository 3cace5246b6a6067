//! HTTP API gateway.
//!
//! Three routes: `POST /token` exchanges form credentials for a bearer
//! token, `POST /query` routes an authenticated natural-language query, and
//! `GET /health` reports knowledge-base readiness.
//!
//! Failures map onto status codes by kind: bad credentials and bad tokens
//! are 401 (with `WWW-Authenticate: Bearer`), an empty query is 400, an
//! unbuilt knowledge base is 503, an agent failure is 502, everything else
//! is 500. Error bodies use a uniform `{"error": {"code", "message"}}`
//! shape.

use axum::extract::{Form, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::index::{KnowledgeBase, Readiness};
use crate::router::{QueryRouter, RouteError};
use crate::token::{AuthError, TokenService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: TokenService,
    pub credentials: CredentialStore,
    pub kb: Arc<KnowledgeBase>,
    pub router: Arc<QueryRouter>,
}

/// Build the application router with CORS and request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/token", post(handle_token))
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run_server(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

// ============ Error mapping ============

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    challenge: bool,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            challenge: false,
        }
    }

    /// 401 with a `WWW-Authenticate: Bearer` challenge header.
    fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthorized",
            message: message.into(),
            challenge: true,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        }));
        let mut response = (self.status, body).into_response();
        if self.challenge {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

impl From<RouteError> for AppError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::NotInitialized => AppError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "not_initialized",
                "Knowledge base is not initialized. Please try again later.",
            ),
            RouteError::IndexNotReady(label) => AppError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "index_not_ready",
                format!("The {} knowledge index is not available.", label),
            ),
            RouteError::Agent(e) => {
                warn!(error = %e, "query agent failure");
                AppError::new(
                    StatusCode::BAD_GATEWAY,
                    "agent_error",
                    "The query agent could not answer this question.",
                )
            }
            RouteError::Retrieval(e) => {
                warn!(error = %e, "retrieval failure");
                AppError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal error while answering the query.",
                )
            }
        }
    }
}

// ============ POST /token ============

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
}

async fn handle_token(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state
        .credentials
        .authenticate(&form.username, &form.password)
        .await
        .map_err(|e| match e {
            // Wrong username and wrong password stay indistinguishable to
            // the client.
            AuthError::UserNotFound | AuthError::BadPassword => {
                warn!(username = %form.username, reason = %e, "login rejected");
                AppError::unauthorized("Incorrect username or password")
            }
            AuthError::Store(msg) => {
                warn!(error = %msg, "credential store failure during login");
                AppError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Authentication store unavailable.",
                )
            }
            other => {
                warn!(reason = %other, "unexpected auth failure during login");
                AppError::unauthorized("Incorrect username or password")
            }
        })?;

    let ttl = chrono::Duration::minutes(state.config.auth.token_ttl_minutes);
    let access_token = state
        .tokens
        .issue(&user.username, Some(ttl))
        .map_err(|e| {
            warn!(error = %e, "token issuance failed");
            AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "Could not issue token.",
            )
        })?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<String>,
}

async fn handle_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let username = authorize(&state, &headers).await?;

    let query = request.query.trim();
    if query.is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "Query must not be empty.",
        ));
    }

    info!(user = %username, "routing query");
    let answer = state.router.route(query).await?;

    Ok(Json(QueryResponse {
        answer: answer.text,
        sources: answer.sources,
    }))
}

/// Extract and validate the bearer token, then re-resolve the subject
/// against the credential store so revoked users are locked out within one
/// token lifetime.
async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?;

    let subject = state.tokens.validate(token).map_err(|e| {
        warn!(reason = %e, "token rejected");
        AppError::unauthorized("Could not validate credentials")
    })?;

    let user = state.credentials.find_user(&subject).await.map_err(|e| {
        warn!(error = %e, "credential store failure during token check");
        AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "Authentication store unavailable.",
        )
    })?;

    match user {
        Some(user) => Ok(user.username),
        None => Err(AppError::unauthorized("Could not validate credentials")),
    }
}

// ============ GET /health ============

async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (status, technical, diet) = match state.kb.readiness() {
        Readiness::Ready => ("ready", true, true),
        Readiness::Partial { technical, diet } => ("degraded", technical, diet),
        Readiness::Uninitialized => ("uninitialized", false, false),
    };

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "knowledge_base": {
            "status": status,
            "technical": technical,
            "diet": diet,
        }
    }))
}
