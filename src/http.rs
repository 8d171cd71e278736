use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::auth::{AuthedUser, Authenticator};
use crate::cache::MemoryCache;
use crate::certification::{calculate_progress, CertificationEngine};
use crate::config::Config;
use crate::content::ContentStore;
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::ledger::StatsLedger;
use crate::lifecycle::LifecycleEngine;
use crate::models::{NewFile, ReviewDecision, UserRole};
use crate::rate_limit::RateLimiter;
use crate::review::ReviewRegistry;
use crate::security::constant_time_compare;

const AVAILABLE_PROJECTS_CACHE_KEY: &str = "projects:available";

/// Shared state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub lifecycle: LifecycleEngine,
    pub certification: CertificationEngine,
    pub review: ReviewRegistry,
    pub auth: Authenticator,
    pub cache: MemoryCache,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Self {
        let ledger = StatsLedger::new(db.clone());
        let certification = CertificationEngine::new(db.clone());
        let lifecycle = LifecycleEngine::new(
            db.clone(),
            ledger,
            certification.clone(),
            ContentStore::new(),
            config.review_sla_hours,
        );
        Self {
            lifecycle,
            certification,
            review: ReviewRegistry::new(db.clone()),
            auth: Authenticator::new(db.clone()),
            cache: MemoryCache::new(),
            limiter: RateLimiter::new(),
            db,
            config,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/tokens", post(seed_token))
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/:project_id/files", get(list_project_files))
        .route("/files/:file_id", get(get_file))
        .route("/files/:file_id/claim", post(claim_file))
        .route("/files/:file_id/submit", post(submit_file))
        .route("/files/:file_id/resolve", post(resolve_file))
        .route("/me/files", get(my_files))
        .route("/reviews/pending", get(pending_reviews))
        .route("/users/:user_id/progress", get(user_progress))
        .route(
            "/users/:user_id/certificates/:tier_id",
            post(claim_certificate),
        )
        .route("/certificates/verify/:code", get(verify_certificate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::InvalidState(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
        }
        (
            status,
            Json(json!({ "error": self.kind(), "message": self.to_string() })),
        )
            .into_response()
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<AuthedUser> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    state.auth.verify_bearer(authorization)
}

/// Returns an early 429 response when the caller is over budget. The
/// limiter itself fails open, so only an explicit "over limit" blocks.
fn enforce_rate_limit(state: &AppState, user_id: &str) -> Option<Response> {
    let decision = state.limiter.check(
        user_id,
        state.config.rate_limit_max_requests,
        state.config.rate_limit_window_secs,
    );
    if decision.allowed {
        return None;
    }
    Some(
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "rate_limited",
                "message": "too many requests, slow down",
                "reset_at": decision.reset_at.to_rfc3339(),
            })),
        )
            .into_response(),
    )
}

// ==================== Handlers ====================

async fn health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

#[derive(Debug, Deserialize)]
struct SeedTokenRequest {
    token: String,
    user_id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default = "default_role")]
    role: String,
}

fn default_role() -> String {
    "contributor".to_string()
}

/// Operator-only: map a bearer token to a user identity. Guarded by the
/// admin key, compared in constant time.
async fn seed_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SeedTokenRequest>,
) -> Result<Response, AppError> {
    let presented = headers
        .get("x-admin-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !constant_time_compare(presented, &state.config.admin_api_key) {
        return Err(AppError::Unauthorized);
    }
    if body.token.trim().is_empty() || body.user_id.trim().is_empty() {
        return Err(AppError::Validation(
            "token and user_id must not be empty".into(),
        ));
    }

    let role = UserRole::from_str(&body.role)?;
    state
        .db
        .upsert_token(&body.token, &body.user_id, &body.display_name, role)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "user_id": body.user_id, "role": role })),
    )
        .into_response())
}

/// Projects that still have unclaimed files, memoized briefly because this
/// is the hottest read. Cache trouble falls back to a direct read.
async fn list_projects(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    authenticate(&state, &headers)?;

    if let Some(cached) = state.cache.get(AVAILABLE_PROJECTS_CACHE_KEY) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&cached) {
            return Ok(Json(value).into_response());
        }
    }

    let projects = state.db.list_available_projects()?;
    let payload = json!({ "projects": projects });
    state.cache.set(
        AVAILABLE_PROJECTS_CACHE_KEY,
        &payload.to_string(),
        Duration::from_secs(state.config.listing_cache_ttl_secs),
    );
    Ok(Json(payload).into_response())
}

#[derive(Debug, Deserialize)]
struct CreateProjectRequest {
    name: String,
    #[serde(default)]
    categories: Vec<String>,
    files: Vec<NewFile>,
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateProjectRequest>,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &headers)?;
    if !user.role.can_manage_projects() {
        return Err(AppError::Forbidden(format!(
            "role {} cannot create projects",
            user.role.as_str()
        )));
    }
    if let Some(limited) = enforce_rate_limit(&state, &user.user_id) {
        return Ok(limited);
    }

    let (project, files) = state
        .db
        .create_project(&body.name, &body.categories, &body.files)?;
    // The listing changed; drop the memoized copy right away
    state.cache.delete(AVAILABLE_PROJECTS_CACHE_KEY);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "project": project, "files": files })),
    )
        .into_response())
}

async fn list_project_files(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    authenticate(&state, &headers)?;
    let project = state
        .db
        .get_project(&project_id)?
        .ok_or_else(|| AppError::NotFound(format!("project {}", project_id)))?;
    let files = state.db.list_project_files(&project_id)?;
    Ok(Json(json!({ "project": project, "files": files })).into_response())
}

async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    authenticate(&state, &headers)?;
    let file = state
        .db
        .get_file(&file_id)?
        .ok_or_else(|| AppError::NotFound(format!("file {}", file_id)))?;
    Ok(Json(json!({ "file": file })).into_response())
}

async fn claim_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &headers)?;
    if let Some(limited) = enforce_rate_limit(&state, &user.user_id) {
        return Ok(limited);
    }

    let file = state.lifecycle.claim(&file_id, &user.user_id).await?;
    state.cache.delete(AVAILABLE_PROJECTS_CACHE_KEY);
    Ok(Json(json!({ "file": file })).into_response())
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    translated_text: String,
}

async fn submit_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SubmitRequest>,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &headers)?;
    if let Some(limited) = enforce_rate_limit(&state, &user.user_id) {
        return Ok(limited);
    }

    let (file, task) = state
        .lifecycle
        .submit(&file_id, &user.user_id, &body.translated_text)
        .await?;
    Ok(Json(json!({ "file": file, "review_task": task })).into_response())
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    decision: ReviewDecision,
    #[serde(default)]
    comments: Option<String>,
}

async fn resolve_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ResolveRequest>,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &headers)?;
    if let Some(limited) = enforce_rate_limit(&state, &user.user_id) {
        return Ok(limited);
    }

    let outcome = state
        .lifecycle
        .resolve(
            &file_id,
            &user.user_id,
            user.role,
            body.decision,
            body.comments.as_deref(),
        )
        .await?;
    Ok(Json(json!({
        "file": outcome.file,
        "review_task": outcome.task,
        "translator": outcome.translator,
        "new_certificates": outcome.new_certificates,
    }))
    .into_response())
}

async fn my_files(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &headers)?;
    let files = state.db.list_assigned_files(&user.user_id)?;
    Ok(Json(json!({ "files": files })).into_response())
}

async fn pending_reviews(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &headers)?;
    if !user.role.can_review() {
        return Err(AppError::Forbidden(format!(
            "role {} cannot list reviews",
            user.role.as_str()
        )));
    }
    let tasks = state.review.list_pending()?;
    Ok(Json(json!({ "tasks": tasks })).into_response())
}

async fn user_progress(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    authenticate(&state, &headers)?;
    let profile = state
        .db
        .get_profile(&user_id)?
        .ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))?;
    let progress = calculate_progress(&profile);
    let certificates = state.db.list_certificates_for_user(&user_id)?;
    Ok(Json(json!({
        "profile": profile,
        "progress": progress,
        "certificates": certificates,
    }))
    .into_response())
}

/// Direct certificate claim for a reached tier. Races against the
/// automatic milestone sweep resolve to a no-op, surfaced as
/// `"certificate": null`.
async fn claim_certificate(
    State(state): State<Arc<AppState>>,
    Path((user_id, tier_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &headers)?;
    if user.user_id != user_id && user.role != UserRole::Administrator {
        return Err(AppError::Forbidden(
            "certificates can only be claimed for yourself".into(),
        ));
    }
    if let Some(limited) = enforce_rate_limit(&state, &user.user_id) {
        return Ok(limited);
    }

    let certificate = state.certification.award_certificate(&user_id, &tier_id)?;
    Ok(Json(json!({ "certificate": certificate })).into_response())
}

/// Public, unauthenticated confirmation that a certificate was issued.
async fn verify_certificate(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let shape = Regex::new(r"^[0-9a-f]{32}$").map_err(|e| AppError::Internal(e.into()))?;
    if !shape.is_match(&code) {
        return Err(AppError::Validation(
            "verification codes are 32 lowercase hex characters".into(),
        ));
    }

    match state.db.find_certificate_by_code(&code)? {
        Some(certificate) => Ok(Json(json!({
            "valid": true,
            "certificate": certificate,
        }))
        .into_response()),
        None => Ok(Json(json!({ "valid": false })).into_response()),
    }
}
