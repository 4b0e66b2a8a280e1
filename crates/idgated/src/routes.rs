//! HTTP surface: submission, review and administration routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use idgate_core::idnumber::validate_pin;
use idgate_imaging::{decode_image_payload, encode_image_payload};

use crate::config::Config;
use crate::rate_limiter::RateLimiter;
use crate::store::{Account, Role, Store, StoreError, VerificationStatus};
use crate::verifier::{Verifier, VerifierError};

pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub verifier: Verifier,
    pub rate_limiter: tokio::sync::Mutex<RateLimiter>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/verify", post(submit_verification))
        .route("/api/user/verifications", get(own_verifications))
        .route("/api/verifications", get(all_verifications))
        .route("/api/verifications/:id", get(verification_detail))
        .route("/api/verifications/:id", patch(override_status))
        // Base64 inflates uploads by 4/3; leave headroom above the image
        // ceiling so our own size checks produce the error body
        .layer(axum::extract::DefaultBodyLimit::max(8 * 1024 * 1024))
        .with_state(state)
}

// ── Error plumbing ────────────────────────────────────────────────────────────

struct ApiError {
    status: StatusCode,
    error: &'static str,
    details: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, error: &'static str) -> Self {
        Self {
            status,
            error,
            details: None,
        }
    }

    fn with_details(status: StatusCode, error: &'static str, details: impl Into<String>) -> Self {
        Self {
            status,
            error,
            details: Some(details.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RecordNotFound(id) => {
                ApiError::with_details(StatusCode::NOT_FOUND, "verification not found", id)
            }
            StoreError::TerminalStatus { .. } => ApiError::with_details(
                StatusCode::CONFLICT,
                "status is terminal",
                err.to_string(),
            ),
            other => {
                tracing::error!(error = %other, "storage failure");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
            }
        }
    }
}

// ── Authentication ────────────────────────────────────────────────────────────

/// Resolve the request's bearer token to an account.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Account, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "missing bearer token"))?;

    state
        .store
        .account_by_token(token)
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "invalid token"))
}

fn require_admin(account: &Account) -> Result<(), ApiError> {
    if account.role != Role::Admin {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "admin role required"));
    }
    Ok(())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state.store.count_all().await?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "verifications": count,
    })))
}

#[derive(Deserialize)]
struct VerifyRequest {
    #[serde(rename = "pinNumber")]
    pin_number: Option<String>,
    #[serde(rename = "imageData")]
    image_data: Option<String>,
}

/// Submit one verification attempt.
///
/// Validation order: auth, role, ID number format, rate limit, image
/// payload. A record is persisted for every attempt that reaches the
/// collaborator call, whether or not that call succeeds.
async fn submit_verification(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<VerifyRequest>,
) -> Result<Response, ApiError> {
    let account = authenticate(&state, &headers).await?;
    if account.role == Role::Guest {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "guest accounts cannot submit verifications",
        ));
    }

    let pin = req
        .pin_number
        .as_deref()
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "pinNumber is required"))?;
    validate_pin(pin).map_err(|e| {
        ApiError::with_details(StatusCode::BAD_REQUEST, "invalid pinNumber", e.to_string())
    })?;

    let payload = req
        .image_data
        .as_deref()
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "imageData is required"))?;

    {
        let mut limiter = state.rate_limiter.lock().await;
        if let Err(msg) = limiter.check(&account.id) {
            return Err(ApiError::with_details(
                StatusCode::TOO_MANY_REQUESTS,
                "rate limited",
                msg,
            ));
        }
    }

    let image = decode_image_payload(payload).map_err(|e| {
        ApiError::with_details(StatusCode::BAD_REQUEST, "invalid imageData", e.to_string())
    })?;
    if image.len() < state.config.min_image_bytes {
        return Err(ApiError::with_details(
            StatusCode::UNPROCESSABLE_ENTITY,
            "image too small",
            format!(
                "{} bytes; minimum is {}",
                image.len(),
                state.config.min_image_bytes
            ),
        ));
    }
    if image.len() > state.config.max_image_bytes {
        return Err(ApiError::with_details(
            StatusCode::PAYLOAD_TOO_LARGE,
            "image too large",
            format!(
                "{} bytes; maximum is {}",
                image.len(),
                state.config.max_image_bytes
            ),
        ));
    }

    let image_b64 = encode_image_payload(&image);
    match state.verifier.verify(pin, &image_b64).await {
        Ok(result) => {
            let status = result.derived_status();
            let id = state
                .store
                .insert_verification(&account.id, pin, &image, status, &result.raw)
                .await?;

            {
                let mut limiter = state.rate_limiter.lock().await;
                match status {
                    VerificationStatus::Approved => limiter.record_approval(&account.id),
                    VerificationStatus::Rejected => limiter.record_rejection(&account.id),
                    VerificationStatus::Pending => {}
                }
            }

            tracing::info!(
                verification = %id,
                account = %account.username,
                status = status.as_str(),
                "verification recorded"
            );

            // Pass the collaborator reply through verbatim
            let http_status = StatusCode::from_u16(result.http_status)
                .unwrap_or(StatusCode::BAD_GATEWAY);
            Ok((
                http_status,
                [(header::CONTENT_TYPE, "application/json")],
                result.raw,
            )
                .into_response())
        }
        Err(err @ (VerifierError::Transport(_) | VerifierError::Unreachable(_))) => {
            // The attempt still counts; leave it pending for manual review
            let id = state
                .store
                .insert_verification(
                    &account.id,
                    pin,
                    &image,
                    VerificationStatus::Pending,
                    &err.to_string(),
                )
                .await?;
            tracing::warn!(verification = %id, error = %err, "collaborator unreachable");
            Err(ApiError::with_details(
                StatusCode::BAD_GATEWAY,
                "verification service unreachable",
                err.to_string(),
            ))
        }
    }
}

/// The calling account's own submission history.
async fn own_verifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = authenticate(&state, &headers).await?;
    let records = state.store.list_for_account(&account.id).await?;
    Ok(Json(json!({ "verifications": records })))
}

/// Every submission with submitter identity. Admin only.
async fn all_verifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = authenticate(&state, &headers).await?;
    require_admin(&account)?;
    let records = state.store.list_all().await?;
    Ok(Json(json!({ "verifications": records })))
}

/// One record with its decrypted selfie, as a data URI. Admin only.
async fn verification_detail(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = authenticate(&state, &headers).await?;
    require_admin(&account)?;

    let (detail, image) = state
        .store
        .get_detail(&id)
        .await?
        .ok_or_else(|| ApiError::with_details(StatusCode::NOT_FOUND, "verification not found", id))?;

    let image_uri = format!("data:image/jpeg;base64,{}", encode_image_payload(&image));
    Ok(Json(json!({
        "verification": detail,
        "imageData": image_uri,
    })))
}

#[derive(Deserialize)]
struct OverrideRequest {
    status: String,
    note: Option<String>,
}

/// Manual administrative status override. Admin only; pending records only.
async fn override_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<OverrideRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = authenticate(&state, &headers).await?;
    require_admin(&account)?;

    let status = VerificationStatus::parse(&req.status).map_err(|e| {
        ApiError::with_details(StatusCode::BAD_REQUEST, "invalid status", e.to_string())
    })?;
    if !status.is_terminal() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "status must be approved or rejected",
        ));
    }

    let note = req.note.as_deref().unwrap_or("manual override");
    state.store.update_status(&id, status, note).await?;

    tracing::info!(
        verification = %id,
        admin = %account.username,
        status = status.as_str(),
        "manual status override"
    );
    Ok(Json(json!({ "id": id, "status": status.as_str() })))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
