//! JSON endpoints: login, the reader handlers and the onboarding data handler.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use shared::{
    domain::{ExplorationId, UserSummary},
    error::{ApiError, ErrorBody, ErrorCode},
    protocol::{
        LoginRequest, LoginResponse, PrerequisitesRequest, PrerequisitesResponse,
        ReaderFeedbackRequest, ReaderInitResponse, TransitionRequest, TransitionResponse,
    },
};
use tracing::{error, info};

use crate::{
    app_state::AppState,
    auth::{mint_session_token, verify_csrf_token, verify_session_token},
};

pub(crate) const CSRF_HEADER: &str = "x-csrf-token";

pub(crate) type Rejection = (StatusCode, Json<ErrorBody>);

pub(crate) fn reject(err: ApiError) -> Rejection {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if err.code == ErrorCode::Internal {
        error!(error = %err.message, "request failed");
    }
    (status, Json(err.into()))
}

pub(crate) fn internal(err: impl std::fmt::Display) -> Rejection {
    reject(ApiError::internal(err.to_string()))
}

fn unauthorized(message: &str) -> Rejection {
    reject(ApiError::new(ErrorCode::Unauthorized, message))
}

/// The signed-in user, when the request carries a valid bearer token.
pub(crate) struct Viewer(pub(crate) Option<UserSummary>);

impl Viewer {
    pub(crate) fn require(self) -> Result<UserSummary, Rejection> {
        self.0
            .ok_or_else(|| unauthorized("you must be logged in to access this resource"))
    }

    pub(crate) fn user(&self) -> Option<&UserSummary> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Viewer {
    type Rejection = Rejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(Viewer(None));
        };
        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| unauthorized("malformed authorization header"))?;
        let user_id = verify_session_token(&state.auth, token.trim())
            .ok_or_else(|| unauthorized("invalid or expired session"))?;
        let user = state
            .reader
            .storage
            .get_user(user_id)
            .await
            .map_err(internal)?
            .ok_or_else(|| unauthorized("unknown user"))?;
        Ok(Viewer(Some(user)))
    }
}

pub(crate) async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, Rejection> {
    state.reader.storage.health_check().await.map_err(internal)?;
    Ok("ok")
}

pub(crate) async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, Rejection> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(reject(ApiError::validation(
            "a valid email address is required",
        )));
    }

    let storage = &state.reader.storage;
    let user_id = storage.create_user(&email).await.map_err(internal)?;
    if state
        .admin_emails
        .iter()
        .any(|admin| admin.eq_ignore_ascii_case(&email))
    {
        storage.set_admin(user_id, true).await.map_err(internal)?;
    }

    let token = mint_session_token(&state.auth, user_id).map_err(internal)?;
    info!(user_id = user_id.0, "user logged in");
    Ok(Json(LoginResponse { user_id, token }))
}

pub(crate) async fn reader_init(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(exploration_id): Path<String>,
) -> Result<Json<ReaderInitResponse>, Rejection> {
    let exploration_id = ExplorationId(exploration_id);
    reader::init_exploration(&state.reader, viewer.user(), &exploration_id)
        .await
        .map(Json)
        .map_err(reject)
}

pub(crate) async fn reader_transition(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path((exploration_id, state_name)): Path<(String, String)>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<TransitionResponse>, Rejection> {
    let exploration_id = ExplorationId(exploration_id);
    reader::transition(
        &state.reader,
        viewer.user(),
        &exploration_id,
        &state_name,
        req,
    )
    .await
    .map(Json)
    .map_err(reject)
}

pub(crate) async fn reader_feedback(
    State(state): State<Arc<AppState>>,
    Path((exploration_id, state_name)): Path<(String, String)>,
    Json(req): Json<ReaderFeedbackRequest>,
) -> Result<Json<Value>, Rejection> {
    let exploration_id = ExplorationId(exploration_id);
    reader::submit_reader_feedback(&state.reader, &exploration_id, &state_name, req)
        .await
        .map_err(reject)?;
    Ok(Json(json!({})))
}

pub(crate) async fn get_prerequisites(
    viewer: Viewer,
) -> Result<Json<PrerequisitesResponse>, Rejection> {
    let user = viewer.require()?;
    Ok(Json(reader::get_prerequisites(&user)))
}

pub(crate) async fn post_prerequisites(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    headers: HeaderMap,
    Json(req): Json<PrerequisitesRequest>,
) -> Result<Json<Value>, Rejection> {
    let user = viewer.require()?;
    let csrf_ok = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|token| verify_csrf_token(&state.auth, user.user_id, token));
    if !csrf_ok {
        return Err(reject(ApiError::new(
            ErrorCode::Forbidden,
            "missing or invalid CSRF token",
        )));
    }

    reader::submit_prerequisites(&state.reader, user.user_id, req)
        .await
        .map_err(reject)?;
    Ok(Json(json!({})))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
