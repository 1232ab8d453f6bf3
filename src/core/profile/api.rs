//! Profile API endpoints
//!
//! Hosts profile form sessions over HTTP. Every route requires a Bearer access
//! token; a session only answers to the user who mounted it.
//! - POST /api/profile/sessions - Mount a form for the current user
//! - GET /api/profile/sessions/{id} - Render the form
//! - PATCH /api/profile/sessions/{id}/fields - Update one field
//! - PUT /api/profile/sessions/{id}/avatar?filename= - Stage an avatar upload
//! - DELETE /api/profile/sessions/{id}/avatar - Remove the stored avatar
//! - POST /api/profile/sessions/{id}/submit - Validate and save
//! - DELETE /api/profile/sessions/{id} - Drop the session

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Path, Query, State,
        rejection::{BytesRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::auth::{JwtError, JwtService, PasswordHasher};
use crate::core::db::models::UserResponse;
use crate::core::notifications::{FlashMessages, Notification};
use crate::core::profile::form::{
    FieldValue, MAX_AVATAR_KILOBYTES, ProfileContext, ProfileError, ProfileField, ProfileForm,
};
use crate::core::profile::ports::{StorageDisk, UserStore, UserStoreError};
use crate::core::profile::view::View;
use crate::core::storage::UploadedFile;
use crate::core::validation::{FieldErrors, max_kilobytes_message};

/// Largest request body accepted, leaving room above the avatar limit
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// A mounted form and the user it belongs to
struct FormSession {
    owner: Uuid,
    form: Arc<Mutex<ProfileForm>>,
}

/// Profile API state
pub struct ProfileApiState {
    context: ProfileContext,
    flash: Arc<FlashMessages>,
    jwt: JwtService,
    sessions: DashMap<Uuid, FormSession>,
}

impl ProfileApiState {
    pub fn new(
        users: Arc<dyn UserStore>,
        disk: Arc<dyn StorageDisk>,
        hasher: PasswordHasher,
        jwt: JwtService,
    ) -> Self {
        let flash = Arc::new(FlashMessages::new());
        let context = ProfileContext {
            users,
            disk,
            notifier: flash.clone(),
            hasher,
        };

        Self {
            context,
            flash,
            jwt,
            sessions: DashMap::new(),
        }
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<Uuid, ProfileApiError> {
        let token = extract_bearer_token(headers)?;
        Ok(self.jwt.validate_access_token(token)?)
    }

    /// Form of a session owned by `user_id`
    fn session(&self, id: Uuid, user_id: Uuid) -> Result<Arc<Mutex<ProfileForm>>, ProfileApiError> {
        match self.sessions.get(&id) {
            Some(session) if session.owner == user_id => Ok(session.form.clone()),
            _ => Err(ProfileApiError::SessionNotFound),
        }
    }

    /// Register a mounted form, replacing any earlier session of its owner
    fn open_session(&self, owner: Uuid, form: ProfileForm) -> Uuid {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.owner != owner);
        let replaced = before - self.sessions.len();
        if replaced > 0 {
            tracing::debug!("Replaced {} profile session(s) of user {}", replaced, owner);
        }

        let session_id = Uuid::new_v4();
        self.sessions.insert(
            session_id,
            FormSession {
                owner,
                form: Arc::new(Mutex::new(form)),
            },
        );
        session_id
    }

    fn respond(&self, session_id: Uuid, user_id: Uuid, form: &ProfileForm) -> FormResponse {
        FormResponse {
            session_id,
            user: form.user().into(),
            view: form.render(),
            errors: form.errors().clone(),
            notifications: self.flash.take(user_id),
        }
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            errors: None,
        }
    }

    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// Profile API errors
#[derive(Debug, thiserror::Error)]
pub enum ProfileApiError {
    #[error("Missing or malformed bearer token")]
    MissingToken,

    #[error(transparent)]
    Token(#[from] JwtError),

    #[error("Form session not found")]
    SessionNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

impl From<UserStoreError> for ProfileApiError {
    fn from(err: UserStoreError) -> Self {
        ProfileApiError::Profile(err.into())
    }
}

impl IntoResponse for ProfileApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ProfileApiError::MissingToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            ProfileApiError::Token(JwtError::Expired) => {
                (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED")
            }
            ProfileApiError::Token(_) => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            ProfileApiError::SessionNotFound => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
            ProfileApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ProfileApiError::UserNotFound
            | ProfileApiError::Profile(ProfileError::Store(UserStoreError::NotFound)) => {
                (StatusCode::NOT_FOUND, "USER_NOT_FOUND")
            }
            ProfileApiError::Profile(ProfileError::Validation(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_FAILED")
            }
            ProfileApiError::Profile(ProfileError::InvalidValue(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_VALUE")
            }
            ProfileApiError::Profile(_) => {
                tracing::error!("Profile operation failed: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let mut body = ApiError::new(self.to_string(), code);
        if let ProfileApiError::Profile(ProfileError::Validation(errors)) = self {
            body = body.with_errors(errors);
        }

        (status, Json(body)).into_response()
    }
}

/// State of a form after an operation
#[derive(Debug, Serialize)]
pub struct FormResponse {
    pub session_id: Uuid,
    pub user: UserResponse,
    pub view: View,
    pub errors: FieldErrors,
    pub notifications: Vec<Notification>,
}

/// Request for updating a field; `null` clears it
#[derive(Debug, Deserialize)]
pub struct UpdateFieldRequest {
    pub field: ProfileField,
    pub value: Option<String>,
}

impl UpdateFieldRequest {
    fn into_value(self) -> (ProfileField, FieldValue) {
        let value = match self.value {
            Some(text) => FieldValue::Text(text),
            None => FieldValue::Clear,
        };
        (self.field, value)
    }
}

#[derive(Debug, Deserialize)]
pub struct AvatarQuery {
    pub filename: String,
}

/// Create the profile API router
pub fn profile_router(state: ProfileApiState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/profile/sessions", post(mount_handler))
        .route(
            "/api/profile/sessions/{id}",
            get(render_handler).delete(drop_handler),
        )
        .route("/api/profile/sessions/{id}/fields", patch(update_handler))
        .route(
            "/api/profile/sessions/{id}/avatar",
            put(upload_avatar_handler).delete(delete_avatar_handler),
        )
        .route("/api/profile/sessions/{id}/submit", post(submit_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// POST /api/profile/sessions
/// Mount a profile form for the current user
async fn mount_handler(
    State(state): State<Arc<ProfileApiState>>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<FormResponse>), ProfileApiError> {
    let user_id = state.authenticate(&headers)?;

    let user = state
        .context
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(ProfileApiError::UserNotFound)?;

    let form = ProfileForm::mount(user);
    let mounted = form.clone();
    let session_id = state.open_session(user_id, form);
    let response = state.respond(session_id, user_id, &mounted);
    tracing::info!("Mounted profile session {} for user {}", session_id, user_id);

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/profile/sessions/{id}
async fn render_handler(
    State(state): State<Arc<ProfileApiState>>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<FormResponse>, ProfileApiError> {
    let user_id = state.authenticate(&headers)?;
    let form = state.session(session_id, user_id)?;
    let form = form.lock().await;

    Ok(Json(state.respond(session_id, user_id, &form)))
}

/// PATCH /api/profile/sessions/{id}/fields
/// Assign a field and run its update hook
async fn update_handler(
    State(state): State<Arc<ProfileApiState>>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<UpdateFieldRequest>,
) -> Result<Json<FormResponse>, ProfileApiError> {
    let user_id = state.authenticate(&headers)?;
    let form = state.session(session_id, user_id)?;
    let mut form = form.lock().await;

    let (field, value) = request.into_value();
    tracing::debug!(field = %field, "Updating profile session {}", session_id);
    form.update(&state.context, field, value).await?;

    Ok(Json(state.respond(session_id, user_id, &form)))
}

/// PUT /api/profile/sessions/{id}/avatar?filename=
/// Stage the request body as the new avatar
async fn upload_avatar_handler(
    State(state): State<Arc<ProfileApiState>>,
    Path(session_id): Path<Uuid>,
    query: Result<Query<AvatarQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<FormResponse>, ProfileApiError> {
    let user_id = state.authenticate(&headers)?;
    let form = state.session(session_id, user_id)?;

    let Query(query) = query.map_err(|e| ProfileApiError::BadRequest(e.body_text()))?;
    let body = body.map_err(upload_rejected)?;

    let mut form = form.lock().await;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let file = UploadedFile::new(query.filename, content_type, body.to_vec());
    tracing::debug!("Staging avatar {:?} in session {}", file, session_id);

    form.update(&state.context, ProfileField::Avatar, FieldValue::File(file))
        .await?;

    Ok(Json(state.respond(session_id, user_id, &form)))
}

/// Report a body over the size limit as an avatar field error
fn upload_rejected(rejection: BytesRejection) -> ProfileApiError {
    if rejection.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return ProfileApiError::BadRequest(rejection.body_text());
    }

    let key = ProfileField::Avatar.key();
    let mut errors = FieldErrors::new();
    errors.add(key, max_kilobytes_message(key, MAX_AVATAR_KILOBYTES));
    ProfileError::Validation(errors).into()
}

/// DELETE /api/profile/sessions/{id}/avatar
async fn delete_avatar_handler(
    State(state): State<Arc<ProfileApiState>>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<FormResponse>, ProfileApiError> {
    let user_id = state.authenticate(&headers)?;
    let form = state.session(session_id, user_id)?;
    let mut form = form.lock().await;

    form.delete_avatar(&state.context).await?;

    Ok(Json(state.respond(session_id, user_id, &form)))
}

/// POST /api/profile/sessions/{id}/submit
async fn submit_handler(
    State(state): State<Arc<ProfileApiState>>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<FormResponse>, ProfileApiError> {
    let user_id = state.authenticate(&headers)?;
    let form = state.session(session_id, user_id)?;
    let mut form = form.lock().await;

    form.submit(&state.context).await?;

    Ok(Json(state.respond(session_id, user_id, &form)))
}

/// DELETE /api/profile/sessions/{id}
async fn drop_handler(
    State(state): State<Arc<ProfileApiState>>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ProfileApiError> {
    let user_id = state.authenticate(&headers)?;
    state.session(session_id, user_id)?;
    state.sessions.remove(&session_id);

    tracing::info!("Dropped profile session {}", session_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Extract Bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ProfileApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ProfileApiError::MissingToken)?;

    match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(ProfileApiError::MissingToken),
    }
}
