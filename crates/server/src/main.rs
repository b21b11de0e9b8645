use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use server_api::{
    blank_form, create, edit, get_details, get_editable_form, join, leave, list_all, list_joined,
    rejected_form, ApiContext, EventFormInput,
};
use shared::{
    domain::{EventId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{EventDetails, EventForm, EventSummary},
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

mod config;

use config::{load_settings, prepare_database_url};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    display_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LoginResponse {
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    user_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CreatedResponse {
    event_id: i64,
}

/// Lookup rows seeded on first start so the create form has types to offer.
/// Administration of the lookup itself happens out of band.
const DEFAULT_EVENT_TYPES: &[&str] = &["Animals", "Fun", "Discussion", "Work"];

const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    seed_default_event_types(&storage).await?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn seed_default_event_types(storage: &Storage) -> anyhow::Result<()> {
    if !storage.list_event_types().await?.is_empty() {
        return Ok(());
    }
    for name in DEFAULT_EVENT_TYPES {
        storage.create_event_type(name).await?;
    }
    info!(count = DEFAULT_EVENT_TYPES.len(), "seeded event types");
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/login", post(login))
        .route("/events", get(http_list_all).post(http_create))
        .route("/events/joined", get(http_list_joined))
        .route("/events/new", get(http_blank_form))
        .route("/events/:event_id", get(http_details).put(http_edit))
        .route("/events/:event_id/edit", get(http_editable_form))
        .route("/events/:event_id/join", post(http_join))
        .route("/events/:event_id/leave", post(http_leave))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ApiError>)> {
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(reject(ApiError::new(
            ErrorCode::Validation,
            "display name cannot be empty",
        )));
    }
    let user_id = state
        .api
        .storage
        .create_user(display_name)
        .await
        .map_err(|e| reject(ApiError::new(ErrorCode::Internal, e.to_string())))?;
    Ok(Json(LoginResponse { user_id: user_id.0 }))
}

async fn http_list_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EventSummary>>, (StatusCode, Json<ApiError>)> {
    let events = list_all(&state.api).await.map_err(reject)?;
    Ok(Json(events))
}

async fn http_list_joined(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> Result<Json<Vec<EventSummary>>, (StatusCode, Json<ApiError>)> {
    let events = list_joined(&state.api, UserId(q.user_id))
        .await
        .map_err(reject)?;
    Ok(Json(events))
}

async fn http_blank_form(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EventForm>, (StatusCode, Json<ApiError>)> {
    let form = blank_form(&state.api).await.map_err(reject)?;
    Ok(Json(form))
}

async fn http_create(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
    Json(input): Json<EventFormInput>,
) -> Response {
    match create(&state.api, UserId(q.user_id), &input).await {
        Ok(event_id) => (
            StatusCode::CREATED,
            Json(CreatedResponse {
                event_id: event_id.0,
            }),
        )
            .into_response(),
        Err(err) => form_rejection(&state.api, &input, err).await,
    }
}

async fn http_details(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> Result<Json<EventDetails>, (StatusCode, Json<ApiError>)> {
    let details = get_details(&state.api, EventId(event_id))
        .await
        .map_err(reject)?;
    Ok(Json(details))
}

async fn http_editable_form(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Query(q): Query<UserQuery>,
) -> Result<Json<EventForm>, (StatusCode, Json<ApiError>)> {
    let form = get_editable_form(&state.api, EventId(event_id), UserId(q.user_id))
        .await
        .map_err(reject)?;
    Ok(Json(form))
}

async fn http_edit(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Query(q): Query<UserQuery>,
    Json(input): Json<EventFormInput>,
) -> Response {
    match edit(&state.api, EventId(event_id), UserId(q.user_id), &input).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => form_rejection(&state.api, &input, err).await,
    }
}

async fn http_join(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Query(q): Query<UserQuery>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    join(&state.api, EventId(event_id), UserId(q.user_id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_leave(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Query(q): Query<UserQuery>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    leave(&state.api, EventId(event_id), UserId(q.user_id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Validation failures echo the submitted form (with the type lookup
/// re-attached) so the client can re-render it with the entered values
/// preserved. Every other error returns the bare error body.
async fn form_rejection(api: &ApiContext, input: &EventFormInput, err: ApiError) -> Response {
    if err.code != ErrorCode::Validation {
        return reject(err).into_response();
    }
    match rejected_form(api, input).await {
        Ok(form) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": err, "form": form })),
        )
            .into_response(),
        Err(other) => reject(other).into_response(),
    }
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    (status_for(err.code), Json(err))
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::NotFound | ErrorCode::ParticipationNotFound => StatusCode::NOT_FOUND,
        ErrorCode::Unauthorized => StatusCode::FORBIDDEN,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
