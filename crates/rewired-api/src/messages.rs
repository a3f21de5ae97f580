use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use rewired_types::api::{ApiResponse, Claims, MessageQuery, SendMessageRequest};

use crate::auth::AppState;
use crate::error::ApiError;

pub async fn send(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.body.trim().is_empty() {
        return Err(ApiError::validation("Message body is required"));
    }

    let message = state.db.send_message(claims.sub, &req)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Message sent successfully", message)),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state.db.list_messages(claims.sub, query.kind)?;
    Ok(Json(ApiResponse::data(messages)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.mark_message_read(id, claims.sub)?;
    Ok(Json(ApiResponse::message("Message marked as read")))
}
