use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};

use rewired_types::api::{ApiResponse, Claims, PageQuery, Pagination, UserPage, UserStatusRequest};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_admin;

pub async fn public_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.db.public_profile(id)?;
    Ok(Json(ApiResponse::data(profile)))
}

pub async fn user_products(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .db
        .seller_products(id, rewired_types::models::ProductStatus::Available)?;
    Ok(Json(ApiResponse::data(products)))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;
    let limit = query.limit.clamp(1, 100);
    let page = query.page.max(1);

    let (users, total) = state.db.list_users(page, limit)?;
    Ok(Json(ApiResponse::data(UserPage {
        users,
        pagination: Pagination::new(page, limit, total),
    })))
}

pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UserStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;

    state.db.set_user_active(id, req.is_active)?;
    Ok(Json(ApiResponse::message("User status updated successfully")))
}
