use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use rewired_types::api::{
    ApiResponse, Claims, CreateCategoryRequest, PageQuery, Pagination, ProductPage,
    UpdateCategoryRequest,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_admin;

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = state.db.list_categories()?;
    Ok(Json(ApiResponse::data(categories)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state.db.get_category(id)?;
    Ok(Json(ApiResponse::data(category)))
}

pub async fn products(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.clamp(1, 100);
    let page = query.page.max(1);

    // 404 for unknown/inactive categories rather than an empty page
    state.db.get_category(id)?;

    let (products, total) = state.db.category_products(id, page, limit)?;
    Ok(Json(ApiResponse::data(ProductPage {
        products,
        pagination: Pagination::new(page, limit, total),
    })))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("Category name is required"));
    }

    let category = state.db.create_category(&req)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Category created successfully",
            category,
        )),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;

    let category = state.db.update_category(id, &req)?;
    Ok(Json(ApiResponse::with_message(
        "Category updated successfully",
        category,
    )))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;

    state.db.delete_category(id)?;
    Ok(Json(ApiResponse::message("Category deleted successfully")))
}
