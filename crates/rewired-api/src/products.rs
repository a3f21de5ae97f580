use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use url::Url;

use rewired_types::api::{
    ApiResponse, Claims, CreateProductRequest, FavoriteState, Pagination, ProductPage,
    ProductQuery, SellerProductsQuery, UpdateProductRequest,
};
use rewired_types::models::{ProductStatus, Role};

use crate::auth::AppState;
use crate::error::{internal, ApiError};

const MAX_PAGE_SIZE: u32 = 100;

/// Image input is a URL string, accepted only with an http/https scheme.
fn validate_image_url(image_url: Option<&str>) -> Result<(), ApiError> {
    if let Some(raw) = image_url {
        let valid = Url::parse(raw)
            .map(|u| u.scheme() == "http" || u.scheme() == "https")
            .unwrap_or(false);
        if !valid {
            return Err(ApiError::validation("Invalid image URL"));
        }
    }
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    Query(mut query): Query<ProductQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query.limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    query.page = query.page.max(1);
    let (page, limit) = (query.page, query.limit);

    // Run the blocking query off the async runtime
    let db = state.clone();
    let (products, total) = tokio::task::spawn_blocking(move || db.db.list_products(&query))
        .await
        .map_err(|e| internal("spawn_blocking join error", e))??;

    Ok(Json(ApiResponse::data(ProductPage {
        products,
        pagination: Pagination::new(page, limit, total),
    })))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.db.product_detail(id)?;
    Ok(Json(ApiResponse::data(product)))
}

pub async fn by_seller(
    State(state): State<AppState>,
    Path(seller_id): Path<i64>,
    Query(query): Query<SellerProductsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query.status.unwrap_or(ProductStatus::Available);
    let products = state.db.seller_products(seller_id, status)?;
    Ok(Json(ApiResponse::data(products)))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::validation("Title is required"));
    }
    if req.description.trim().is_empty() {
        return Err(ApiError::validation("Description is required"));
    }
    if req.price < 0.0 {
        return Err(ApiError::validation("Price must be a positive number"));
    }
    if req.quantity.is_some_and(|q| q < 1) {
        return Err(ApiError::validation("Quantity must be at least 1"));
    }
    validate_image_url(req.image_url.as_deref())?;

    let product = state.db.insert_product(claims.sub, &req)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Product created successfully",
            product,
        )),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.price.is_some_and(|p| p < 0.0) {
        return Err(ApiError::validation("Price must be a positive number"));
    }
    if req.quantity.is_some_and(|q| q < 1) {
        return Err(ApiError::validation("Quantity must be at least 1"));
    }
    validate_image_url(req.image_url.as_deref())?;

    let product = state.db.update_product(id, claims.sub, &req)?;
    Ok(Json(ApiResponse::with_message(
        "Product updated successfully",
        product,
    )))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .soft_delete_product(id, claims.sub, claims.role == Role::Admin)?;
    Ok(Json(ApiResponse::message("Product deleted successfully")))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let favorited = state.db.toggle_favorite(claims.sub, id)?;
    let message = if favorited {
        "Product added to favorites"
    } else {
        "Product removed from favorites"
    };
    Ok(Json(ApiResponse::with_message(
        message,
        FavoriteState { favorited },
    )))
}

pub async fn my_favorites(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state.db.favorites_for(claims.sub)?;
    Ok(Json(ApiResponse::data(products)))
}
