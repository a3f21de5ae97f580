use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use rewired_types::api::{
    ApiResponse, Claims, CreateTransactionRequest, Pagination, TrackingRequest, TransactionPage,
    TransactionQuery, UpdateTransactionStatusRequest,
};

use crate::auth::AppState;
use crate::error::{internal, ApiError};

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.shipping_address.trim().is_empty() {
        return Err(ApiError::validation("Shipping address is required"));
    }
    if req.payment_method.trim().is_empty() {
        return Err(ApiError::validation("Payment method is required"));
    }

    let transaction = state.db.create_transaction(claims.sub, &req)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Transaction created successfully",
            transaction,
        )),
    ))
}

pub async fn my_transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<TransactionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.clamp(1, 100);
    let page = query.page.max(1);
    let user_id = claims.sub;

    let db = state.clone();
    let (transactions, total) =
        tokio::task::spawn_blocking(move || db.db.my_transactions(user_id, query.status, page, limit))
            .await
            .map_err(|e| internal("spawn_blocking join error", e))??;

    Ok(Json(ApiResponse::data(TransactionPage {
        transactions,
        pagination: Pagination::new(page, limit, total),
    })))
}

pub async fn my_purchases(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let purchases = state.db.my_purchases(claims.sub)?;
    Ok(Json(ApiResponse::data(purchases)))
}

pub async fn my_sales(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let sales = state.db.my_sales(claims.sub)?;
    Ok(Json(ApiResponse::data(sales)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = state.db.get_transaction(id, claims.sub)?;
    Ok(Json(ApiResponse::data(transaction)))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateTransactionStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = state
        .db
        .update_transaction_status(id, claims.sub, req.status)?;
    Ok(Json(ApiResponse::with_message(
        "Transaction status updated successfully",
        transaction,
    )))
}

pub async fn set_tracking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TrackingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.tracking_number.trim().is_empty() {
        return Err(ApiError::validation("Tracking number is required"));
    }

    state
        .db
        .set_tracking_number(id, claims.sub, &req.tracking_number)?;
    Ok(Json(ApiResponse::message("Tracking number added successfully")))
}
