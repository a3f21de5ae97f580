use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::auth::AppState;
use crate::middleware::require_auth;
use crate::{auth, categories, messages, products, transactions, users};

/// The full API surface. Layers (CORS, tracing, static assets) are applied
/// by the binary.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/categories", get(categories::list))
        .route("/api/categories/{id}", get(categories::get))
        .route("/api/categories/{id}/products", get(categories::products))
        .route("/api/products", get(products::list))
        .route("/api/products/{id}", get(products::detail))
        .route("/api/products/seller/{id}", get(products::by_seller))
        .route("/api/users/{id}/profile", get(users::public_profile))
        .route("/api/users/{id}/products", get(users::user_products))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/api/auth/profile", get(auth::profile))
        .route("/api/auth/profile", put(auth::update_profile))
        .route("/api/auth/change-password", post(auth::change_password))
        .route("/api/users", get(users::list))
        .route("/api/users/{id}/status", put(users::set_status))
        .route("/api/users/messages", post(messages::send))
        .route("/api/users/messages", get(messages::list))
        .route("/api/users/messages/{id}/read", put(messages::mark_read))
        .route("/api/categories", post(categories::create))
        .route("/api/categories/{id}", put(categories::update))
        .route("/api/categories/{id}", delete(categories::delete))
        .route("/api/products", post(products::create))
        .route("/api/products/{id}", put(products::update))
        .route("/api/products/{id}", delete(products::delete))
        .route("/api/products/{id}/favorite", post(products::toggle_favorite))
        .route("/api/products/favorites/my", get(products::my_favorites))
        .route("/api/transactions", post(transactions::create))
        .route("/api/transactions/my", get(transactions::my_transactions))
        .route(
            "/api/transactions/my/purchases",
            get(transactions::my_purchases),
        )
        .route("/api/transactions/my/sales", get(transactions::my_sales))
        .route("/api/transactions/{id}", get(transactions::get))
        .route(
            "/api/transactions/{id}/status",
            put(transactions::update_status),
        )
        .route(
            "/api/transactions/{id}/tracking",
            put(transactions::set_tracking),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    public.merge(protected)
}
