use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use rewired_api::{router, AppStateInner};
use rewired_db::Database;

fn app() -> Router {
    let db = Database::open_in_memory().unwrap();
    router(Arc::new(AppStateInner {
        db,
        jwt_secret: "test-secret".into(),
        token_ttl_hours: 1,
    }))
}

async fn send(
    app: &Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Registers a user and returns their bearer token.
async fn register(app: &Router, username: &str, email: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": email,
            "password": "hunter22",
            "full_name": format!("{} Example", username),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn first_category_id(app: &Router) -> i64 {
    let (status, body) = send(app, Method::GET, "/api/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    body["data"][0]["id"].as_i64().unwrap()
}

async fn create_product(app: &Router, token: &str, price: f64, quantity: i64) -> i64 {
    let category_id = first_category_id(app).await;
    let (status, body) = send(
        app,
        Method::POST,
        "/api/products",
        Some(token),
        Some(json!({
            "title": "Used camera body",
            "description": "Shutter count 12k",
            "price": price,
            "condition": "good",
            "category_id": category_id,
            "quantity": quantity,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn register_and_login_roundtrip() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "hunter22",
            "full_name": "Alice Example",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    assert!(body["data"]["token"].as_str().is_some());
    // The stored hash never appears in a response
    assert!(body["data"]["user"].get("password").is_none());

    // Duplicate email conflicts
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "alice2",
            "email": "alice@example.com",
            "password": "hunter22",
            "full_name": "Alice Again",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));

    // Wrong password
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Correct credentials
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["user"].get("password").is_none());
    assert_eq!(body["data"]["user"]["username"], json!("alice"));
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = app();

    let (status, _) = send(&app, Method::GET, "/api/auth/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/auth/profile",
        Some("not-a-real-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn purchase_and_cancel_flow() {
    let app = app();
    let seller = register(&app, "seller", "seller@example.com").await;
    let buyer = register(&app, "buyer", "buyer@example.com").await;

    let product_id = create_product(&app, &seller, 100.0, 1).await;

    // Buyer purchases the single unit
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/transactions",
        Some(&buyer),
        Some(json!({
            "product_id": product_id,
            "quantity": 1,
            "shipping_address": "1 Main St",
            "payment_method": "card",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], json!("pending"));
    assert_eq!(body["data"]["total_price"], json!(100.0));
    let tx_id = body["data"]["id"].as_i64().unwrap();

    // Product is now sold out
    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/products/{}", product_id),
        None,
        None,
    )
    .await;
    assert_eq!(body["data"]["status"], json!("sold"));
    assert_eq!(body["data"]["quantity"], json!(0));

    // The buyer cannot drive the status
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/transactions/{}/status", tx_id),
        Some(&buyer),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Seller cancels; the unit is restocked
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/transactions/{}/status", tx_id),
        Some(&seller),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/products/{}", product_id),
        None,
        None,
    )
    .await;
    assert_eq!(body["data"]["status"], json!("available"));
    assert_eq!(body["data"]["quantity"], json!(1));
}

#[tokio::test]
async fn over_quantity_purchase_fails_cleanly() {
    let app = app();
    let seller = register(&app, "seller", "seller@example.com").await;
    let buyer = register(&app, "buyer", "buyer@example.com").await;
    let product_id = create_product(&app, &seller, 10.0, 2).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/transactions",
        Some(&buyer),
        Some(json!({
            "product_id": product_id,
            "quantity": 5,
            "shipping_address": "1 Main St",
            "payment_method": "card",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/products/{}", product_id),
        None,
        None,
    )
    .await;
    assert_eq!(body["data"]["quantity"], json!(2));
    assert_eq!(body["data"]["status"], json!("available"));
}

#[tokio::test]
async fn product_listing_paginates() {
    let app = app();
    let seller = register(&app, "seller", "seller@example.com").await;
    for _ in 0..3 {
        create_product(&app, &seller, 25.0, 1).await;
    }

    let (status, body) = send(&app, Method::GET, "/api/products?limit=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["products"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["pagination"]["total"], json!(3));
    assert_eq!(body["data"]["pagination"]["totalPages"], json!(2));

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/products?limit=2&page=2",
        None,
        None,
    )
    .await;
    assert_eq!(body["data"]["products"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_sort_and_condition_params_degrade_gracefully() {
    let app = app();
    let seller = register(&app, "seller", "seller@example.com").await;
    create_product(&app, &seller, 50.0, 1).await;
    create_product(&app, &seller, 10.0, 1).await;

    // Unrecognized sortBy falls back to created_at instead of a 400
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/products?sortBy=bogus&order=sideways",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["products"].as_array().unwrap().len(), 2);

    // Unrecognized condition drops the filter
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/products?condition=mint",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total"], json!(2));
}

#[tokio::test]
async fn only_the_seller_edits_a_product() {
    let app = app();
    let seller = register(&app, "seller", "seller@example.com").await;
    let other = register(&app, "other", "other@example.com").await;
    let product_id = create_product(&app, &seller, 10.0, 1).await;

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/products/{}", product_id),
        Some(&other),
        Some(json!({ "price": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/products/{}", product_id),
        Some(&seller),
        Some(json!({ "price": 15.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["price"], json!(15.0));
}

#[tokio::test]
async fn bad_image_urls_are_rejected() {
    let app = app();
    let seller = register(&app, "seller", "seller@example.com").await;
    let category_id = first_category_id(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/products",
        Some(&seller),
        Some(json!({
            "title": "Keyboard",
            "description": "Mechanical",
            "price": 30.0,
            "condition": "fair",
            "category_id": category_id,
            "image_url": "javascript:alert(1)",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid image URL"));
}

#[tokio::test]
async fn favorite_toggle_round_trips_over_http() {
    let app = app();
    let seller = register(&app, "seller", "seller@example.com").await;
    let buyer = register(&app, "buyer", "buyer@example.com").await;
    let product_id = create_product(&app, &seller, 10.0, 1).await;

    let path = format!("/api/products/{}/favorite", product_id);
    let (status, body) = send(&app, Method::POST, &path, Some(&buyer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["favorited"], json!(true));

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/products/favorites/my",
        Some(&buyer),
        None,
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = send(&app, Method::POST, &path, Some(&buyer), None).await;
    assert_eq!(body["data"]["favorited"], json!(false));
}

#[tokio::test]
async fn messaging_inbox_and_read_receipts() {
    let app = app();
    let seller = register(&app, "seller", "seller@example.com").await;
    let buyer = register(&app, "buyer", "buyer@example.com").await;
    let product_id = create_product(&app, &seller, 10.0, 1).await;

    // Look up the seller id from the product
    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/products/{}", product_id),
        None,
        None,
    )
    .await;
    let seller_id = body["data"]["seller_id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/messages",
        Some(&buyer),
        Some(json!({
            "receiver_id": seller_id,
            "product_id": product_id,
            "subject": "Still available?",
            "body": "Interested in the camera.",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let message_id = body["data"]["id"].as_i64().unwrap();

    let (_, body) = send(&app, Method::GET, "/api/users/messages", Some(&seller), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["is_read"], json!(false));

    // Sender cannot mark it read
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/users/messages/{}/read", message_id),
        Some(&buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/users/messages/{}/read", message_id),
        Some(&seller),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
