use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use jsonwebtoken::{encode, EncodingKey, Header};

use rewired_db::models::NewUser;
use rewired_db::Database;
use rewired_types::api::{
    ApiResponse, AuthResponse, ChangePasswordRequest, Claims, LoginRequest, RegisterRequest,
    UpdateProfileRequest,
};
use rewired_types::models::PublicUser;

use crate::error::{internal, ApiError};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.len() < 3 {
        return Err(ApiError::validation(
            "Username must be at least 3 characters",
        ));
    }
    if !req.email.contains('@') || req.email.len() < 5 {
        return Err(ApiError::validation("Invalid email address"));
    }
    if req.password.len() < 6 {
        return Err(ApiError::validation(
            "Password must be at least 6 characters",
        ));
    }
    if req.full_name.trim().is_empty() {
        return Err(ApiError::validation("Full name is required"));
    }

    let password_hash = hash_password(&req.password)?;

    let user = state.db.create_user(&NewUser {
        username: &req.username,
        email: &req.email,
        password_hash: &password_hash,
        full_name: &req.full_name,
        phone: req.phone.as_deref(),
        address: req.address.as_deref(),
        city: req.city.as_deref(),
        state: req.state.as_deref(),
        zip_code: req.zip_code.as_deref(),
    })?;

    let user = user.into_public();
    let token = create_token(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "User registered successfully",
            AuthResponse { user, token },
        )),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_active_user_by_email(&req.email)?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    verify_password(&req.password, &user.password)
        .map_err(|_| ApiError::unauthorized("Invalid credentials"))?;

    // Last-login stamp
    state.db.touch_user(user.id)?;

    let user = user.into_public();
    let token = create_token(&state, &user)?;

    Ok(Json(ApiResponse::with_message(
        "Login successful",
        AuthResponse { user, token },
    )))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_id(claims.sub)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(ApiResponse::data(user.into_public())))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(name) = &req.full_name {
        if name.trim().is_empty() {
            return Err(ApiError::validation("Full name is required"));
        }
    }

    let user = state.db.update_profile(claims.sub, &req)?;
    Ok(Json(ApiResponse::with_message(
        "Profile updated successfully",
        user.into_public(),
    )))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.new_password.len() < 6 {
        return Err(ApiError::validation(
            "New password must be at least 6 characters",
        ));
    }

    let current_hash = state.db.password_hash(claims.sub)?;
    verify_password(&req.current_password, &current_hash)
        .map_err(|_| ApiError::unauthorized("Current password is incorrect"))?;

    let new_hash = hash_password(&req.new_password)?;
    state.db.set_password(claims.sub, &new_hash)?;

    Ok(Json(ApiResponse::message("Password changed successfully")))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| internal("password hashing failed", e))
}

fn verify_password(password: &str, hash: &str) -> Result<(), argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    Argon2::default().verify_password(password.as_bytes(), &parsed)
}

fn create_token(state: &AppState, user: &PublicUser) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        exp: (chrono::Utc::now() + chrono::Duration::hours(state.token_ttl_hours)).timestamp()
            as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(|e| internal("token encoding failed", e))
}
