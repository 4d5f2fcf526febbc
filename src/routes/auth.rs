//! Registration, login and the current-account endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{self, AuthUser};
use crate::domain::user::{PublicUser, User};
use crate::error::AppError;
use crate::store::StoreError;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "All fields are required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    req.validate()
        .map_err(|errors| AppError::BadRequest(first_message(&errors)))?;
    let user = User {
        id: Uuid::new_v4(),
        name: req.name,
        email: req.email,
        password_hash: auth::hash_password(&req.password)?,
        created_at: Utc::now(),
    };
    match state.users.create(&user).await {
        Ok(()) => {}
        Err(StoreError::Duplicate) => {
            return Err(AppError::BadRequest("Email already in use".to_string()))
        }
        Err(err) => return Err(err.into()),
    }
    let token = state.tokens.issue(user.id)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: PublicUser::from(&user),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .users
        .by_email(&req.email)
        .await?
        .filter(|user| auth::verify_password(&req.password, &user.password_hash))
        .ok_or_else(|| AppError::BadRequest("Invalid email or password".to_string()))?;
    let token = state.tokens.issue(user.id)?;
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = state
        .users
        .by_id(user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(PublicUser::from(&user)))
}

fn first_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .into_values()
        .flatten()
        .find_map(|error| error.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "All fields are required".to_string())
}
