//! Request-level error handling.
//!
//! Every handler returns `Result<_, AppError>`; the `IntoResponse` impl maps
//! the error onto the status taxonomy and a `{ "message": ... }` body.
//! Internal failures keep their detail in the server log only.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::domain::cart::CartError;
use crate::domain::order::CheckoutError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed input.
    #[error("{0}")]
    BadRequest(String),

    /// Product or cart item does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Missing or invalid credential on a protected route.
    #[error("Not authorized")]
    Unauthorized,

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Anything else unexpected.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ItemNotFound => AppError::NotFound(err.to_string()),
            CartError::InvalidQuantity | CartError::InvalidSize => {
                AppError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "Server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
