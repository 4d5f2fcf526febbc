//! HTTP surface: route wiring and request handlers.

pub mod auth;
pub mod cart;
pub mod orders;
pub mod products;

use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/products", get(products::list))
        .route("/api/products/:id", get(products::get_one))
        .route("/api/cart", get(cart::get_own))
        .route("/api/cart/guest/:guest_id", get(cart::get_guest))
        .route("/api/cart/add", post(cart::add_item))
        .route(
            "/api/cart/item",
            axum::routing::patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/api/orders/checkout", post(orders::checkout))
        .route("/api/orders/my", get(orders::my_orders))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "clothier" }))
}
