//! Cart routes.
//!
//! Reading one's own cart requires a valid token; the guest read takes the
//! guest id from the path. Mutations accept either a bearer token or a
//! `guestId` in the body, with a bad token deliberately degrading to the
//! guest path (see `crate::auth::MaybeUser`).

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{AuthUser, Identity, MaybeUser};
use crate::domain::cart::Cart;
use crate::domain::product::{Product, Size};
use crate::error::AppError;
use crate::AppState;

pub async fn get_own(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Cart>, AppError> {
    let cart = state.carts.find_or_create(&Identity::User(user_id)).await?;
    Ok(Json(cart))
}

pub async fn get_guest(
    State(state): State<AppState>,
    Path(guest_id): Path<String>,
) -> Result<Json<Cart>, AppError> {
    let cart = state
        .carts
        .find_or_create(&Identity::Guest(guest_id))
        .await?;
    Ok(Json(cart))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub size: String,
    pub quantity: i64,
    pub guest_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub product_id: Uuid,
    pub size: String,
    pub quantity: i64,
    pub guest_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemRequest {
    pub product_id: Uuid,
    pub size: String,
    pub guest_id: Option<String>,
}

pub async fn add_item(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<Cart>, AppError> {
    let product = resolve_product(&state, req.product_id).await?;
    let size = parse_size(&req.size)?;
    let owner = Identity::resolve(user, req.guest_id)?;

    let mut cart = state.carts.find_or_create(&owner).await?;
    cart.add_item(&product, size, req.quantity)?;
    state.carts.save_items(cart.id, &cart.items).await?;

    reloaded(&state, &owner).await
}

pub async fn update_item(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<Cart>, AppError> {
    let size = parse_size(&req.size)?;
    let owner = Identity::resolve(user, req.guest_id)?;

    let mut cart = state.carts.find_or_create(&owner).await?;
    cart.set_item_quantity(req.product_id, size, req.quantity)?;
    state.carts.save_items(cart.id, &cart.items).await?;

    reloaded(&state, &owner).await
}

pub async fn remove_item(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(req): Json<RemoveItemRequest>,
) -> Result<Json<Cart>, AppError> {
    let size = parse_size(&req.size)?;
    let owner = Identity::resolve(user, req.guest_id)?;

    let mut cart = state.carts.find_or_create(&owner).await?;
    cart.remove_item(req.product_id, size);
    state.carts.save_items(cart.id, &cart.items).await?;

    reloaded(&state, &owner).await
}

async fn resolve_product(state: &AppState, id: Uuid) -> Result<Product, AppError> {
    state
        .products
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

fn parse_size(raw: &str) -> Result<Size, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid size for this product".to_string()))
}

/// Mutations respond with the cart as re-read, so line items carry freshly
/// resolved product data.
async fn reloaded(state: &AppState, owner: &Identity) -> Result<Json<Cart>, AppError> {
    Ok(Json(state.carts.find_or_create(owner).await?))
}
