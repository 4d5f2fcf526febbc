//! Checkout and order listing.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthUser, Identity, MaybeUser};
use crate::domain::order::{CheckoutError, Order};
use crate::email;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub address: Option<String>,
    pub guest_id: Option<String>,
    /// Guest contact; ignored for authenticated checkouts.
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub message: String,
    pub order: Order,
}

pub async fn checkout(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    // A guest order must be reachable by email; an account order uses the
    // account's address.
    let guest_email = match user {
        Some(_) => None,
        None => match (req.guest_id.as_deref(), req.email.as_deref()) {
            (Some(guest), Some(email)) if !guest.is_empty() && !email.is_empty() => {
                Some(email.to_string())
            }
            _ => return Err(CheckoutError::GuestContactRequired.into()),
        },
    };

    let address = req.address.as_deref().map(str::trim).unwrap_or("");
    if address.is_empty() {
        return Err(CheckoutError::AddressRequired.into());
    }

    let owner = Identity::resolve(user, req.guest_id)?;
    let cart = state
        .carts
        .find(&owner)
        .await?
        .ok_or(CheckoutError::EmptyCart)?;
    let order = Order::from_cart(&cart, address)?;

    let (customer_name, recipient) = match user {
        Some(id) => {
            let account = state
                .users
                .by_id(id)
                .await?
                .ok_or(AppError::Unauthorized)?;
            (account.name, account.email)
        }
        None => ("Guest User".to_string(), guest_email.unwrap_or_default()),
    };

    state.orders.place(&order, cart.id).await?;

    // Order durability beats notification delivery: from here on, mail
    // problems are logged and the checkout still succeeds.
    deliver(
        &state,
        email::order_confirmation(&customer_name, &recipient, &order),
        "confirmation",
        order.id,
    )
    .await;
    if let Some(operator) = state.operator_email.as_deref() {
        deliver(
            &state,
            email::order_alert(&customer_name, &recipient, operator, &order),
            "operator alert",
            order.id,
        )
        .await;
    }

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            message: "Order placed successfully".to_string(),
            order,
        }),
    ))
}

pub async fn my_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.for_user(user_id).await?))
}

async fn deliver(
    state: &AppState,
    rendered: Result<email::Email, email::DeliveryError>,
    kind: &str,
    order_id: Uuid,
) {
    match rendered {
        Ok(mail) => {
            if let Err(err) = state.mailer.send(mail).await {
                tracing::warn!(error = %err, %order_id, kind, "order email failed");
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, %order_id, kind, "order email failed to render");
        }
    }
}
