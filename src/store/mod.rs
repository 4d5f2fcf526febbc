//! Storage traits and their shared error type.
//!
//! Handlers only see these traits; `postgres` implements them over sqlx and
//! `memory` over a mutexed map for tests and offline work.
//!
//! Cart mutation is read-modify-write: the handler loads the cart, applies
//! the change in memory and writes the full line list back via
//! [`CartStore::save_items`]. Two concurrent mutations of the same cart can
//! therefore lose one update; a version column with a conditional write is
//! the known strengthening if that ever matters.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::Identity;
use crate::domain::cart::{Cart, CartLineItem};
use crate::domain::order::Order;
use crate::domain::product::{Category, Product, Size};
use crate::domain::user::User;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate key")]
    Duplicate,

    /// A stored value no longer maps onto the domain (e.g. an unknown size
    /// string in a row).
    #[error("invalid stored value: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    /// Case-insensitive substring match against name or description.
    pub q: Option<String>,
    pub category: Option<Category>,
    /// Keep only products offering this size.
    pub size: Option<Size>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn offset(&self) -> u32 {
        (self.page - 1) * self.limit
    }
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// One page of matches, newest first, plus the unpaged match count.
    async fn list(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<(Vec<Product>, u64), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// The identity's cart with all products resolved, if one exists.
    async fn find(&self, owner: &Identity) -> Result<Option<Cart>, StoreError>;

    /// As [`CartStore::find`], but lazily creates an empty cart bound to the
    /// identity. At most one cart ever exists per identity.
    async fn find_or_create(&self, owner: &Identity) -> Result<Cart, StoreError>;

    /// Replace the cart's line items wholesale, preserving their order.
    async fn save_items(&self, cart_id: Uuid, items: &[CartLineItem]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist the order and clear the source cart's items as one logical
    /// transaction. The cart record itself survives, empty.
    async fn place(&self, order: &Order, cart_id: Uuid) -> Result<(), StoreError>;

    /// The user's orders, newest first.
    async fn for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the email is taken.
    async fn create(&self, user: &User) -> Result<(), StoreError>;

    async fn by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
}
