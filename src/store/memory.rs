//! In-memory store implementations.
//!
//! Back the integration tests (and ad-hoc experiments) with the same
//! observable behaviour as the Postgres stores: one cart per identity,
//! products resolved at read time, order placement clearing the source cart
//! under a single lock.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{CartStore, OrderStore, Page, ProductFilter, ProductStore, StoreError, UserStore};
use crate::auth::Identity;
use crate::domain::cart::{Cart, CartLineItem};
use crate::domain::order::Order;
use crate::domain::product::{Product, Size};
use crate::domain::user::User;

struct StoredLine {
    product_id: Uuid,
    size: Size,
    quantity: u32,
}

struct StoredCart {
    cart: Cart,
    lines: Vec<StoredLine>,
}

#[derive(Default)]
struct Inner {
    products: Vec<Product>,
    carts: Vec<StoredCart>,
    orders: Vec<Order>,
    users: Vec<User>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        let store = Self::new();
        store.lock().products = products;
        store
    }

    pub fn add_product(&self, product: Product) {
        self.lock().products.push(product);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Inner {
    fn matches(&self, product: &Product, filter: &ProductFilter) -> bool {
        if let Some(q) = &filter.q {
            let q = q.to_lowercase();
            if !product.name.to_lowercase().contains(&q)
                && !product.description.to_lowercase().contains(&q)
            {
                return false;
            }
        }
        if let Some(category) = filter.category {
            if product.category != category {
                return false;
            }
        }
        if let Some(size) = filter.size {
            if !product.has_size(size) {
                return false;
            }
        }
        if let Some(min) = filter.min_price {
            if product.price < min {
                return false;
            }
        }
        if let Some(max) = filter.max_price {
            if product.price > max {
                return false;
            }
        }
        true
    }

    fn resolve(&self, stored: &StoredCart) -> Cart {
        let items = stored
            .lines
            .iter()
            .filter_map(|line| {
                self.products
                    .iter()
                    .find(|p| p.id == line.product_id)
                    .map(|product| CartLineItem {
                        product: product.clone(),
                        size: line.size,
                        quantity: line.quantity,
                    })
            })
            .collect();
        Cart {
            items,
            ..stored.cart.clone()
        }
    }

    fn cart_for(&self, owner: &Identity) -> Option<&StoredCart> {
        self.carts.iter().find(|c| match owner {
            Identity::User(id) => c.cart.user_id == Some(*id),
            Identity::Guest(guest) => c.cart.guest_id.as_deref() == Some(guest.as_str()),
        })
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn list(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<(Vec<Product>, u64), StoreError> {
        let inner = self.lock();
        let mut matches: Vec<Product> = inner
            .products
            .iter()
            .filter(|p| inner.matches(p, filter))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matches.len() as u64;
        let products = matches
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        Ok((products, total))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.lock().products.iter().find(|p| p.id == id).cloned())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn find(&self, owner: &Identity) -> Result<Option<Cart>, StoreError> {
        let inner = self.lock();
        Ok(inner.cart_for(owner).map(|stored| inner.resolve(stored)))
    }

    async fn find_or_create(&self, owner: &Identity) -> Result<Cart, StoreError> {
        let mut inner = self.lock();
        if let Some(stored) = inner.cart_for(owner) {
            return Ok(inner.resolve(stored));
        }
        let (user_id, guest_id) = match owner {
            Identity::User(id) => (Some(*id), None),
            Identity::Guest(guest) => (None, Some(guest.clone())),
        };
        let now = Utc::now();
        let cart = Cart {
            id: Uuid::new_v4(),
            user_id,
            guest_id,
            items: vec![],
            created_at: now,
            updated_at: now,
        };
        inner.carts.push(StoredCart {
            cart: cart.clone(),
            lines: vec![],
        });
        Ok(cart)
    }

    async fn save_items(&self, cart_id: Uuid, items: &[CartLineItem]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let stored = inner
            .carts
            .iter_mut()
            .find(|c| c.cart.id == cart_id)
            .ok_or_else(|| StoreError::Invalid(format!("no cart {cart_id}")))?;
        stored.lines = items
            .iter()
            .map(|item| StoredLine {
                product_id: item.product.id,
                size: item.size,
                quantity: item.quantity,
            })
            .collect();
        stored.cart.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn place(&self, order: &Order, cart_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.orders.push(order.clone());
        if let Some(stored) = inner.carts.iter_mut().find(|c| c.cart.id == cart_id) {
            stored.lines.clear();
            stored.cart.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .iter()
            .filter(|o| o.user_id == Some(user_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate);
        }
        inner.users.push(user.clone());
        Ok(())
    }

    async fn by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }
}
