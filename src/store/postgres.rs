//! sqlx-backed store implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{CartStore, OrderStore, Page, ProductFilter, ProductStore, StoreError, UserStore};
use crate::auth::Identity;
use crate::domain::cart::{Cart, CartLineItem};
use crate::domain::order::{Order, OrderLineItem};
use crate::domain::product::Product;
use crate::domain::user::User;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, image_url, category, sizes, created_at, updated_at";

const PRODUCT_COLUMNS_PREFIXED: &str = "p.id, p.name, p.description, p.price, p.image_url, \
     p.category, p.sizes, p.created_at, p.updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    price: Decimal,
    image_url: String,
    category: String,
    sizes: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let category = row
            .category
            .parse()
            .map_err(|_| StoreError::Invalid(format!("product category {:?}", row.category)))?;
        let sizes = row
            .sizes
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| StoreError::Invalid(format!("product sizes {:?}", row.sizes)))?;
        Ok(Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            image_url: row.image_url,
            category,
            sizes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Option<Uuid>,
    guest_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    size: String,
    quantity: i32,
    #[sqlx(flatten)]
    product: ProductRow,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Option<Uuid>,
    guest_id: Option<String>,
    address: String,
    total_price: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: Uuid,
    product_id: Uuid,
    name: String,
    size: String,
    quantity: i32,
    unit_price: Decimal,
}

impl OrderItemRow {
    fn into_line(self) -> Result<OrderLineItem, StoreError> {
        let size = self
            .size
            .parse()
            .map_err(|_| StoreError::Invalid(format!("order item size {:?}", self.size)))?;
        Ok(OrderLineItem {
            product_id: self.product_id,
            name: self.name,
            size,
            quantity: self.quantity as u32,
            unit_price: self.unit_price,
        })
    }
}

fn push_product_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    query.push(" WHERE TRUE");
    if let Some(q) = &filter.q {
        let pattern = format!("%{q}%");
        query
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = filter.category {
        query.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(size) = filter.size {
        query.push(" AND ").push_bind(size.as_str()).push(" = ANY(sizes)");
    }
    if let Some(min) = filter.min_price {
        query.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        query.push(" AND price <= ").push_bind(max);
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map_or(false, |code| code == "23505")
}

#[async_trait]
impl ProductStore for PgStore {
    async fn list(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<(Vec<Product>, u64), StoreError> {
        let mut query =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_product_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(&self.pool).await?;
        let products = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok((products, total as u64))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Product::try_from).transpose()
    }
}

impl PgStore {
    async fn cart_row(&self, owner: &Identity) -> Result<Option<CartRow>, StoreError> {
        let row = match owner {
            Identity::User(id) => {
                sqlx::query_as(
                    "SELECT id, user_id, guest_id, created_at, updated_at FROM carts WHERE user_id = $1",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            Identity::Guest(guest) => {
                sqlx::query_as(
                    "SELECT id, user_id, guest_id, created_at, updated_at FROM carts WHERE guest_id = $1",
                )
                .bind(guest)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(row)
    }

    /// Resolve every line item's product, preserving line order.
    async fn load_cart(&self, row: CartRow) -> Result<Cart, StoreError> {
        let item_rows: Vec<CartItemRow> = sqlx::query_as(&format!(
            "SELECT ci.size, ci.quantity, {PRODUCT_COLUMNS_PREFIXED} FROM cart_items ci \
             JOIN products p ON p.id = ci.product_id \
             WHERE ci.cart_id = $1 ORDER BY ci.position"
        ))
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(item_rows.len());
        for item in item_rows {
            let size = item
                .size
                .parse()
                .map_err(|_| StoreError::Invalid(format!("cart item size {:?}", item.size)))?;
            items.push(CartLineItem {
                product: Product::try_from(item.product)?,
                size,
                quantity: item.quantity as u32,
            });
        }
        Ok(Cart {
            id: row.id,
            user_id: row.user_id,
            guest_id: row.guest_id,
            items,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn find(&self, owner: &Identity) -> Result<Option<Cart>, StoreError> {
        match self.cart_row(owner).await? {
            Some(row) => Ok(Some(self.load_cart(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_or_create(&self, owner: &Identity) -> Result<Cart, StoreError> {
        if let Some(cart) = self.find(owner).await? {
            return Ok(cart);
        }
        let (user_id, guest_id) = match owner {
            Identity::User(id) => (Some(*id), None),
            Identity::Guest(guest) => (None, Some(guest.clone())),
        };
        let inserted: Result<CartRow, sqlx::Error> = sqlx::query_as(
            "INSERT INTO carts (id, user_id, guest_id) VALUES ($1, $2, $3) \
             RETURNING id, user_id, guest_id, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(guest_id)
        .fetch_one(&self.pool)
        .await;
        match inserted {
            Ok(row) => self.load_cart(row).await,
            // Lost the create race; the winner's cart is this identity's cart.
            Err(err) if is_unique_violation(&err) => self
                .find(owner)
                .await?
                .ok_or(StoreError::Database(err)),
            Err(err) => Err(err.into()),
        }
    }

    async fn save_items(&self, cart_id: Uuid, items: &[CartLineItem]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO cart_items (id, cart_id, product_id, size, quantity, position) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(cart_id)
            .bind(item.product.id)
            .bind(item.size.as_str())
            .bind(item.quantity as i32)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn place(&self, order: &Order, cart_id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO orders (id, user_id, guest_id, address, total_price, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(&order.guest_id)
        .bind(&order.address)
        .bind(order.total_price)
        .bind(&order.status)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;
        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, name, size, quantity, unit_price, position) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.size.as_str())
            .bind(item.quantity as i32)
            .bind(item.unit_price)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let order_rows: Vec<OrderRow> = sqlx::query_as(
            "SELECT id, user_id, guest_id, address, total_price, status, created_at \
             FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = order_rows.iter().map(|o| o.id).collect();
        let item_rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT order_id, product_id, name, size, quantity, unit_price \
             FROM order_items WHERE order_id = ANY($1) ORDER BY position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderLineItem>> = HashMap::new();
        for item in item_rows {
            let order_id = item.order_id;
            by_order.entry(order_id).or_default().push(item.into_line()?);
        }

        Ok(order_rows
            .into_iter()
            .map(|row| Order {
                items: by_order.remove(&row.id).unwrap_or_default(),
                id: row.id,
                user_id: row.user_id,
                guest_id: row.guest_id,
                address: row.address,
                total_price: row.total_price,
                status: row.status,
                created_at: row.created_at,
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Duplicate),
            Err(err) => Err(err.into()),
        }
    }

    async fn by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }
}
