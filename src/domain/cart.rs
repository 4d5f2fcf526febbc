//! Cart aggregate and its line-item mutation rules.
//!
//! A cart belongs to exactly one identity, set at creation: an authenticated
//! user or an anonymous guest. Line items are unique per (product, size);
//! adding the same pair again merges quantities instead of duplicating.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::product::{Product, Size};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub product: Product,
    pub size: Size,
    pub quantity: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Option<Uuid>,
    pub guest_id: Option<String>,
    pub items: Vec<CartLineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Quantity must be positive")]
    InvalidQuantity,
    #[error("Invalid size for this product")]
    InvalidSize,
    #[error("Cart item not found")]
    ItemNotFound,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `quantity` of (product, size). Merges into an existing line for
    /// the same pair, otherwise appends.
    pub fn add_item(
        &mut self,
        product: &Product,
        size: Size,
        quantity: i64,
    ) -> Result<(), CartError> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity);
        }
        if !product.has_size(size) {
            return Err(CartError::InvalidSize);
        }
        let quantity = quantity as u32;
        match self.line_mut(product.id, size) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.items.push(CartLineItem {
                product: product.clone(),
                size,
                quantity,
            }),
        }
        Ok(())
    }

    /// Overwrite the quantity of an existing line. A quantity of zero or
    /// less deletes the line; one endpoint covers update and delete.
    pub fn set_item_quantity(
        &mut self,
        product_id: Uuid,
        size: Size,
        quantity: i64,
    ) -> Result<(), CartError> {
        let idx = self
            .items
            .iter()
            .position(|i| i.product.id == product_id && i.size == size)
            .ok_or(CartError::ItemNotFound)?;
        if quantity <= 0 {
            self.items.remove(idx);
        } else {
            self.items[idx].quantity = quantity as u32;
        }
        Ok(())
    }

    /// Remove the (product, size) line if present. Removing a line that does
    /// not exist leaves the cart unchanged.
    pub fn remove_item(&mut self, product_id: Uuid, size: Size) {
        self.items
            .retain(|i| !(i.product.id == product_id && i.size == size));
    }

    fn line_mut(&mut self, product_id: Uuid, size: Size) -> Option<&mut CartLineItem> {
        self.items
            .iter_mut()
            .find(|i| i.product.id == product_id && i.size == size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::Category;
    use rust_decimal::Decimal;

    fn product(name: &str, price: i64, sizes: &[Size]) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{name} description"),
            price: Decimal::from(price),
            image_url: format!("https://img.example/{name}.jpg"),
            category: Category::Men,
            sizes: sizes.to_vec(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn empty_cart() -> Cart {
        Cart {
            id: Uuid::new_v4(),
            user_id: None,
            guest_id: Some("guest-1".to_string()),
            items: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn adds_merge_by_product_and_size() {
        let p = product("Tee", 500, &[Size::S, Size::M]);
        let mut cart = empty_cart();
        cart.add_item(&p, Size::M, 1).unwrap();
        cart.add_item(&p, Size::M, 1).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 2);
    }

    #[test]
    fn merged_quantity_is_sum_of_adds() {
        let p = product("Tee", 500, &[Size::M]);
        let mut cart = empty_cart();
        for qty in [1, 4, 2] {
            cart.add_item(&p, Size::M, qty).unwrap();
        }
        assert_eq!(cart.items[0].quantity, 7);
    }

    #[test]
    fn different_sizes_stay_separate_lines() {
        let p = product("Tee", 500, &[Size::S, Size::M]);
        let mut cart = empty_cart();
        cart.add_item(&p, Size::S, 1).unwrap();
        cart.add_item(&p, Size::M, 1).unwrap();
        assert_eq!(cart.items.len(), 2);
    }

    #[test]
    fn rejects_size_not_offered_by_product() {
        let p = product("Tee", 500, &[Size::S, Size::M]);
        let mut cart = empty_cart();
        assert_eq!(
            cart.add_item(&p, Size::L, 1),
            Err(CartError::InvalidSize)
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let p = product("Tee", 500, &[Size::M]);
        let mut cart = empty_cart();
        assert_eq!(cart.add_item(&p, Size::M, 0), Err(CartError::InvalidQuantity));
        assert_eq!(cart.add_item(&p, Size::M, -3), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn set_quantity_overwrites_instead_of_adding() {
        let p = product("Tee", 500, &[Size::M]);
        let mut cart = empty_cart();
        cart.add_item(&p, Size::M, 3).unwrap();
        cart.set_item_quantity(p.id, Size::M, 5).unwrap();
        assert_eq!(cart.items[0].quantity, 5);
    }

    #[test]
    fn set_quantity_zero_removes_the_line() {
        let p = product("Tee", 500, &[Size::M]);
        let mut cart = empty_cart();
        cart.add_item(&p, Size::M, 3).unwrap();
        cart.set_item_quantity(p.id, Size::M, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn set_quantity_on_missing_line_fails() {
        let p = product("Tee", 500, &[Size::M]);
        let mut cart = empty_cart();
        assert_eq!(
            cart.set_item_quantity(p.id, Size::M, 2),
            Err(CartError::ItemNotFound)
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let p = product("Tee", 500, &[Size::S, Size::M]);
        let mut cart = empty_cart();
        cart.add_item(&p, Size::M, 2).unwrap();
        cart.remove_item(p.id, Size::S);
        assert_eq!(cart.items.len(), 1);
        cart.remove_item(p.id, Size::M);
        cart.remove_item(p.id, Size::M);
        assert!(cart.is_empty());
    }
}
