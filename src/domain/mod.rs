//! Domain types: catalog, carts, orders, users.

pub mod cart;
pub mod order;
pub mod product;
pub mod user;
