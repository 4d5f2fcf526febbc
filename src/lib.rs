//! Clothier - clothing e-commerce backend.
//!
//! ## Features
//! - Product catalog browsing with filters and pagination
//! - Guest and account shopping carts with merge-by-(product, size) lines
//! - Checkout snapshotting a cart into an immutable order
//! - Transactional order emails to customer and operator

pub mod auth;
pub mod config;
pub mod domain;
pub mod email;
pub mod error;
pub mod routes;
pub mod store;

use std::sync::Arc;

use crate::auth::TokenSigner;
use crate::email::Mailer;
use crate::store::{CartStore, OrderStore, ProductStore, UserStore};

/// Shared handler dependencies, injected so tests can swap in the in-memory
/// stores and a capturing mailer.
#[derive(Clone)]
pub struct AppState {
    pub products: Arc<dyn ProductStore>,
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderStore>,
    pub users: Arc<dyn UserStore>,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: Arc<TokenSigner>,
    /// Recipient of new-order alerts; `None` disables them.
    pub operator_email: Option<String>,
}
