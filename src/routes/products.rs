//! Catalog browsing: filtered, paginated listing and single-product lookup.

use axum::extract::{Path, Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::product::Product;
use crate::error::AppError;
use crate::store::{Page, ProductFilter};
use crate::AppState;

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub size: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ProductPage>, AppError> {
    let page = Page {
        page: params.page.unwrap_or(1).max(1),
        limit: params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
    };
    let filter = ProductFilter {
        q: params.q,
        category: params
            .category
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|_| AppError::BadRequest("Invalid category".to_string()))?,
        size: params
            .size
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|_| AppError::BadRequest("Invalid size".to_string()))?,
        min_price: params.min_price,
        max_price: params.max_price,
    };
    let (products, total) = state.products.list(&filter, page).await?;
    Ok(Json(ProductPage {
        products,
        pagination: Pagination {
            page: page.page,
            limit: page.limit,
            total,
            total_pages: total.div_ceil(page.limit as u64),
        },
    }))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    state
        .products
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}
