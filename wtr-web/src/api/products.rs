//! Public product catalog

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use wtr_common::db::products;
use wtr_common::models::{Product, ProductKind, ProductStatus};

use crate::{ApiError, ApiResult, AppState};

/// Storefront view of a product (no analytics counters)
#[derive(Debug, Serialize)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub kind: ProductKind,
    pub price_cents: i64,
    pub compare_at_cents: Option<i64>,
    pub in_stock: bool,
}

impl From<Product> for CatalogProduct {
    fn from(product: Product) -> Self {
        Self {
            in_stock: product.stock.map_or(true, |n| n > 0),
            id: product.id,
            name: product.name,
            slug: product.slug,
            description: product.description,
            kind: product.kind,
            price_cents: product.price_cents,
            compare_at_cents: product.compare_at_cents,
        }
    }
}

/// GET /api/products
///
/// Active products, cheapest first.
pub async fn list_catalog(State(state): State<AppState>) -> ApiResult<Json<Vec<CatalogProduct>>> {
    let products = products::list(&state.db, true).await?;
    Ok(Json(products.into_iter().map(CatalogProduct::from).collect()))
}

/// GET /api/products/:slug
///
/// Drafts and archived products are hidden.
pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<CatalogProduct>> {
    let product = products::get_by_slug(&state.db, &slug).await?;
    if product.status != ProductStatus::Active {
        return Err(ApiError::NotFound(format!("Product {}", slug)));
    }
    Ok(Json(product.into()))
}
