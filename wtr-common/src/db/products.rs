//! Product catalog repository

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::models::analytics::names;
use crate::models::product::{is_valid_slug, slugify};
use crate::models::{Product, ProductInput, ProductUpdate};
use crate::{Error, Result};

const DUPLICATE_SLUG: &str = "Product slug already exists";

fn validate_fields(name: &str, slug: &str, price_cents: i64, stock: Option<i64>) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("Product name is required".into()));
    }
    if !is_valid_slug(slug) {
        return Err(Error::InvalidInput(format!("Invalid product slug: '{}'", slug)));
    }
    if price_cents < 0 {
        return Err(Error::InvalidInput("Price cannot be negative".into()));
    }
    if matches!(stock, Some(n) if n < 0) {
        return Err(Error::InvalidInput("Stock cannot be negative".into()));
    }
    Ok(())
}

fn map_slug_conflict(err: sqlx::Error) -> Error {
    let err = Error::from(err);
    if err.is_unique_violation() {
        Error::Conflict(DUPLICATE_SLUG.into())
    } else {
        err
    }
}

/// Create a product; the slug is derived from the name when not supplied
pub async fn create(pool: &SqlitePool, input: &ProductInput, now: DateTime<Utc>) -> Result<Product> {
    let slug = slugify(input.slug.as_deref().unwrap_or(&input.name));
    validate_fields(&input.name, &slug, input.price_cents, input.stock)?;

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO products (
            id, name, slug, description, kind, price_cents, compare_at_cents,
            status, stock, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(input.name.trim())
    .bind(&slug)
    .bind(&input.description)
    .bind(input.kind)
    .bind(input.price_cents)
    .bind(input.compare_at_cents)
    .bind(input.status)
    .bind(input.stock)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(map_slug_conflict)?;

    info!(product_id = %id, slug = %slug, "Created product");
    get(pool, &id).await
}

/// Apply a partial update
pub async fn update(
    pool: &SqlitePool,
    id: &str,
    changes: &ProductUpdate,
    now: DateTime<Utc>,
) -> Result<Product> {
    let current = get(pool, id).await?;

    let name = changes.name.clone().unwrap_or(current.name);
    let slug = changes
        .slug
        .as_deref()
        .map(slugify)
        .unwrap_or(current.slug);
    let price_cents = changes.price_cents.unwrap_or(current.price_cents);
    let stock = changes.stock.or(current.stock);
    validate_fields(&name, &slug, price_cents, stock)?;

    sqlx::query(
        r#"
        UPDATE products SET
            name = ?, slug = ?, description = ?, kind = ?, price_cents = ?,
            compare_at_cents = ?, status = ?, stock = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(name.trim())
    .bind(&slug)
    .bind(changes.description.clone().or(current.description))
    .bind(changes.kind.unwrap_or(current.kind))
    .bind(price_cents)
    .bind(changes.compare_at_cents.or(current.compare_at_cents))
    .bind(changes.status.unwrap_or(current.status))
    .bind(stock)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .map_err(map_slug_conflict)?;

    get(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Product> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Product {}", id)))
}

pub async fn get_by_slug(pool: &SqlitePool, slug: &str) -> Result<Product> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Product '{}'", slug)))
}

/// Catalog listing, cheapest first
pub async fn list(pool: &SqlitePool, active_only: bool) -> Result<Vec<Product>> {
    let sql = if active_only {
        "SELECT * FROM products WHERE status = 'active' ORDER BY price_cents, name"
    } else {
        "SELECT * FROM products ORDER BY price_cents, name"
    };
    Ok(sqlx::query_as::<_, Product>(sql).fetch_all(pool).await?)
}

/// Bump the counter matching an analytics event; false for other events or
/// unknown products
pub async fn record_event(pool: &SqlitePool, id: &str, event_name: &str) -> Result<bool> {
    let sql = match event_name {
        names::PRODUCT_VIEW => "UPDATE products SET views = views + 1 WHERE id = ?",
        names::ADD_TO_CART => "UPDATE products SET add_to_cart = add_to_cart + 1 WHERE id = ?",
        _ => return Ok(false),
    };

    let affected = sqlx::query(sql).bind(id).execute(pool).await?.rows_affected();
    Ok(affected > 0)
}

/// Rebuild every product's counters from the event log and paid orders
///
/// Returns the number of products updated.
pub async fn recompute_analytics(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let updated = sqlx::query(
        r#"
        UPDATE products SET
            views = (
                SELECT COUNT(*) FROM analytics_events e
                WHERE e.product_id = products.id AND e.event_name = ?
            ),
            add_to_cart = (
                SELECT COUNT(*) FROM analytics_events e
                WHERE e.product_id = products.id AND e.event_name = ?
            ),
            sales = COALESCE((
                SELECT SUM(json_extract(item.value, '$.quantity'))
                FROM orders o, json_each(o.items) AS item
                WHERE o.payment_status = 'paid'
                  AND json_extract(item.value, '$.product_id') = products.id
            ), 0),
            revenue_cents = COALESCE((
                SELECT SUM(json_extract(item.value, '$.total_cents'))
                FROM orders o, json_each(o.items) AS item
                WHERE o.payment_status = 'paid'
                  AND json_extract(item.value, '$.product_id') = products.id
            ), 0),
            updated_at = ?
        "#,
    )
    .bind(names::PRODUCT_VIEW)
    .bind(names::ADD_TO_CART)
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    info!("Recomputed analytics for {} product(s)", updated);
    Ok(updated)
}
