//! Dashboard aggregates
//!
//! Shared by the admin stats endpoint and the operations bot.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::email_jobs::{self, StatusCount};
use crate::Result;

#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct LeadStats {
    pub total: i64,
    pub new_last_7_days: i64,
    pub hot: i64,
    pub warm: i64,
    pub cold: i64,
    pub paid: i64,
    pub unsubscribed: i64,
    pub diy_purchased: i64,
    pub upgraded: i64,
    pub full_service: i64,
}

#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct OrderStats {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub refunded: i64,
    pub paid: i64,
    /// Sum of paid order totals
    pub revenue_cents: i64,
    pub revenue_last_30_days_cents: i64,
}

impl OrderStats {
    pub fn average_order_cents(&self) -> i64 {
        if self.paid == 0 {
            0
        } else {
            self.revenue_cents / self.paid
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductStats {
    pub name: String,
    pub slug: String,
    pub views: i64,
    pub add_to_cart: i64,
    pub sales: i64,
    /// Gross, before promo discounts; see [`crate::models::Product::revenue_cents`]
    pub revenue_cents: i64,
}

impl ProductStats {
    /// Units sold per 100 views
    pub fn conversion_rate(&self) -> f64 {
        if self.views == 0 {
            0.0
        } else {
            self.sales as f64 * 100.0 / self.views as f64
        }
    }
}

/// Snapshot of the business at `generated_at`
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub generated_at: DateTime<Utc>,
    pub leads: LeadStats,
    pub orders: OrderStats,
    /// Top products by revenue
    pub top_products: Vec<ProductStats>,
    pub email_jobs: Vec<StatusCount>,
}

const TOP_PRODUCTS: i64 = 10;

pub async fn load_stats(pool: &SqlitePool, now: DateTime<Utc>) -> Result<StoreStats> {
    let leads = sqlx::query_as::<_, LeadStats>(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(created_at >= ?), 0) AS new_last_7_days,
            COALESCE(SUM(lead_segment = 'hot'), 0) AS hot,
            COALESCE(SUM(lead_segment = 'warm'), 0) AS warm,
            COALESCE(SUM(lead_segment = 'cold'), 0) AS cold,
            COALESCE(SUM(has_paid), 0) AS paid,
            COALESCE(SUM(unsubscribed), 0) AS unsubscribed,
            COALESCE(SUM(conversion_stage = 'diy_purchased'), 0) AS diy_purchased,
            COALESCE(SUM(conversion_stage = 'upgraded'), 0) AS upgraded,
            COALESCE(SUM(conversion_stage = 'full_service'), 0) AS full_service
        FROM leads
        "#,
    )
    .bind(now - Duration::days(7))
    .fetch_one(pool)
    .await?;

    let orders = sqlx::query_as::<_, OrderStats>(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(status = 'pending'), 0) AS pending,
            COALESCE(SUM(status = 'processing'), 0) AS processing,
            COALESCE(SUM(status = 'completed'), 0) AS completed,
            COALESCE(SUM(status = 'cancelled'), 0) AS cancelled,
            COALESCE(SUM(status = 'refunded'), 0) AS refunded,
            COALESCE(SUM(payment_status = 'paid'), 0) AS paid,
            COALESCE(SUM(CASE WHEN payment_status = 'paid' THEN total_cents END), 0) AS revenue_cents,
            COALESCE(SUM(CASE WHEN payment_status = 'paid' AND created_at >= ? THEN total_cents END), 0)
                AS revenue_last_30_days_cents
        FROM orders
        "#,
    )
    .bind(now - Duration::days(30))
    .fetch_one(pool)
    .await?;

    let top_products = sqlx::query_as::<_, ProductStats>(
        r#"
        SELECT name, slug, views, add_to_cart, sales, revenue_cents
        FROM products
        ORDER BY revenue_cents DESC, sales DESC, name
        LIMIT ?
        "#,
    )
    .bind(TOP_PRODUCTS)
    .fetch_all(pool)
    .await?;

    let email_jobs = email_jobs::counts_by_status(pool).await?;

    Ok(StoreStats {
        generated_at: now,
        leads,
        orders,
        top_products,
        email_jobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_order_handles_no_sales() {
        let stats = OrderStats::default();
        assert_eq!(stats.average_order_cents(), 0);

        let stats = OrderStats {
            paid: 4,
            revenue_cents: 10_000,
            ..Default::default()
        };
        assert_eq!(stats.average_order_cents(), 2_500);
    }

    #[test]
    fn test_conversion_rate() {
        let product = ProductStats {
            name: "DIY Kit".into(),
            slug: "diy-kit".into(),
            views: 200,
            add_to_cart: 20,
            sales: 5,
            revenue_cents: 49_500,
        };
        assert!((product.conversion_rate() - 2.5).abs() < f64::EPSILON);
    }
}
