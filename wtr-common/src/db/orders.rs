//! Order repository: checkout, fulfilment status and payment recording

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::leads;
use crate::models::lead::is_plausible_email;
use crate::models::{
    ConversionStage, Order, OrderItem, OrderNote, OrderStatus, PaymentStatus, Product,
    ProductStatus, TimelineEntry,
};
use crate::pricing::{self, OrderTotals};
use crate::{Error, Result};

/// Order numbers use an unambiguous uppercase alphabet
const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ORDER_NUMBER_ATTEMPTS: usize = 5;
/// Largest quantity accepted on one checkout line
pub const MAX_LINE_QUANTITY: i64 = 1_000;

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutItem {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutCustomer {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Checkout payload
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    /// Linked lead; looked up by customer email when absent
    #[serde(default)]
    pub lead_id: Option<String>,
    pub customer: CheckoutCustomer,
    pub items: Vec<CheckoutItem>,
    #[serde(default)]
    pub promo_code: Option<String>,
}

/// Outcome of a payment webhook
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub order: Order,
    pub previous: PaymentStatus,
    /// False when the order already carried the requested status
    pub changed: bool,
    /// Linked lead's `(old, new)` stage when this call marked it paid
    pub lead_stage: Option<(ConversionStage, ConversionStage)>,
}

impl PaymentOutcome {
    /// True when this call moved the order into `paid`
    pub fn newly_paid(&self) -> bool {
        self.changed && self.order.payment_status == PaymentStatus::Paid
    }
}

/// `WTR-YYYYMMDD-XXXXXX`
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| {
            let idx = rng.gen_range(0..ORDER_NUMBER_ALPHABET.len());
            char::from(ORDER_NUMBER_ALPHABET[idx])
        })
        .collect();
    format!("WTR-{}-{}", now.format("%Y%m%d"), suffix)
}

fn validate_request(request: &CheckoutRequest) -> Result<()> {
    if request.items.is_empty() {
        return Err(Error::InvalidInput("Order has no items".into()));
    }
    if let Some(line) = request
        .items
        .iter()
        .find(|line| line.quantity > MAX_LINE_QUANTITY)
    {
        return Err(Error::InvalidInput(format!(
            "Quantity {} exceeds the limit of {} per item",
            line.quantity, MAX_LINE_QUANTITY
        )));
    }
    if request.customer.name.trim().is_empty() {
        return Err(Error::InvalidInput("Customer name is required".into()));
    }
    let email = request.customer.email.trim().to_ascii_lowercase();
    if !is_plausible_email(&email) {
        return Err(Error::InvalidInput(format!(
            "Invalid email address: '{}'",
            request.customer.email.trim()
        )));
    }
    Ok(())
}

/// Append a JSON element to a TEXT array column
async fn append_timeline(
    conn: &mut SqliteConnection,
    id: &str,
    entry: &TimelineEntry,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE orders SET timeline = json_insert(timeline, '$[#]', json(?)), updated_at = ? WHERE id = ?",
    )
    .bind(serde_json::to_string(entry)?)
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Price, reserve stock and write a new order in one transaction
pub async fn checkout(
    pool: &SqlitePool,
    request: &CheckoutRequest,
    tax_rate_bps: u32,
    now: DateTime<Utc>,
) -> Result<Order> {
    validate_request(request)?;

    let promo = match request.promo_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Some(
            pricing::lookup_promo(code)
                .ok_or_else(|| Error::InvalidInput(format!("Unknown promo code: '{}'", code)))?,
        ),
        _ => None,
    };

    let customer_email = request.customer.email.trim().to_ascii_lowercase();
    let mut tx = pool.begin().await?;

    let lead_id: Option<String> = match &request.lead_id {
        Some(id) => {
            let exists: Option<String> = sqlx::query_scalar("SELECT id FROM leads WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            Some(exists.ok_or_else(|| Error::InvalidInput(format!("Unknown lead: {}", id)))?)
        }
        None => {
            sqlx::query_scalar("SELECT id FROM leads WHERE email = ?")
                .bind(&customer_email)
                .fetch_optional(&mut *tx)
                .await?
        }
    };

    let mut items = Vec::with_capacity(request.items.len());
    for line in &request.items {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
            .bind(&line.product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Product {}", line.product_id)))?;

        if product.status != ProductStatus::Active {
            return Err(Error::InvalidInput(format!(
                "Product '{}' is not available",
                product.slug
            )));
        }

        let total_cents = pricing::line_total(product.price_cents, line.quantity)?;

        if product.stock.is_some() {
            let reserved = sqlx::query(
                "UPDATE products SET stock = stock - ?, updated_at = ? \
                 WHERE id = ? AND stock IS NOT NULL AND stock >= ?",
            )
            .bind(line.quantity)
            .bind(now)
            .bind(&product.id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if reserved == 0 {
                return Err(Error::Conflict(format!(
                    "Insufficient stock for '{}'",
                    product.slug
                )));
            }
        }

        items.push(OrderItem {
            product_id: product.id,
            product_name: product.name,
            kind: product.kind,
            quantity: line.quantity,
            unit_price_cents: product.price_cents,
            total_cents,
        });
    }

    let line_totals: Vec<i64> = items.iter().map(|item| item.total_cents).collect();
    let totals: OrderTotals = pricing::compute_totals(
        &line_totals,
        promo.map_or(0, |p| p.percent_off),
        tax_rate_bps,
    )?;

    let timeline = vec![TimelineEntry {
        status: OrderStatus::Pending,
        note: Some("Order placed".to_string()),
        at: now,
    }];
    let id = Uuid::new_v4().to_string();
    let phone = request
        .customer
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let mut attempt = 0;
    let order_number = loop {
        attempt += 1;
        let order_number = generate_order_number(now);
        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, lead_id, customer_name, customer_email, customer_phone,
                items, subtotal_cents, discount_cents, tax_cents, total_cents, promo_code,
                status, payment_status, timeline, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '[]', ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&order_number)
        .bind(&lead_id)
        .bind(request.customer.name.trim())
        .bind(&customer_email)
        .bind(phone)
        .bind(Json(&items))
        .bind(totals.subtotal_cents)
        .bind(totals.discount_cents)
        .bind(totals.tax_cents)
        .bind(totals.total_cents)
        .bind(promo.map(|p| p.code))
        .bind(OrderStatus::Pending)
        .bind(PaymentStatus::Unpaid)
        .bind(Json(&timeline))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await;

        match inserted.map_err(Error::from) {
            Ok(_) => break order_number,
            Err(e) if e.is_unique_violation() && attempt < ORDER_NUMBER_ATTEMPTS => {
                debug!("Order number {} collided, retrying", order_number);
            }
            Err(e) => return Err(e),
        }
    };

    tx.commit().await?;

    info!(
        order_id = %id,
        order_number = %order_number,
        total_cents = totals.total_cents,
        "Order created"
    );
    get(pool, &id).await
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Order> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Order {}", id)))
}

fn push_status_filter(qb: &mut QueryBuilder<'_, Sqlite>, status: Option<OrderStatus>) {
    if let Some(status) = status {
        qb.push(" WHERE status = ").push_bind(status);
    }
}

pub async fn count(pool: &SqlitePool, status: Option<OrderStatus>) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM orders");
    push_status_filter(&mut qb, status);
    Ok(qb.build_query_scalar::<i64>().fetch_one(pool).await?)
}

/// Newest first
pub async fn list(
    pool: &SqlitePool,
    status: Option<OrderStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Order>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM orders");
    push_status_filter(&mut qb, status);
    qb.push(" ORDER BY created_at DESC, id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    Ok(qb.build_query_as::<Order>().fetch_all(pool).await?)
}

/// Set fulfilment status and append a timeline entry
///
/// Any status may follow any other. Returns the previous status.
pub async fn update_status(
    pool: &SqlitePool,
    id: &str,
    status: OrderStatus,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<(OrderStatus, Order)> {
    let mut tx = pool.begin().await?;

    let previous: OrderStatus = sqlx::query_scalar("SELECT status FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Order {}", id)))?;

    sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let entry = TimelineEntry {
        status,
        note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        at: now,
    };
    append_timeline(&mut tx, id, &entry, now).await?;
    tx.commit().await?;

    Ok((previous, get(pool, id).await?))
}

/// Append an internal note
pub async fn add_note(
    pool: &SqlitePool,
    id: &str,
    text: &str,
    author: Option<String>,
    now: DateTime<Utc>,
) -> Result<Order> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidInput("Note text is required".into()));
    }

    let note = OrderNote {
        text: text.to_string(),
        author,
        at: now,
    };
    let affected = sqlx::query(
        "UPDATE orders SET notes = json_insert(notes, '$[#]', json(?)), updated_at = ? WHERE id = ?",
    )
    .bind(serde_json::to_string(&note)?)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(Error::NotFound(format!("Order {}", id)));
    }
    get(pool, id).await
}

/// Apply a payment provider status to an order
///
/// Idempotent per status. `paid` moves a pending order to processing,
/// credits product sales/revenue and marks the linked lead paid, all in one
/// transaction; `refunded` after `paid` reverses the product credit.
pub async fn record_payment(
    pool: &SqlitePool,
    id: &str,
    payment_status: PaymentStatus,
    now: DateTime<Utc>,
) -> Result<PaymentOutcome> {
    let mut tx = pool.begin().await?;

    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Order {}", id)))?;
    let previous = order.payment_status;

    if previous == payment_status {
        debug!(order_id = %id, status = %payment_status, "Duplicate payment notification");
        tx.rollback().await?;
        return Ok(PaymentOutcome {
            order,
            previous,
            changed: false,
            lead_stage: None,
        });
    }

    let (status, note) = match payment_status {
        PaymentStatus::Paid => {
            let status = if order.status == OrderStatus::Pending {
                OrderStatus::Processing
            } else {
                order.status
            };
            (status, "Payment received")
        }
        PaymentStatus::Refunded => (OrderStatus::Refunded, "Payment refunded"),
        PaymentStatus::Failed => (order.status, "Payment failed"),
        PaymentStatus::Unpaid => (order.status, "Payment reset to unpaid"),
    };

    sqlx::query("UPDATE orders SET payment_status = ?, status = ? WHERE id = ?")
        .bind(payment_status)
        .bind(status)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let entry = TimelineEntry {
        status,
        note: Some(note.to_string()),
        at: now,
    };
    append_timeline(&mut tx, id, &entry, now).await?;

    let mut lead_stage = None;
    if payment_status == PaymentStatus::Paid {
        credit_products(&mut tx, &order.items, 1, now).await?;

        if let Some(lead_id) = &order.lead_id {
            let stage_reached = order.highest_kind().and_then(|kind| kind.conversion_stage());
            match leads::apply_payment(&mut tx, lead_id, order.total_cents, stage_reached, now)
                .await
            {
                Ok(stages) => lead_stage = Some(stages),
                Err(Error::NotFound(_)) => {
                    warn!(order_id = %id, lead_id = %lead_id, "Paid order links to a missing lead");
                }
                Err(e) => return Err(e),
            }
        }
    } else if previous == PaymentStatus::Paid {
        warn!(order_id = %id, status = %payment_status, "Reversing sales for previously paid order");
        credit_products(&mut tx, &order.items, -1, now).await?;
    }

    tx.commit().await?;
    info!(order_id = %id, from = %previous, to = %payment_status, "Payment recorded");

    Ok(PaymentOutcome {
        order: get(pool, id).await?,
        previous,
        changed: true,
        lead_stage,
    })
}

/// Add (`sign = 1`) or remove (`sign = -1`) the items' units and revenue
///
/// Revenue is the line total before the order's discount.
async fn credit_products(
    conn: &mut SqliteConnection,
    items: &[OrderItem],
    sign: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    for item in items {
        sqlx::query(
            r#"
            UPDATE products SET
                sales = MAX(0, sales + ?),
                revenue_cents = MAX(0, revenue_cents + ?),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(sign * item.quantity)
        .bind(sign * item.total_cents)
        .bind(now)
        .bind(&item.product_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        let number = generate_order_number(now);
        assert!(number.starts_with("WTR-20260314-"));
        let suffix = &number["WTR-20260314-".len()..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix.bytes().all(|b| ORDER_NUMBER_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_request_validation() {
        let mut request = CheckoutRequest {
            lead_id: None,
            customer: CheckoutCustomer {
                name: "Ana".into(),
                email: "ana@example.com".into(),
                phone: None,
            },
            items: vec![],
            promo_code: None,
        };
        assert!(validate_request(&request).is_err());

        request.items.push(CheckoutItem {
            product_id: "p".into(),
            quantity: 1,
        });
        assert!(validate_request(&request).is_ok());

        request.items[0].quantity = MAX_LINE_QUANTITY + 1;
        assert!(validate_request(&request).is_err());
        request.items[0].quantity = MAX_LINE_QUANTITY;
        assert!(validate_request(&request).is_ok());

        request.customer.email = "not-an-email".into();
        assert!(validate_request(&request).is_err());
    }
}
