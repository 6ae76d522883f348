//! Orders created at checkout

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use super::product::ProductKind;
use super::text_enum;

/// Fulfilment status
///
/// Transitions are unconstrained: any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Refunded,
}

text_enum!(OrderStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Failed,
    Refunded,
}

text_enum!(PaymentStatus {
    Unpaid => "unpaid",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

/// Customer snapshot taken at checkout
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    #[sqlx(rename = "customer_name")]
    pub name: String,
    #[sqlx(rename = "customer_email")]
    pub email: String,
    #[sqlx(rename = "customer_phone")]
    pub phone: Option<String>,
}

/// Priced line item (product fields are denormalised at checkout)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    pub kind: ProductKind,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNote {
    pub text: String,
    pub author: Option<String>,
    pub at: DateTime<Utc>,
}

/// Order row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub lead_id: Option<String>,
    #[sqlx(flatten)]
    pub customer: Customer,
    pub items: Json<Vec<OrderItem>>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub promo_code: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub timeline: Json<Vec<TimelineEntry>>,
    pub notes: Json<Vec<OrderNote>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Deepest product kind on the order (drives the lead's funnel stage)
    pub fn highest_kind(&self) -> Option<ProductKind> {
        self.items.iter().map(|item| item.kind).max()
    }
}
