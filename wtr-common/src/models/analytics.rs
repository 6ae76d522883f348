//! Append-only analytics events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// Event names with side effects on counters or lead behavior
pub mod names {
    pub const PRODUCT_VIEW: &str = "product_view";
    pub const ADD_TO_CART: &str = "add_to_cart";
    pub const PRICING_VIEWED: &str = "pricing_viewed";
    pub const CHECKOUT_STARTED: &str = "checkout_started";
    pub const CHECKOUT_ABANDONED: &str = "checkout_abandoned";
    pub const EMAIL_OPENED: &str = "email_opened";
    pub const EMAIL_CLICKED: &str = "email_clicked";
}

/// Stored event (never updated or deleted)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnalyticsEvent {
    pub id: String,
    pub event_name: String,
    pub session_id: Option<String>,
    pub lead_id: Option<String>,
    pub product_id: Option<String>,
    pub order_id: Option<String>,
    pub page_url: Option<String>,
    pub metadata: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Ingestion payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewAnalyticsEvent {
    pub event_name: String,
    pub session_id: Option<String>,
    pub lead_id: Option<String>,
    pub product_id: Option<String>,
    pub order_id: Option<String>,
    pub page_url: Option<String>,
    pub metadata: serde_json::Value,
}

impl NewAnalyticsEvent {
    /// Event names are short snake_case identifiers
    pub fn validate(&self) -> crate::Result<()> {
        let name = self.event_name.as_str();
        let well_formed = !name.is_empty()
            && name.len() <= 64
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if well_formed {
            Ok(())
        } else {
            Err(crate::Error::InvalidInput(format!(
                "Invalid event name: '{}'",
                name
            )))
        }
    }
}
