//! Catalog products

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lead::ConversionStage;
use super::text_enum;

/// What a product sells
///
/// Ordered by how far it moves a buyer down the funnel; add-ons rank lowest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProductKind {
    Addon,
    Diy,
    Upgrade,
    FullService,
}

text_enum!(ProductKind {
    Addon => "addon",
    Diy => "diy",
    Upgrade => "upgrade",
    FullService => "full_service",
});

impl ProductKind {
    /// Funnel stage reached by purchasing this kind (add-ons do not move it)
    pub fn conversion_stage(&self) -> Option<ConversionStage> {
        match self {
            ProductKind::Addon => None,
            ProductKind::Diy => Some(ConversionStage::DiyPurchased),
            ProductKind::Upgrade => Some(ConversionStage::Upgraded),
            ProductKind::FullService => Some(ConversionStage::FullService),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Draft,
    Archived,
}

text_enum!(ProductStatus {
    Active => "active",
    Draft => "draft",
    Archived => "archived",
});

/// Product row
///
/// The `views`/`add_to_cart`/`sales`/`revenue_cents` counters are a
/// denormalised view of the analytics log and paid orders; they are only
/// ever changed with atomic increments or a full recompute.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub kind: ProductKind,
    pub price_cents: i64,
    pub compare_at_cents: Option<i64>,
    pub status: ProductStatus,
    /// Remaining units; None means unlimited
    pub stock: Option<i64>,
    pub views: i64,
    pub add_to_cart: i64,
    pub sales: i64,
    /// Gross: paid line totals at list price, before any promo discount
    pub revenue_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin product creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    /// Derived from `name` when absent
    pub slug: Option<String>,
    pub description: Option<String>,
    pub kind: ProductKind,
    pub price_cents: i64,
    pub compare_at_cents: Option<i64>,
    #[serde(default = "default_status")]
    pub status: ProductStatus,
    pub stock: Option<i64>,
}

fn default_status() -> ProductStatus {
    ProductStatus::Draft
}

/// Admin partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub kind: Option<ProductKind>,
    pub price_cents: Option<i64>,
    pub compare_at_cents: Option<i64>,
    pub status: Option<ProductStatus>,
    pub stock: Option<i64>,
}

/// URL slug: lowercase ASCII alphanumerics separated by single hyphens
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// True when `slug` is already in canonical form
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.len() <= 120 && slugify(slug) == slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("DIY Expungement Kit"), "diy-expungement-kit");
        assert_eq!(slugify("  Full-Service (Felony)  "), "full-service-felony");
        assert_eq!(slugify("1203.4 Petition"), "1203-4-petition");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("diy-kit"));
        assert!(!is_valid_slug("DIY-kit"));
        assert!(!is_valid_slug("diy--kit"));
        assert!(!is_valid_slug("-diy"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_kind_stage_mapping() {
        assert_eq!(ProductKind::Addon.conversion_stage(), None);
        assert_eq!(
            ProductKind::FullService.conversion_stage(),
            Some(ConversionStage::FullService)
        );
        assert!(ProductKind::Upgrade > ProductKind::Diy);
    }
}
