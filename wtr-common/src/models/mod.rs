//! Entity models
//!
//! Rows map 1:1 onto the tables created in [`crate::db::init`]. Enum columns
//! are stored as snake_case TEXT.

pub mod analytics;
pub mod email_job;
pub mod lead;
pub mod order;
pub mod product;

pub use analytics::{AnalyticsEvent, NewAnalyticsEvent};
pub use email_job::{EmailJob, EmailJobStatus};
pub use lead::{
    ConversionStage, ConvictionType, Lead, LeadInput, LeadReason, LeadSegment, ProbationStatus,
    Urgency,
};
pub use order::{
    Customer, Order, OrderItem, OrderNote, OrderStatus, PaymentStatus, TimelineEntry,
};
pub use product::{Product, ProductInput, ProductKind, ProductStatus, ProductUpdate};

/// Implements `as_str`, `Display` and `FromStr` for a fieldless TEXT enum
///
/// The string forms must match the serde/sqlx `snake_case` renames.
macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// All variants, in declaration order
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Stored/wire representation
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = crate::Error;

            fn from_str(s: &str) -> crate::Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(crate::Error::InvalidInput(format!(
                        "Unknown {} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

pub(crate) use text_enum;
