//! Lead records captured from the intake form

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ConvictionType {
    Misdemeanor,
    Dui,
    Felony,
    Infraction,
    Unknown,
}

text_enum!(ConvictionType {
    Misdemeanor => "misdemeanor",
    Dui => "dui",
    Felony => "felony",
    Infraction => "infraction",
    Unknown => "unknown",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProbationStatus {
    Completed,
    /// Sentence carried no probation
    None,
    Active,
    Unknown,
}

text_enum!(ProbationStatus {
    Completed => "completed",
    None => "none",
    Active => "active",
    Unknown => "unknown",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Urgency {
    Immediate,
    WithinMonth,
    Researching,
}

text_enum!(Urgency {
    Immediate => "immediate",
    WithinMonth => "within_month",
    Researching => "researching",
});

/// Why the lead wants the record cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LeadReason {
    Employment,
    Housing,
    Licensing,
    Other,
}

text_enum!(LeadReason {
    Employment => "employment",
    Housing => "housing",
    Licensing => "licensing",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LeadSegment {
    Hot,
    Warm,
    Cold,
}

text_enum!(LeadSegment {
    Hot => "hot",
    Warm => "warm",
    Cold => "cold",
});

/// Funnel position: lead → DIY purchase → upgrade → full service
///
/// Variants are ordered; `Ord` compares funnel depth.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ConversionStage {
    Lead,
    DiyPurchased,
    Upgraded,
    FullService,
}

text_enum!(ConversionStage {
    Lead => "lead",
    DiyPurchased => "diy_purchased",
    Upgraded => "upgraded",
    FullService => "full_service",
});

/// Lead row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lead {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub county: Option<String>,
    pub conviction_type: Option<ConvictionType>,
    pub conviction_year: Option<i32>,
    pub probation_status: Option<ProbationStatus>,
    pub urgency: Option<Urgency>,
    pub reason: Option<LeadReason>,
    pub source: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub lead_score: i64,
    pub lead_segment: LeadSegment,
    pub conversion_stage: ConversionStage,
    pub has_paid: bool,
    pub amount_paid_cents: i64,
    pub unsubscribed: bool,
    pub abandoned_checkout: bool,
    pub visited_pricing: bool,
    pub emails_opened: i64,
    pub emails_clicked: i64,
    pub last_activity_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Name used in email greetings
    pub fn display_name(&self) -> &str {
        let first = self.first_name.trim();
        if first.is_empty() {
            "there"
        } else {
            first
        }
    }
}

/// Intake form submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub county: Option<String>,
    pub conviction_type: Option<ConvictionType>,
    pub conviction_year: Option<i32>,
    pub probation_status: Option<ProbationStatus>,
    pub urgency: Option<Urgency>,
    pub reason: Option<LeadReason>,
    pub source: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

impl LeadInput {
    /// Normalise and validate a submission
    ///
    /// Email is required and lowercased; blank optional strings become None.
    pub fn normalized(mut self) -> crate::Result<Self> {
        let email = self.email.trim().to_ascii_lowercase();
        if !is_plausible_email(&email) {
            return Err(crate::Error::InvalidInput(format!(
                "Invalid email address: '{}'",
                self.email.trim()
            )));
        }
        self.email = email;

        if let Some(year) = self.conviction_year {
            if !(1900..=2100).contains(&year) {
                return Err(crate::Error::InvalidInput(format!(
                    "Conviction year out of range: {}",
                    year
                )));
            }
        }

        for field in [
            &mut self.first_name,
            &mut self.last_name,
            &mut self.phone,
            &mut self.county,
            &mut self.source,
            &mut self.utm_source,
            &mut self.utm_medium,
            &mut self.utm_campaign,
        ] {
            *field = field
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }

        Ok(self)
    }
}

/// Minimal shape check: one `@`, non-empty local part, dotted domain
pub fn is_plausible_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !email.contains(char::is_whitespace)
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering_follows_funnel() {
        assert!(ConversionStage::Lead < ConversionStage::DiyPurchased);
        assert!(ConversionStage::DiyPurchased < ConversionStage::Upgraded);
        assert!(ConversionStage::Upgraded < ConversionStage::FullService);
    }

    #[test]
    fn test_enum_text_round_trip_matches_serde() {
        for stage in ConversionStage::ALL {
            let json = serde_json::to_value(stage).unwrap();
            assert_eq!(json.as_str().unwrap(), stage.as_str());
            assert_eq!(stage.as_str().parse::<ConversionStage>().unwrap(), *stage);
        }
    }

    #[test]
    fn test_unknown_enum_text_rejected() {
        assert!("platinum".parse::<LeadSegment>().is_err());
        assert_eq!(" HOT ".parse::<LeadSegment>().unwrap(), LeadSegment::Hot);
    }

    #[test]
    fn test_email_plausibility() {
        assert!(is_plausible_email("jane@example.com"));
        assert!(!is_plausible_email("jane.example.com"));
        assert!(!is_plausible_email("jane@localhost"));
        assert!(!is_plausible_email("a@b@c.com"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("jane doe@example.com"));
    }

    #[test]
    fn test_normalized_trims_and_lowercases() {
        let input = LeadInput {
            email: "  Jane@Example.COM ".to_string(),
            first_name: Some("  Jane ".to_string()),
            phone: Some("   ".to_string()),
            ..Default::default()
        }
        .normalized()
        .unwrap();

        assert_eq!(input.email, "jane@example.com");
        assert_eq!(input.first_name.as_deref(), Some("Jane"));
        assert!(input.phone.is_none());
    }

    #[test]
    fn test_normalized_rejects_bad_year() {
        let result = LeadInput {
            email: "jane@example.com".to_string(),
            conviction_year: Some(1066),
            ..Default::default()
        }
        .normalized();
        assert!(result.is_err());
    }
}
