//! Lead scoring
//!
//! Additive point table over the intake form. Every input is optional and
//! contributes zero when absent, so scoring never fails.
//!
//! | Field            | Value                                   | Points |
//! |------------------|-----------------------------------------|--------|
//! | email            | present                                 | 5      |
//! | phone            | present                                 | 10     |
//! | conviction type  | misdemeanor / dui / felony / infraction | 20 / 15 / 10 / 5 |
//! | conviction age   | ≥5 years / 2–4 / 0–1                    | 15 / 10 / 5 |
//! | probation        | completed / none / active               | 20 / 15 / 5 |
//! | urgency          | immediate / within month                | 20 / 10 |
//! | reason           | employment / housing / licensing / other | 15 / 10 / 10 / 5 |
//!
//! Segments: ≥60 hot, ≥30 warm, otherwise cold.

use crate::models::{
    ConvictionType, Lead, LeadInput, LeadReason, LeadSegment, ProbationStatus, Urgency,
};

/// Minimum score for the hot segment
pub const HOT_THRESHOLD: u32 = 60;

/// Minimum score for the warm segment
pub const WARM_THRESHOLD: u32 = 30;

/// Scored subset of a lead
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadScoreInput {
    pub has_email: bool,
    pub has_phone: bool,
    pub conviction_type: Option<ConvictionType>,
    pub conviction_year: Option<i32>,
    pub probation_status: Option<ProbationStatus>,
    pub urgency: Option<Urgency>,
    pub reason: Option<LeadReason>,
}

impl From<&LeadInput> for LeadScoreInput {
    fn from(input: &LeadInput) -> Self {
        Self {
            has_email: !input.email.trim().is_empty(),
            has_phone: input.phone.as_deref().is_some_and(|p| !p.trim().is_empty()),
            conviction_type: input.conviction_type,
            conviction_year: input.conviction_year,
            probation_status: input.probation_status,
            urgency: input.urgency,
            reason: input.reason,
        }
    }
}

impl From<&Lead> for LeadScoreInput {
    fn from(lead: &Lead) -> Self {
        Self {
            has_email: !lead.email.trim().is_empty(),
            has_phone: lead.phone.as_deref().is_some_and(|p| !p.trim().is_empty()),
            conviction_type: lead.conviction_type,
            conviction_year: lead.conviction_year,
            probation_status: lead.probation_status,
            urgency: lead.urgency,
            reason: lead.reason,
        }
    }
}

/// Score + segment pair stored on the lead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadScore {
    pub score: u32,
    pub segment: LeadSegment,
}

/// Sum the point table for `input`
///
/// `current_year` anchors the conviction-age bonus; a conviction year in the
/// future earns nothing.
pub fn score_lead(input: &LeadScoreInput, current_year: i32) -> u32 {
    let mut score = 0;

    if input.has_email {
        score += 5;
    }
    if input.has_phone {
        score += 10;
    }

    score += match input.conviction_type {
        Some(ConvictionType::Misdemeanor) => 20,
        Some(ConvictionType::Dui) => 15,
        Some(ConvictionType::Felony) => 10,
        Some(ConvictionType::Infraction) => 5,
        Some(ConvictionType::Unknown) | None => 0,
    };

    if let Some(year) = input.conviction_year {
        score += match current_year - year {
            age if age >= 5 => 15,
            age if age >= 2 => 10,
            age if age >= 0 => 5,
            _ => 0,
        };
    }

    score += match input.probation_status {
        Some(ProbationStatus::Completed) => 20,
        Some(ProbationStatus::None) => 15,
        Some(ProbationStatus::Active) => 5,
        Some(ProbationStatus::Unknown) | None => 0,
    };

    score += match input.urgency {
        Some(Urgency::Immediate) => 20,
        Some(Urgency::WithinMonth) => 10,
        Some(Urgency::Researching) | None => 0,
    };

    score += match input.reason {
        Some(LeadReason::Employment) => 15,
        Some(LeadReason::Housing) | Some(LeadReason::Licensing) => 10,
        Some(LeadReason::Other) => 5,
        None => 0,
    };

    score
}

/// Bucket a score into its segment
pub fn segment_for(score: u32) -> LeadSegment {
    if score >= HOT_THRESHOLD {
        LeadSegment::Hot
    } else if score >= WARM_THRESHOLD {
        LeadSegment::Warm
    } else {
        LeadSegment::Cold
    }
}

/// Score and segment in one step
pub fn evaluate(input: &LeadScoreInput, current_year: i32) -> LeadScore {
    let score = score_lead(input, current_year);
    LeadScore {
        score,
        segment: segment_for(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YEAR: i32 = 2026;

    #[test]
    fn test_empty_input_scores_zero() {
        assert_eq!(score_lead(&LeadScoreInput::default(), YEAR), 0);
        assert_eq!(segment_for(0), LeadSegment::Cold);
    }

    #[test]
    fn test_full_point_table() {
        let input = LeadScoreInput {
            has_email: true,                                   // 5
            has_phone: true,                                   // 10
            conviction_type: Some(ConvictionType::Misdemeanor), // 20
            conviction_year: Some(2015),                       // 15
            probation_status: Some(ProbationStatus::Completed), // 20
            urgency: Some(Urgency::Immediate),                 // 20
            reason: Some(LeadReason::Employment),              // 15
        };
        assert_eq!(score_lead(&input, YEAR), 105);
    }

    #[test]
    fn test_typical_felony_lead() {
        let input = LeadScoreInput {
            has_email: true,                                // 5
            has_phone: false,                               // 0
            conviction_type: Some(ConvictionType::Felony),  // 10
            conviction_year: Some(2023),                    // 10 (3 years)
            probation_status: Some(ProbationStatus::Active), // 5
            urgency: Some(Urgency::Researching),            // 0
            reason: Some(LeadReason::Housing),              // 10
        };
        assert_eq!(score_lead(&input, YEAR), 40);
        assert_eq!(segment_for(40), LeadSegment::Warm);
    }

    #[test]
    fn test_conviction_age_bands() {
        let at = |year| LeadScoreInput {
            conviction_year: Some(year),
            ..Default::default()
        };
        assert_eq!(score_lead(&at(2021), YEAR), 15); // 5 years
        assert_eq!(score_lead(&at(2022), YEAR), 10); // 4 years
        assert_eq!(score_lead(&at(2024), YEAR), 10); // 2 years
        assert_eq!(score_lead(&at(2025), YEAR), 5); // 1 year
        assert_eq!(score_lead(&at(2026), YEAR), 5); // this year
        assert_eq!(score_lead(&at(2027), YEAR), 0); // future
    }

    #[test]
    fn test_segment_boundaries() {
        assert_eq!(segment_for(59), LeadSegment::Warm);
        assert_eq!(segment_for(60), LeadSegment::Hot);
        assert_eq!(segment_for(29), LeadSegment::Cold);
        assert_eq!(segment_for(30), LeadSegment::Warm);
    }

    #[test]
    fn test_blank_phone_not_counted() {
        let input = LeadInput {
            email: "jane@example.com".to_string(),
            phone: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(score_lead(&LeadScoreInput::from(&input), YEAR), 5);
    }

    #[test]
    fn test_evaluate_pairs_score_and_segment() {
        let input = LeadScoreInput {
            has_email: true,
            has_phone: true,
            conviction_type: Some(ConvictionType::Misdemeanor),
            conviction_year: Some(2020),
            urgency: Some(Urgency::WithinMonth),
            ..Default::default()
        };
        // 5 + 10 + 20 + 15 + 10
        assert_eq!(
            evaluate(&input, YEAR),
            LeadScore {
                score: 60,
                segment: LeadSegment::Hot
            }
        );
    }
}
