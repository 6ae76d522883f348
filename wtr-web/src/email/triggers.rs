//! Behavioral trigger rules
//!
//! Rules are scanned in declaration order and the first match wins.
//! `priority` is reported with the match but does not affect selection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use wtr_common::models::{ConversionStage, Lead, LeadSegment};
use wtr_common::time::days_between;

/// Behavior signals a rule can inspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BehaviorSnapshot {
    pub abandoned_checkout: bool,
    pub visited_pricing: bool,
    pub emails_opened: i64,
    pub emails_clicked: i64,
    pub days_since_signup: i64,
    pub days_since_activity: i64,
}

impl BehaviorSnapshot {
    pub fn from_lead(lead: &Lead, now: DateTime<Utc>) -> Self {
        Self {
            abandoned_checkout: lead.abandoned_checkout,
            visited_pricing: lead.visited_pricing,
            emails_opened: lead.emails_opened,
            emails_clicked: lead.emails_clicked,
            days_since_signup: i64::from(days_between(lead.created_at, now)),
            days_since_activity: i64::from(days_between(lead.last_activity_at, now)),
        }
    }
}

pub type TriggerPredicate = fn(&Lead, &BehaviorSnapshot) -> bool;

#[derive(Clone, Copy)]
pub struct TriggerRule {
    pub name: &'static str,
    pub priority: u32,
    /// Sequence to enroll the lead in
    pub sequence: &'static str,
    pub predicate: TriggerPredicate,
}

impl std::fmt::Debug for TriggerRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerRule")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Winning rule for a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TriggerMatch {
    pub rule: &'static str,
    pub priority: u32,
    pub sequence: &'static str,
}

pub const TRIGGER_RULES: &[TriggerRule] = &[
    TriggerRule {
        name: "abandoned_checkout",
        priority: 90,
        sequence: "abandoned_cart",
        predicate: |lead, behavior| behavior.abandoned_checkout && !lead.has_paid,
    },
    TriggerRule {
        name: "diy_upgrade",
        priority: 70,
        sequence: "diy_upgrade",
        predicate: |lead, behavior| {
            lead.conversion_stage == ConversionStage::DiyPurchased
                && behavior.days_since_signup >= 3
        },
    },
    TriggerRule {
        name: "hot_lead",
        priority: 80,
        sequence: "hot_lead",
        predicate: |lead, _| lead.lead_segment == LeadSegment::Hot && !lead.has_paid,
    },
    TriggerRule {
        name: "pricing_visitor",
        priority: 60,
        sequence: "pricing_follow_up",
        predicate: |lead, behavior| behavior.visited_pricing && !lead.has_paid,
    },
    TriggerRule {
        name: "engaged_no_click",
        priority: 40,
        sequence: "engaged_nurture",
        predicate: |_, behavior| behavior.emails_opened >= 3 && behavior.emails_clicked == 0,
    },
    TriggerRule {
        name: "gone_cold",
        priority: 30,
        sequence: "re_engagement",
        predicate: |lead, behavior| behavior.days_since_activity >= 14 && !lead.has_paid,
    },
    TriggerRule {
        name: "new_lead",
        priority: 10,
        sequence: "welcome",
        predicate: |lead, _| lead.conversion_stage == ConversionStage::Lead && !lead.has_paid,
    },
];

/// First rule in [`TRIGGER_RULES`] whose predicate holds
pub fn match_trigger(lead: &Lead, behavior: &BehaviorSnapshot) -> Option<TriggerMatch> {
    match_rules(TRIGGER_RULES, lead, behavior)
}

pub fn match_rules(
    rules: &[TriggerRule],
    lead: &Lead,
    behavior: &BehaviorSnapshot,
) -> Option<TriggerMatch> {
    if lead.unsubscribed {
        return None;
    }

    let mut matching = rules.iter().filter(|rule| (rule.predicate)(lead, behavior));
    let winner = matching.next()?;

    if let Some(outranking) = matching.find(|rule| rule.priority > winner.priority) {
        debug!(
            lead_id = %lead.id,
            winner = winner.name,
            winner_priority = winner.priority,
            outranked_by = outranking.name,
            outranking_priority = outranking.priority,
            "Later trigger rule declares higher priority than first match"
        );
    }

    Some(TriggerMatch {
        rule: winner.name,
        priority: winner.priority,
        sequence: winner.sequence,
    })
}
