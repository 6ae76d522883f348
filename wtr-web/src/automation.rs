//! Trigger evaluation and sequence stop handling
//!
//! Triggers are evaluated when a lead is captured, when an analytics event
//! references a lead, and periodically by the sweep so time-based rules
//! (`diy_upgrade`, `gone_cold`) fire without new traffic.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wtr_common::db::{email_jobs, leads};
use wtr_common::models::Lead;
use wtr_common::Result;

use crate::email::promo_sequences::PROMO_SEQUENCES;
use crate::email::sequences::{find_sequence, BEHAVIORAL_SEQUENCES};
use crate::email::triggers::{match_trigger, BehaviorSnapshot, TriggerMatch};
use crate::scheduler::enroll;
use crate::AppState;

/// Match the lead against the trigger rules and enroll on a new match
///
/// Returns the match only when it produced new jobs; a lead already in the
/// matched sequence is left as is.
pub async fn evaluate_lead(
    state: &AppState,
    lead_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<TriggerMatch>> {
    let lead = leads::get(&state.db, lead_id).await?;

    let Some(matched) = match_trigger(&lead, &BehaviorSnapshot::from_lead(&lead, now)) else {
        return Ok(None);
    };

    if email_jobs::is_enrolled(&state.db, lead_id, matched.sequence).await? {
        debug!(lead_id, sequence = matched.sequence, "Already enrolled");
        return Ok(None);
    }

    let Some(sequence) = find_sequence(matched.sequence) else {
        warn!(rule = matched.rule, sequence = matched.sequence, "Trigger names unknown sequence");
        return Ok(None);
    };

    let created = enroll(&state.db, lead_id, sequence, now).await?;
    if created == 0 {
        return Ok(None);
    }

    info!(
        lead_id,
        rule = matched.rule,
        priority = matched.priority,
        sequence = matched.sequence,
        "Trigger matched"
    );
    Ok(Some(matched))
}

/// Cancel pending jobs in every sequence that should no longer reach `lead`
///
/// Returns the number of jobs cancelled.
pub async fn apply_stop_conditions(state: &AppState, lead: &Lead) -> Result<u64> {
    if lead.unsubscribed {
        return email_jobs::cancel_pending_for_lead(&state.db, &lead.id, None, "Lead unsubscribed")
            .await;
    }

    let stopped: Vec<&str> = BEHAVIORAL_SEQUENCES
        .iter()
        .chain(PROMO_SEQUENCES.iter())
        .filter(|sequence| sequence.stop_when.holds_for(lead))
        .map(|sequence| sequence.name)
        .collect();

    let cancelled = email_jobs::cancel_pending_for_lead(
        &state.db,
        &lead.id,
        Some(stopped.as_slice()),
        "Stop condition met",
    )
    .await?;

    if cancelled > 0 {
        info!(lead_id = %lead.id, cancelled, "Cancelled sequence emails after stop condition");
    }
    Ok(cancelled)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evaluated: usize,
    pub enrolled: usize,
    pub errors: usize,
}

/// Re-evaluate triggers for every lead still eligible for automation
pub async fn run_sweep(state: &AppState, now: DateTime<Utc>) -> Result<SweepReport> {
    let candidates = leads::automation_candidates(&state.db).await?;
    let mut report = SweepReport::default();

    for lead_id in candidates {
        report.evaluated += 1;
        match evaluate_lead(state, &lead_id, now).await {
            Ok(Some(_)) => report.enrolled += 1,
            Ok(None) => {}
            Err(e) => {
                report.errors += 1;
                warn!(lead_id = %lead_id, "Trigger evaluation failed: {}", e);
            }
        }
    }

    info!(
        evaluated = report.evaluated,
        enrolled = report.enrolled,
        errors = report.errors,
        "Automation sweep complete"
    );
    Ok(report)
}

/// Run [`run_sweep`] every `interval` until cancelled
pub fn spawn_sweep(
    state: AppState,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = run_sweep(&state, Utc::now()).await {
                        error!("Automation sweep failed: {}", e);
                    }
                }
            }
        }

        info!("Automation sweep stopped");
    })
}
