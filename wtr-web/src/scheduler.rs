//! Durable sequence scheduling and the email worker
//!
//! Enrolling a lead writes one `email_jobs` row per sequence step. The
//! [`EmailWorker`] polls for due rows, claims them, renders against the
//! lead's current data and hands them to the [`Mailer`](crate::email::Mailer).

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wtr_common::db::email_jobs::{self, PlannedStep};
use wtr_common::db::leads;
use wtr_common::db::settings::AutomationSettings;
use wtr_common::events::WtrEvent;
use wtr_common::models::EmailJob;
use wtr_common::{Error, Result};

use crate::email::sequences::{find_sequence, Sequence};
use crate::email::templates::TemplateContext;
use crate::email::EmailMessage;
use crate::AppState;

/// Schedule every step of `sequence` for a lead
///
/// Idempotent: steps that already exist for the lead are left alone.
/// Returns the number of jobs created.
pub async fn enroll(
    db: &sqlx::SqlitePool,
    lead_id: &str,
    sequence: &Sequence,
    enrolled_at: DateTime<Utc>,
) -> Result<u64> {
    let steps: Vec<PlannedStep> = sequence
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| PlannedStep {
            step_index: index as i64,
            due_at_ms: step.delay.due_at(enrolled_at).timestamp_millis(),
        })
        .collect();

    let created = email_jobs::enqueue(db, lead_id, sequence.name, &steps, enrolled_at).await?;
    if created > 0 {
        info!(lead_id, sequence = sequence.name, created, "Enrolled lead in sequence");
    }
    Ok(created)
}

/// What happened to one claimed job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Sent,
    /// Stop condition held or lead gone; job cancelled
    Skipped,
    /// Send failed, re-queued with backoff
    Retried,
    /// Send failed for the last time
    Failed,
}

/// Tally of one [`EmailWorker::process_batch`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub claimed: usize,
    pub sent: usize,
    pub skipped: usize,
    pub retried: usize,
    pub failed: usize,
    /// Jobs whose status could not be written; left in `sending`
    pub errored: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Sent => self.sent += 1,
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::Retried => self.retried += 1,
            JobOutcome::Failed => self.failed += 1,
        }
    }
}

/// Polls and sends due sequence emails
pub struct EmailWorker {
    state: AppState,
    settings: AutomationSettings,
}

impl EmailWorker {
    pub fn new(state: AppState, settings: AutomationSettings) -> Self {
        Self { state, settings }
    }

    /// Claim and process one batch of due jobs
    ///
    /// A failure on one job is recorded against that job only; the rest of
    /// the batch still runs.
    pub async fn process_batch(&self, now: DateTime<Utc>) -> Result<BatchReport> {
        let jobs =
            email_jobs::claim_due(&self.state.db, now.timestamp_millis(), self.settings.batch_size)
                .await?;

        let mut report = BatchReport {
            claimed: jobs.len(),
            ..Default::default()
        };

        for job in jobs {
            let outcome = match self.process_job(&job, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(job_id = job.id, "Email job errored: {}", e);
                    match self.handle_send_failure(&job, &e.to_string(), now).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(job_id = job.id, "Failed to record email job failure: {}", e);
                            report.errored += 1;
                            continue;
                        }
                    }
                }
            };
            report.record(outcome);
        }

        if report.claimed > 0 {
            info!(
                claimed = report.claimed,
                sent = report.sent,
                skipped = report.skipped,
                retried = report.retried,
                failed = report.failed,
                errored = report.errored,
                "Processed email batch"
            );
        }
        Ok(report)
    }

    async fn process_job(&self, job: &EmailJob, now: DateTime<Utc>) -> Result<JobOutcome> {
        let db = &self.state.db;

        let Some(sequence) = find_sequence(&job.sequence) else {
            email_jobs::mark_failed(db, job.id, "Unknown sequence", None).await?;
            return Ok(JobOutcome::Failed);
        };
        let Some(step) = sequence.step(job.step_index) else {
            email_jobs::mark_failed(db, job.id, "Unknown sequence step", None).await?;
            return Ok(JobOutcome::Failed);
        };

        let lead = match leads::get(db, &job.lead_id).await {
            Ok(lead) => lead,
            Err(Error::NotFound(_)) => {
                email_jobs::mark_cancelled(db, job.id, "Lead not found").await?;
                return Ok(JobOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        if sequence.should_stop(&lead) {
            let reason = if lead.unsubscribed {
                "Lead unsubscribed"
            } else {
                "Stop condition met"
            };
            debug!(job_id = job.id, lead_id = %lead.id, reason, "Skipping email job");
            email_jobs::mark_cancelled(db, job.id, reason).await?;
            return Ok(JobOutcome::Skipped);
        }

        let content = step
            .template
            .render(&TemplateContext::for_lead(&lead, &self.state.site));
        let message = EmailMessage::new(lead.email.clone(), content);

        match self.state.mailer.send(&message).await {
            Ok(()) => {
                // Delivered already; never fall through to the retry path
                if let Err(e) = email_jobs::mark_sent(db, job.id, now).await {
                    error!(job_id = job.id, "Email sent but not recorded: {}", e);
                }
                self.state.events.emit_lossy(WtrEvent::EmailSent {
                    job_id: job.id,
                    lead_id: job.lead_id.clone(),
                    sequence: job.sequence.clone(),
                    step_index: job.step_index,
                    timestamp: now,
                });
                debug!(job_id = job.id, sequence = %job.sequence, step = job.step_index, "Sent sequence email");
                Ok(JobOutcome::Sent)
            }
            Err(e) => self.handle_send_failure(job, &e.to_string(), now).await,
        }
    }

    /// Re-queue with linear backoff, or fail for good after the last attempt
    async fn handle_send_failure(
        &self,
        job: &EmailJob,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<JobOutcome> {
        let permanent = job.attempts >= i64::from(self.settings.max_attempts);
        let retry_at_ms = if permanent {
            None
        } else {
            let backoff_ms = self.settings.retry_backoff.as_millis() as i64 * job.attempts.max(1);
            Some(now.timestamp_millis() + backoff_ms)
        };

        email_jobs::mark_failed(&self.state.db, job.id, reason, retry_at_ms).await?;

        if permanent {
            error!(
                job_id = job.id,
                attempts = job.attempts,
                "Email job failed permanently: {}",
                reason
            );
        } else {
            warn!(
                job_id = job.id,
                attempts = job.attempts,
                "Email send failed, will retry: {}",
                reason
            );
        }

        self.state.events.emit_lossy(WtrEvent::EmailFailed {
            job_id: job.id,
            lead_id: job.lead_id.clone(),
            sequence: job.sequence.clone(),
            step_index: job.step_index,
            error: reason.to_string(),
            permanent,
            timestamp: now,
        });

        Ok(if permanent {
            JobOutcome::Failed
        } else {
            JobOutcome::Retried
        })
    }

    /// Poll until `cancel` fires
    ///
    /// Jobs stranded in `sending` by an earlier crash are returned to the
    /// queue first.
    pub async fn run(self, cancel: CancellationToken) {
        match email_jobs::reset_stale_sending(&self.state.db).await {
            Ok(0) => {}
            Ok(reset) => warn!("Recovered {} email jobs left in sending state", reset),
            Err(e) => error!("Failed to recover stale email jobs: {}", e),
        }

        info!(
            poll_secs = self.settings.poll_interval.as_secs(),
            batch_size = self.settings.batch_size,
            "Email worker started"
        );

        loop {
            if let Err(e) = self.process_batch(Utc::now()).await {
                error!("Email batch failed: {}", e);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        info!("Email worker stopped");
    }
}
