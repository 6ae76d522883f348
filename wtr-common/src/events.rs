//! Event types and EventBus
//!
//! Domain events are broadcast in-process and streamed to the admin live
//! feed over SSE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{ConversionStage, LeadSegment, OrderStatus, PaymentStatus};

/// WTR event types
///
/// Serialized with a `type` tag for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WtrEvent {
    /// Intake form produced a new lead (or refreshed an existing one)
    ///
    /// Emitted after the lead is stored, before trigger rules are evaluated.
    LeadCaptured {
        lead_id: String,
        score: u32,
        segment: LeadSegment,
        /// False when the email already existed and the lead was updated
        is_new: bool,
        timestamp: DateTime<Utc>,
    },

    /// Behavior counters changed (analytics event referencing the lead)
    LeadActivity {
        lead_id: String,
        event_name: String,
        timestamp: DateTime<Utc>,
    },

    /// Funnel stage changed (admin edit or payment webhook)
    LeadStageChanged {
        lead_id: String,
        old_stage: ConversionStage,
        new_stage: ConversionStage,
        timestamp: DateTime<Utc>,
    },

    /// Lead opted out of marketing email
    LeadUnsubscribed {
        lead_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Checkout created an order
    OrderCreated {
        order_id: String,
        order_number: String,
        lead_id: Option<String>,
        total_cents: i64,
        timestamp: DateTime<Utc>,
    },

    /// Fulfilment status changed
    OrderStatusChanged {
        order_id: String,
        old_status: OrderStatus,
        new_status: OrderStatus,
        timestamp: DateTime<Utc>,
    },

    /// Payment webhook processed
    PaymentRecorded {
        order_id: String,
        lead_id: Option<String>,
        payment_status: PaymentStatus,
        timestamp: DateTime<Utc>,
    },

    /// A scheduled sequence email was delivered to the relay
    EmailSent {
        job_id: i64,
        lead_id: String,
        sequence: String,
        step_index: i64,
        timestamp: DateTime<Utc>,
    },

    /// A scheduled sequence email failed to send
    EmailFailed {
        job_id: i64,
        lead_id: String,
        sequence: String,
        step_index: i64,
        error: String,
        /// True when no further retry will be attempted
        permanent: bool,
        timestamp: DateTime<Utc>,
    },
}

impl WtrEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            WtrEvent::LeadCaptured { .. } => "LeadCaptured",
            WtrEvent::LeadActivity { .. } => "LeadActivity",
            WtrEvent::LeadStageChanged { .. } => "LeadStageChanged",
            WtrEvent::LeadUnsubscribed { .. } => "LeadUnsubscribed",
            WtrEvent::OrderCreated { .. } => "OrderCreated",
            WtrEvent::OrderStatusChanged { .. } => "OrderStatusChanged",
            WtrEvent::PaymentRecorded { .. } => "PaymentRecorded",
            WtrEvent::EmailSent { .. } => "EmailSent",
            WtrEvent::EmailFailed { .. } => "EmailFailed",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use wtr_common::events::{EventBus, WtrEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(WtrEvent::LeadUnsubscribed {
///     lead_id: "lead-1".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(WtrEvent::LeadUnsubscribed { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WtrEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<WtrEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: WtrEvent) -> Result<usize, broadcast::error::SendError<WtrEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: WtrEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsubscribed(id: &str) -> WtrEvent {
        WtrEvent::LeadUnsubscribed {
            lead_id: id.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        assert!(bus.emit(unsubscribed("a")).is_err());
        bus.emit_lossy(unsubscribed("a"));
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_event() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.emit(unsubscribed("lead-7")).unwrap(), 2);

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                WtrEvent::LeadUnsubscribed { lead_id, .. } => assert_eq!(lead_id, "lead-7"),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_serialized_with_type_tag() {
        let json = serde_json::to_value(WtrEvent::LeadStageChanged {
            lead_id: "lead-1".to_string(),
            old_stage: ConversionStage::Lead,
            new_stage: ConversionStage::DiyPurchased,
            timestamp: Utc::now(),
        })
        .unwrap();

        assert_eq!(json["type"], "LeadStageChanged");
        assert_eq!(json["new_stage"], "diy_purchased");
    }

    #[test]
    fn test_event_type_matches_serde_tag() {
        let event = unsubscribed("x");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.event_type());
    }
}
