//! Order event publication.
//!
//! Every terminal order transition is announced twice: once on its own
//! channel (`pos:events:order.created`, ...) and once on the fan-out channel
//! `pos:events:all`. Publication runs after the database commit and is
//! best-effort: a broker failure is logged, never surfaced. Consumers must
//! be idempotent (at-least-once delivery).

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::warn;

use mercur_core::error::ServiceResult;
use mercur_core::money::Money;
use mercur_core::types::{DocumentType, PaidStatus};

/// Fan-out channel receiving every order event.
pub const ALL_EVENTS_CHANNEL: &str = "pos:events:all";

/// The kind of order transition being announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEventType {
    Created,
    Updated,
    Voided,
    Returned,
    PaymentProcessed,
}

impl OrderEventType {
    /// The wire name, also the channel suffix.
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderEventType::Created => "order.created",
            OrderEventType::Updated => "order.updated",
            OrderEventType::Voided => "order.voided",
            OrderEventType::Returned => "order.returned",
            OrderEventType::PaymentProcessed => "payment.processed",
        }
    }

    /// The dedicated channel for this event type.
    pub fn channel(self) -> String {
        format!("pos:events:{}", self.as_str())
    }
}

/// The JSON payload published for an order transition.
///
/// `paid_status` and `document_type` carry wire tags; `order_data` is the
/// full order snapshot as returned by the order engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub event_type: String,
    pub order_id: i64,
    pub document_number: String,
    pub cashier_id: i64,
    pub total_amount: Money,
    pub paid_status: i32,
    pub document_type: i32,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_data: Option<serde_json::Value>,
}

impl OrderEvent {
    pub fn new(
        event_type: OrderEventType,
        order_id: i64,
        document_number: impl Into<String>,
        cashier_id: i64,
        total_amount: Money,
        paid_status: PaidStatus,
        document_type: DocumentType,
        order_data: Option<serde_json::Value>,
    ) -> Self {
        OrderEvent {
            event_type: event_type.as_str().to_string(),
            order_id,
            document_number: document_number.into(),
            cashier_id,
            total_amount,
            paid_status: paid_status.as_i32(),
            document_type: document_type.as_i32(),
            timestamp: Utc::now(),
            order_data,
        }
    }
}

/// Publishes order events to the broker.
#[derive(Clone)]
pub struct EventPublisher {
    conn: ConnectionManager,
}

impl EventPublisher {
    pub async fn connect(url: &str) -> ServiceResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(EventPublisher { conn })
    }

    /// Publishes on the event's own channel and on the fan-out channel.
    /// Failures are logged and swallowed.
    pub async fn publish(&self, event_type: OrderEventType, event: &OrderEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(event = event_type.as_str(), error = %e, "failed to encode order event");
                return;
            }
        };

        let mut conn = self.conn.clone();
        for channel in [event_type.channel(), ALL_EVENTS_CHANNEL.to_string()] {
            if let Err(e) = conn.publish::<_, _, ()>(&channel, &payload).await {
                warn!(
                    channel,
                    event = event_type.as_str(),
                    order_id = event.order_id,
                    error = %e,
                    "order event publish failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels() {
        assert_eq!(OrderEventType::Created.channel(), "pos:events:order.created");
        assert_eq!(OrderEventType::Voided.channel(), "pos:events:order.voided");
        assert_eq!(
            OrderEventType::PaymentProcessed.channel(),
            "pos:events:payment.processed"
        );
        assert_eq!(ALL_EVENTS_CHANNEL, "pos:events:all");
    }

    #[test]
    fn payload_shape() {
        let event = OrderEvent::new(
            OrderEventType::Created,
            12,
            "INV-100",
            3,
            Money::parse("19.80").unwrap(),
            PaidStatus::Pending,
            DocumentType::Sale,
            None,
        );
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();

        assert_eq!(value["event_type"], "order.created");
        assert_eq!(value["order_id"], 12);
        assert_eq!(value["document_number"], "INV-100");
        assert_eq!(value["total_amount"], "19.80");
        assert_eq!(value["paid_status"], 1);
        assert_eq!(value["document_type"], 1);
        assert!(value.get("order_data").is_none());
    }
}
