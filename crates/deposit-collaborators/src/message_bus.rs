use async_trait::async_trait;
use deposit_primitives::ResourceId;

use crate::errors::BusError;

/// The resource kind a [`TriggerEvent`] concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Submission,
    Deposit,
}

/// A trigger event as delivered by the message bus, carrying the same
/// `{resourceType, eventType, timestamp, id}` fields the wire headers do.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub resource_type: ResourceType,
    pub event_type: String,
    pub timestamp: String,
    pub id: ResourceId,
    delivery_tag: String,
}

impl TriggerEvent {
    pub fn new(
        resource_type: ResourceType,
        event_type: impl Into<String>,
        timestamp: impl Into<String>,
        id: ResourceId,
        delivery_tag: impl Into<String>,
    ) -> Self {
        Self {
            resource_type,
            event_type: event_type.into(),
            timestamp: timestamp.into(),
            id,
            delivery_tag: delivery_tag.into(),
        }
    }

    /// The opaque tag the bus needs back to acknowledge this specific delivery.
    pub fn delivery_tag(&self) -> &str {
        &self.delivery_tag
    }
}

/// Delivers trigger events for submissions and deposits. The core
/// acknowledges each message only after it has finished handling it, so a
/// crash between receipt and ack results in redelivery rather than silent
/// loss.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn recv(&self) -> Result<TriggerEvent, BusError>;
    async fn ack(&self, event: &TriggerEvent) -> Result<(), BusError>;
}
