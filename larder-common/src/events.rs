//! Event types for the larder event system
//!
//! Provides shared event definitions and EventBus for larder services.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Larder workflow events
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
/// All events use this central enum for type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LarderEvent {
    /// A receipt was accepted and dispatched for extraction
    ///
    /// Triggers:
    /// - SSE: show the new receipt as pending
    ReceiptSubmitted {
        /// Receipt UUID
        receipt_id: Uuid,
        /// When the receipt was submitted
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Extraction status advanced (pending → processing)
    ReceiptStatusChanged {
        /// Receipt UUID
        receipt_id: Uuid,
        /// Status before change
        old_status: String,
        /// Status after change
        new_status: String,
        /// When status changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Extraction finished and line items are available for selection
    ///
    /// Triggers:
    /// - SSE: render line items, surface the duplicate advisory
    ReceiptCompleted {
        /// Receipt UUID
        receipt_id: Uuid,
        /// Number of extracted line items
        line_item_count: usize,
        /// Advisory duplicate flag from the extraction service
        is_duplicate: bool,
        /// When completion was observed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Extraction reported a terminal failure
    ReceiptFailed {
        /// Receipt UUID
        receipt_id: Uuid,
        /// Failure description from the extraction service
        error: String,
        /// When failure was observed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The poll bound was exhausted before a terminal status arrived
    ///
    /// The receipt itself is untouched; the client should re-check later.
    ReceiptPollTimedOut {
        /// Receipt UUID
        receipt_id: Uuid,
        /// Number of status queries issued before giving up
        attempts: u32,
        /// When polling stopped
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Selected line items were merged into inventory
    ItemsCommitted {
        /// Receipt UUID
        receipt_id: Uuid,
        /// Number of inventory entities created
        merged_count: usize,
        /// When the commit transaction completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A receipt and its stored image were removed
    ReceiptDeleted {
        /// Receipt UUID
        receipt_id: Uuid,
        /// When deletion completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl LarderEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            LarderEvent::ReceiptSubmitted { .. } => "ReceiptSubmitted",
            LarderEvent::ReceiptStatusChanged { .. } => "ReceiptStatusChanged",
            LarderEvent::ReceiptCompleted { .. } => "ReceiptCompleted",
            LarderEvent::ReceiptFailed { .. } => "ReceiptFailed",
            LarderEvent::ReceiptPollTimedOut { .. } => "ReceiptPollTimedOut",
            LarderEvent::ItemsCommitted { .. } => "ItemsCommitted",
            LarderEvent::ReceiptDeleted { .. } => "ReceiptDeleted",
        }
    }

    /// Receipt this event concerns
    pub fn receipt_id(&self) -> Uuid {
        match self {
            LarderEvent::ReceiptSubmitted { receipt_id, .. }
            | LarderEvent::ReceiptStatusChanged { receipt_id, .. }
            | LarderEvent::ReceiptCompleted { receipt_id, .. }
            | LarderEvent::ReceiptFailed { receipt_id, .. }
            | LarderEvent::ReceiptPollTimedOut { receipt_id, .. }
            | LarderEvent::ItemsCommitted { receipt_id, .. }
            | LarderEvent::ReceiptDeleted { receipt_id, .. } => *receipt_id,
        }
    }
}

/// Event bus for broadcasting events to multiple subscribers
///
/// Uses tokio broadcast channel. Subscribers that fall behind lose the
/// oldest buffered events rather than blocking emitters.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LarderEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use larder_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<LarderEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LarderEvent,
    ) -> Result<usize, broadcast::error::SendError<LarderEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Workflow notifications are advisory; nothing in the state machine
    /// depends on a listener being present.
    pub fn emit_lossy(&self, event: LarderEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Channel capacity this bus was created with
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
