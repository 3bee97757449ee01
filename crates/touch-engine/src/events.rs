//! Engine event bus.
//!
//! Hosts observe registrations, submissions and bracket transitions
//! through a tokio broadcast channel. Nothing inside the engine depends
//! on a receiver being present.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use touch_core::{OrderReceipt, OrderSpec};

use crate::store::ConditionId;

/// Why an order was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiringKind {
    /// A plain touch condition matched.
    Touch,
    /// A bracket's stop-loss side matched.
    BracketLoss,
    /// A bracket's take-profit side matched.
    BracketProfit,
    /// Direct entry placed with a bracket attached.
    Entry,
}

impl FiringKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Touch => "touch",
            Self::BracketLoss => "loss",
            Self::BracketProfit => "profit",
            Self::Entry => "entry",
        }
    }
}

/// Events emitted by the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    ConditionRegistered {
        id: ConditionId,
        code: String,
    },

    ConditionRemoved {
        id: ConditionId,
        code: String,
    },

    OrderSubmitted {
        condition_id: Option<ConditionId>,
        code: String,
        kind: FiringKind,
        order: OrderSpec,
        receipt: OrderReceipt,
        timestamp: DateTime<Utc>,
    },

    /// The broker refused a fired order. The condition stays executed.
    SubmitFailed {
        condition_id: Option<ConditionId>,
        code: String,
        kind: FiringKind,
        reason: String,
    },

    /// Entry acknowledged; bracket compiled and waiting for the fill.
    BracketPrepared {
        code: String,
        seqno: String,
    },

    BracketArmed {
        id: ConditionId,
        code: String,
        seqno: String,
    },
}

/// Broadcast bus for [`EngineEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Capacity bounds how far a slow receiver can fall behind before
    /// it starts lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Send to all receivers. Returns how many got it.
    pub fn send(&self, event: EngineEvent) -> usize {
        // No receivers is fine.
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
