//! Typed platform events and the background event queue.
//!
//! The host platform reports two things: a person or company contact was
//! saved, and an order was finalized. Library callers can hand these straight
//! to the [`Dispatcher`]; the HTTP webhooks instead publish them onto an
//! [`EventQueue`] so the platform's request returns before Mailchimp is
//! contacted.

use serde::{Deserialize, Serialize};
use shop_mailchimp_core::{Contact, Order};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::dispatcher::{Dispatcher, ShopOutcome};

/// A person or company contact was saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySaved {
    pub contact: Contact,
}

/// An order was finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFinalized {
    pub order: Order,
}

/// Any event the addon reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    EntitySaved(EntitySaved),
    OrderFinalized(OrderFinalized),
}

impl SyncEvent {
    /// Event name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EntitySaved(_) => "entity_saved",
            Self::OrderFinalized(_) => "order_finalized",
        }
    }
}

impl From<EntitySaved> for SyncEvent {
    fn from(event: EntitySaved) -> Self {
        Self::EntitySaved(event)
    }
}

impl From<OrderFinalized> for SyncEvent {
    fn from(event: OrderFinalized) -> Self {
        Self::OrderFinalized(event)
    }
}

impl Dispatcher {
    /// Entry point for saved person/company contacts.
    pub async fn on_entity_saved(&self, event: &EntitySaved) -> Vec<ShopOutcome> {
        self.sync_contact(&event.contact).await
    }

    /// Entry point for finalized orders.
    pub async fn on_order_finalized(&self, event: &OrderFinalized) -> Vec<ShopOutcome> {
        self.sync_from_order(&event.order).await
    }

    /// Route any event to its entry point.
    pub async fn handle(&self, event: &SyncEvent) -> Vec<ShopOutcome> {
        match event {
            SyncEvent::EntitySaved(e) => self.on_entity_saved(e).await,
            SyncEvent::OrderFinalized(e) => self.on_order_finalized(e).await,
        }
    }
}

/// Errors when publishing onto the queue.
#[derive(Debug, Error)]
pub enum EventQueueError {
    /// The queue is at capacity.
    #[error("event queue is full")]
    Full,
    /// The worker has stopped.
    #[error("event queue is closed")]
    Closed,
}

/// Sending half of the event queue.
#[derive(Debug, Clone)]
pub struct EventQueue {
    sender: mpsc::Sender<SyncEvent>,
}

impl EventQueue {
    /// Start a worker that feeds queued events to `dispatcher` one at a time.
    ///
    /// The worker exits once every `EventQueue` clone has been dropped and
    /// the remaining events are handled.
    #[must_use]
    pub fn spawn(dispatcher: Dispatcher, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(dispatcher, receiver));
        (Self { sender }, worker)
    }

    /// Queue an event without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue is full or the worker has stopped.
    pub fn publish(&self, event: SyncEvent) -> Result<(), EventQueueError> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EventQueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EventQueueError::Closed,
        })
    }
}

async fn run_worker(dispatcher: Dispatcher, mut receiver: mpsc::Receiver<SyncEvent>) {
    tracing::info!("Event worker started");
    while let Some(event) = receiver.recv().await {
        handle_queued(&dispatcher, &event).await;
    }
    tracing::info!("Event worker stopped");
}

#[instrument(skip(dispatcher, event), fields(event = event.name()))]
async fn handle_queued(dispatcher: &Dispatcher, event: &SyncEvent) {
    let outcomes = dispatcher.handle(event).await;
    let synced = outcomes.iter().filter(|o| o.outcome.is_synced()).count();
    tracing::debug!(shops = outcomes.len(), synced, "Event handled");
}
