//! Stateless pub-sub event delivery
//!
//! Components of the engine publish events (an order was placed, a payment succeeded, ...) and any number of hooks can
//! react to them. A handler only ever sees the event itself, never the engine's internal state. Handlers are async and
//! each event is handled on its own task.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use log::*;
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size);
        Self { listener, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped and all in-flight events have been handled.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // The handler's own sender must go, otherwise the channel never closes.
        drop(self.sender);
        let in_flight = Arc::new(AtomicUsize::new(0));
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            let counter = Arc::clone(&in_flight);
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                (handler)(ev).await;
                counter.fetch_sub(1, Ordering::SeqCst);
                trace!("📬️ Event handled");
            });
        }
        while in_flight.load(Ordering::SeqCst) > 0 {
            trace!("📬️ Waiting for {} event jobs to complete", in_flight.load(Ordering::SeqCst));
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}
