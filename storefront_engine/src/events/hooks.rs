use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderCancelledEvent,
    OrderCreatedEvent,
    OrderReconciledEvent,
    OrderStatusChangedEvent,
    PaymentCreatedEvent,
    PaymentStatusChangedEvent,
};

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_created_producer: Vec<EventProducer<OrderCreatedEvent>>,
    pub order_cancelled_producer: Vec<EventProducer<OrderCancelledEvent>>,
    pub order_status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub payment_created_producer: Vec<EventProducer<PaymentCreatedEvent>>,
    pub payment_status_changed_producer: Vec<EventProducer<PaymentStatusChangedEvent>>,
    pub order_reconciled_producer: Vec<EventProducer<OrderReconciledEvent>>,
}

pub struct EventHandlers {
    pub on_order_created: Option<EventHandler<OrderCreatedEvent>>,
    pub on_order_cancelled: Option<EventHandler<OrderCancelledEvent>>,
    pub on_order_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_payment_created: Option<EventHandler<PaymentCreatedEvent>>,
    pub on_payment_status_changed: Option<EventHandler<PaymentStatusChangedEvent>>,
    pub on_order_reconciled: Option<EventHandler<OrderReconciledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_created: hooks.on_order_created.map(|f| EventHandler::new(buffer_size, f)),
            on_order_cancelled: hooks.on_order_cancelled.map(|f| EventHandler::new(buffer_size, f)),
            on_order_status_changed: hooks.on_order_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_payment_created: hooks.on_payment_created.map(|f| EventHandler::new(buffer_size, f)),
            on_payment_status_changed: hooks.on_payment_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_order_reconciled: hooks.on_order_reconciled.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_created {
            result.order_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_cancelled {
            result.order_cancelled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_status_changed {
            result.order_status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_created {
            result.payment_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_status_changed {
            result.payment_status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_reconciled {
            result.order_reconciled_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per registered hook. Each task ends once all producers for its event type are dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_created {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_cancelled {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_created {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_reconciled {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_order_cancelled: Option<Handler<OrderCancelledEvent>>,
    pub on_order_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_payment_created: Option<Handler<PaymentCreatedEvent>>,
    pub on_payment_status_changed: Option<Handler<PaymentStatusChangedEvent>>,
    pub on_order_reconciled: Option<Handler<OrderReconciledEvent>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_order_cancelled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCancelledEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_cancelled = Some(Arc::new(f));
        self
    }

    pub fn on_order_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_payment_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentCreatedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_payment_created = Some(Arc::new(f));
        self
    }

    pub fn on_payment_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentStatusChangedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_payment_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_order_reconciled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderReconciledEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_reconciled = Some(Arc::new(f));
        self
    }
}
