//! In-process event bus.
//!
//! # Responsibility
//! - Keep an ordered list of subscribers for the process lifetime.
//! - Fan every published message out to all subscribers synchronously.
//!
//! # Invariants
//! - Delivery order equals registration order.
//! - There is no unsubscribe; handlers live as long as the bus.
//! - A panicking handler never prevents delivery to later handlers.
//! - `publish` never suspends and never fails structurally.

use crate::action::BusMessage;
use log::{debug, error};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock, Weak};

type Handler = Arc<dyn Fn(&BusMessage) + Send + Sync>;

/// Delivery summary for one `publish` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishReport {
    /// Handlers that returned normally.
    pub delivered: usize,
    /// Handlers that panicked while handling the message.
    pub failed: usize,
}

#[derive(Default)]
struct BusInner {
    handlers: RwLock<Vec<Handler>>,
}

/// Shared handle to one event bus instance.
///
/// Cloning is cheap and every clone addresses the same subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler that receives every message published afterwards.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&BusMessage) + Send + Sync + 'static,
    {
        let mut handlers = match self.inner.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.push(Arc::new(handler));
        debug!(
            "event=bus_subscribe module=bus status=ok subscribers={}",
            handlers.len()
        );
    }

    /// Delivers `message` to every handler in registration order.
    ///
    /// Handlers subscribed while this call is running only see later messages.
    pub fn publish(&self, message: BusMessage) -> PublishReport {
        let handlers = self.snapshot();
        let mut report = PublishReport::default();

        for (index, handler) in handlers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(&message))) {
                Ok(()) => report.delivered += 1,
                Err(_) => {
                    report.failed += 1;
                    error!(
                        "event=bus_publish module=bus status=handler_panic handler_index={} message={}",
                        index,
                        message.label()
                    );
                }
            }
        }

        debug!(
            "event=bus_publish module=bus status=ok message={} delivered={} failed={}",
            message.label(),
            report.delivered,
            report.failed
        );
        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns a non-owning handle, for subscribers that publish back.
    pub fn downgrade(&self) -> WeakEventBus {
        WeakEventBus {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn snapshot(&self) -> Vec<Handler> {
        match self.inner.handlers.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Non-owning bus handle that does not keep subscribers alive.
#[derive(Clone)]
pub struct WeakEventBus {
    inner: Weak<BusInner>,
}

impl WeakEventBus {
    /// Returns the bus if any strong handle is still alive.
    pub fn upgrade(&self) -> Option<EventBus> {
        self.inner.upgrade().map(|inner| EventBus { inner })
    }
}
