//! Composition root wiring bus, store, adapter and command input.
//!
//! Owns exactly one instance of each collaborator and hands out handles;
//! nothing in core is reachable through process-global state.

use crate::action::{BusMessage, TodoActions, TodoChange};
use crate::adapter::{ensure_view_runtime, AdapterError, StoreBusAdapter};
use crate::bus::EventBus;
use crate::config::StoreConfig;
use crate::store::TodoStore;
use log::info;
use tokio::runtime::Handle;

pub struct TodoApp {
    bus: EventBus,
    store: TodoStore,
    adapter: StoreBusAdapter,
    actions: TodoActions,
}

impl TodoApp {
    /// Opens the store and registers the adapter on a fresh bus.
    ///
    /// Completions are driven by `runtime`; pass the handle of the
    /// current-thread runtime that owns the view thread. Apps running a
    /// multi-thread runtime keep a dedicated current-thread runtime for the
    /// view.
    ///
    /// # Errors
    /// - `runtime` is not a current-thread runtime. Checked before the store
    ///   is opened.
    pub fn start(config: &StoreConfig, runtime: Handle) -> Result<Self, AdapterError> {
        ensure_view_runtime(&runtime)?;
        let bus = EventBus::new();
        let store = TodoStore::open(config);
        let adapter = StoreBusAdapter::new(store.clone(), bus.clone(), runtime)?;
        adapter.register();
        let actions = TodoActions::new(bus.clone());

        info!(
            "event=app_start module=app status={} subscribers={}",
            if store.init_error().is_some() {
                "degraded"
            } else {
                "ok"
            },
            bus.subscriber_count()
        );

        Ok(Self {
            bus,
            store,
            adapter,
            actions,
        })
    }

    /// Same as [`TodoApp::start`] using the ambient runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn start_current(config: &StoreConfig) -> Result<Self, AdapterError> {
        Self::start(config, Handle::current())
    }

    pub fn actions(&self) -> &TodoActions {
        &self.actions
    }

    pub fn store(&self) -> &TodoStore {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn adapter(&self) -> &StoreBusAdapter {
        &self.adapter
    }

    /// Registers a view callback fired for every change notification.
    pub fn on_change<F>(&self, handler: F)
    where
        F: Fn(TodoChange) + Send + Sync + 'static,
    {
        self.bus.subscribe(move |message| {
            if let BusMessage::Change(change) = message {
                handler(*change);
            }
        });
    }
}
