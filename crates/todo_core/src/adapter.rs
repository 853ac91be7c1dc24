//! Bridge between bus actions and the record store.
//!
//! # Responsibility
//! - Turn `BusMessage::Action` into record store calls.
//! - Publish a `BusMessage::Change` once a call succeeds.
//!
//! # Invariants
//! - Registration is subscribe-once; repeated `register` calls are no-ops.
//! - Store calls are enqueued inside the bus handler, so store execution
//!   order equals publish order.
//! - Completions run on the runtime captured at construction, which must be
//!   a current-thread runtime: its tasks only run on the thread driving the
//!   bus, so change notifications reach the view on that thread.
//! - A failed store call publishes nothing. The failure is logged.

use crate::action::{BusMessage, TodoAction, TodoChange};
use crate::bus::{EventBus, WeakEventBus};
use crate::store::{PendingOp, TodoStore};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::{Handle, RuntimeFlavor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The runtime would run completions on pool workers, off the view thread.
    UnsupportedRuntime(String),
}

impl Display for AdapterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedRuntime(flavor) => write!(
                f,
                "completions need a current-thread runtime on the view thread, got `{flavor}`"
            ),
        }
    }
}

impl Error for AdapterError {}

/// Accepts only runtimes whose tasks run on the thread driving them.
pub fn ensure_view_runtime(runtime: &Handle) -> Result<(), AdapterError> {
    let flavor = runtime.runtime_flavor();
    if flavor == RuntimeFlavor::CurrentThread {
        return Ok(());
    }
    warn!("event=adapter_runtime module=adapter status=error flavor={flavor:?}");
    Err(AdapterError::UnsupportedRuntime(format!("{flavor:?}")))
}

pub struct StoreBusAdapter {
    store: TodoStore,
    bus: EventBus,
    runtime: Handle,
    registered: AtomicBool,
}

impl StoreBusAdapter {
    /// # Errors
    /// - `runtime` is not a current-thread runtime.
    pub fn new(store: TodoStore, bus: EventBus, runtime: Handle) -> Result<Self, AdapterError> {
        ensure_view_runtime(&runtime)?;
        Ok(Self {
            store,
            bus,
            runtime,
            registered: AtomicBool::new(false),
        })
    }

    /// Subscribes to the bus. Returns `false` if already registered.
    pub fn register(&self) -> bool {
        if self.registered.swap(true, Ordering::SeqCst) {
            debug!("event=adapter_register module=adapter status=skipped reason=already_registered");
            return false;
        }

        let store = self.store.clone();
        let bus = self.bus.downgrade();
        let runtime = self.runtime.clone();
        self.bus
            .subscribe(move |message| handle_message(&store, &bus, &runtime, message));
        debug!("event=adapter_register module=adapter status=ok");
        true
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }
}

fn handle_message(store: &TodoStore, bus: &WeakEventBus, runtime: &Handle, message: &BusMessage) {
    let BusMessage::Action(action) = message else {
        return;
    };

    match action {
        TodoAction::Create { title } => {
            let pending = store.create(title.clone());
            forward(runtime, bus, action.name(), pending, TodoChange::Created);
        }
        TodoAction::Delete { item_id } => {
            let pending = store.delete(*item_id);
            forward(runtime, bus, action.name(), pending, TodoChange::Deleted);
        }
        TodoAction::ToggleCompleted { item_id } => {
            let pending = store.toggle_completed(*item_id);
            forward(runtime, bus, action.name(), pending, TodoChange::Toggled);
        }
    }
}

fn forward<T: Send + 'static>(
    runtime: &Handle,
    bus: &WeakEventBus,
    action_name: &'static str,
    pending: PendingOp<T>,
    change: TodoChange,
) {
    let bus = bus.clone();
    runtime.spawn(async move {
        match pending.await {
            Ok(_) => {
                if let Some(bus) = bus.upgrade() {
                    bus.publish(BusMessage::Change(change));
                }
            }
            Err(err) => warn!(
                "event=adapter_apply module=adapter status=error action={} error={}",
                action_name, err
            ),
        }
    });
}
