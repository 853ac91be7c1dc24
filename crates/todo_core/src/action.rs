//! Action vocabulary, change notifications and command input.
//!
//! # Responsibility
//! - Define the closed set of user intents and the change notifications
//!   that flow back to views.
//! - Decode untyped payloads (FFI/JSON boundaries) into typed actions.
//! - Offer the command-input entry points views call.
//!
//! # Invariants
//! - Unknown or malformed payloads never reach the bus.
//! - Change notifications carry no payload; receivers re-read the list.

use crate::bus::EventBus;
use crate::model::todo::TodoId;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Discriminator key in untyped action payloads.
pub const ACTION_KEY: &str = "action";
pub const ACTION_CREATE: &str = "action_create";
pub const ACTION_DELETE: &str = "action_delete";
pub const ACTION_TOGGLE_COMPLETED: &str = "action_toggle_completed";

/// A user intent against the to-do list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum TodoAction {
    #[serde(rename = "action_create")]
    Create { title: String },
    #[serde(rename = "action_delete")]
    Delete { item_id: TodoId },
    #[serde(rename = "action_toggle_completed")]
    ToggleCompleted { item_id: TodoId },
}

impl TodoAction {
    /// Decodes an untyped payload such as `{"action": "action_delete", "item_id": "..."}`.
    ///
    /// Unknown extra fields are ignored.
    pub fn from_payload(payload: &Value) -> Result<Self, ActionDecodeError> {
        let name = payload
            .get(ACTION_KEY)
            .and_then(Value::as_str)
            .ok_or(ActionDecodeError::MissingDiscriminator)?;

        if !matches!(name, ACTION_CREATE | ACTION_DELETE | ACTION_TOGGLE_COMPLETED) {
            return Err(ActionDecodeError::UnknownAction(name.to_string()));
        }

        serde_json::from_value(payload.clone())
            .map_err(|err| ActionDecodeError::Malformed(err.to_string()))
    }

    pub fn to_payload(&self) -> Value {
        // Serializing a plain enum of strings and UUIDs cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Wire name of this action's discriminator.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => ACTION_CREATE,
            Self::Delete { .. } => ACTION_DELETE,
            Self::ToggleCompleted { .. } => ACTION_TOGGLE_COMPLETED,
        }
    }
}

/// Why an untyped payload was dropped instead of dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionDecodeError {
    MissingDiscriminator,
    UnknownAction(String),
    Malformed(String),
}

impl Display for ActionDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDiscriminator => write!(f, "payload has no `{ACTION_KEY}` string"),
            Self::UnknownAction(name) => write!(f, "unknown action `{name}`"),
            Self::Malformed(reason) => write!(f, "malformed action payload: {reason}"),
        }
    }
}

impl Error for ActionDecodeError {}

/// Zero-payload notification meaning "re-fetch the full list now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoChange {
    Created,
    Deleted,
    Toggled,
}

/// Everything that travels over the event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    Action(TodoAction),
    Change(TodoChange),
}

impl BusMessage {
    /// Short label for log lines; never includes user text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Action(action) => action.name(),
            Self::Change(TodoChange::Created) => "todo_item_created",
            Self::Change(TodoChange::Deleted) => "todo_item_deleted",
            Self::Change(TodoChange::Toggled) => "todo_item_toggle_completed",
        }
    }
}

/// Command input used by views: each call publishes one action.
#[derive(Clone)]
pub struct TodoActions {
    bus: EventBus,
}

impl TodoActions {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn create(&self, title: impl Into<String>) {
        self.dispatch(TodoAction::Create {
            title: title.into(),
        });
    }

    pub fn delete(&self, item_id: TodoId) {
        self.dispatch(TodoAction::Delete { item_id });
    }

    pub fn toggle_completed(&self, item_id: TodoId) {
        self.dispatch(TodoAction::ToggleCompleted { item_id });
    }

    pub fn dispatch(&self, action: TodoAction) {
        self.bus.publish(BusMessage::Action(action));
    }

    /// Decodes and publishes an untyped payload.
    ///
    /// Undecodable payloads are logged and dropped; nothing is published.
    pub fn dispatch_payload(&self, payload: &Value) -> Result<(), ActionDecodeError> {
        match TodoAction::from_payload(payload) {
            Ok(action) => {
                self.dispatch(action);
                Ok(())
            }
            Err(err) => {
                debug!(
                    "event=action_dispatch module=action status=dropped reason={}",
                    err
                );
                Err(err)
            }
        }
    }
}
