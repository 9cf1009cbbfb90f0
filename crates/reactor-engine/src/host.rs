//! Seams to the embedding application
//!
//! The engine calls out through these traits for everything it does not own:
//! who an event is about, extra per-event variables, the cancellation hook,
//! where failures go, and how containers are created and shown.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::cooldown::CooldownTable;
use crate::error::{TriggerError, error_chain};
use crate::language::{CooldownInterrupter, Interpreter, Interrupter};
use crate::registry::ContainerHandle;
use crate::value::{ActorId, Event, EventRef, Value, Vars};

pub trait Host: Send + Sync + 'static {
    /// The actor an event is about; events without one skip the cooldown gate
    fn extract_actor(&self, _event: &dyn Event) -> Option<ActorId> {
        None
    }

    /// Extra variables for this event, layered above the shared variables
    fn custom_vars(&self, _event: &dyn Event) -> Option<Vars> {
        None
    }

    /// Bound as the interpreter's self reference
    fn self_reference(&self) -> Value {
        Value::Null
    }

    /// Build the cancellation hook for one run
    ///
    /// The default handles `cooldown` against `cooldowns` for the event's
    /// actor. Hosts that add their own interception should delegate to
    /// [`CooldownInterrupter`] for anything they do not claim.
    fn make_interrupter(
        &self,
        event: &EventRef,
        _interp: &Interpreter,
        cooldowns: &CooldownTable,
    ) -> Box<dyn Interrupter> {
        Box::new(CooldownInterrupter::new(
            self.extract_actor(&**event),
            cooldowns.clone(),
        ))
    }
}

/// Host with no actors and no custom variables
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHost;

impl Host for DefaultHost {}

/// Single destination for activation-time failures
///
/// Called from worker threads and the main thread alike; must not block.
pub trait ExceptionSink: Send + Sync + 'static {
    fn handle(&self, event: &EventRef, error: TriggerError);
}

/// Reports failures through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ExceptionSink for LogSink {
    fn handle(&self, event: &EventRef, error: TriggerError) {
        if error.is_timeout() {
            tracing::warn!(target: "trigger", event = ?event, "{}", error);
        } else {
            error!(target: "trigger", event = ?event, "{}", error_chain(&error));
        }
    }
}

/// An item placed in a container slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub kind: String,
    #[serde(default = "default_amount")]
    pub amount: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn default_amount() -> u32 {
    1
}

impl ItemRef {
    pub fn new(kind: impl Into<String>, amount: u32) -> Self {
        Self {
            kind: kind.into(),
            amount,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Slot index to item
pub type ItemLayout = BTreeMap<usize, ItemRef>;

/// Host operations for UI-like containers
pub trait ContainerHost: Send + Sync + 'static {
    /// Create a container with `size` slots; every call returns a new handle
    fn create_container(&self, size: usize, title: &str) -> ContainerHandle;

    /// Fill the container from a stored layout
    fn populate(&self, handle: ContainerHandle, items: &ItemLayout);

    /// Show the container to a viewer
    fn present(&self, handle: ContainerHandle, viewer: ActorId);
}
