//! Live container handles and the triggers that opened them
//!
//! Each open container gets its own entry and its own shared variable scope,
//! so one container trigger can back any number of simultaneously open
//! instances. Close marks the entry as closing, runs the close activation and
//! only then drops the entry, so a duplicate close notification is a no-op
//! while the close script still sees the instance as open.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::host::ContainerHost;
use crate::language::Language;
use crate::trigger::{Trigger, TriggerKind};
use crate::value::{ActorId, EventRef, Value, Vars};

/// Shared-scope binding for the container itself
pub const INVENTORY_VAR: &str = "inventory";

/// Binding for the acting viewer
pub const PLAYER_VAR: &str = "player";

/// Binding for the action label
pub const ACTION_VAR: &str = "trigger";

/// Action label used for the close activation
pub const CLOSE_ACTION: &str = "close";

/// Host-assigned identity of one open container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerHandle(u64);

impl ContainerHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "container#{}", self.0)
    }
}

struct Entry<L: Language> {
    trigger: Arc<Trigger<L>>,
    vars: Vars,
    closing: bool,
}

pub struct CorrelationRegistry<L: Language> {
    containers: Arc<dyn ContainerHost>,
    entries: Mutex<HashMap<ContainerHandle, Entry<L>>>,
}

impl<L: Language> CorrelationRegistry<L> {
    pub fn new(containers: Arc<dyn ContainerHost>) -> Self {
        Self {
            containers,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn containers(&self) -> &Arc<dyn ContainerHost> {
        &self.containers
    }

    /// Create, register, fill and show a fresh container for `viewer`
    ///
    /// Returns `None` if `trigger` is not a container trigger.
    pub fn open(&self, trigger: &Arc<Trigger<L>>, viewer: ActorId) -> Option<ContainerHandle> {
        let TriggerKind::Container { slots, items } = trigger.kind() else {
            return None;
        };
        let name = trigger.name();

        let handle = self.containers.create_container(slots, &name);

        let mut vars = Vars::new();
        vars.insert(INVENTORY_VAR.to_string(), Value::Container(handle));
        self.entries.lock().insert(
            handle,
            Entry {
                trigger: trigger.clone(),
                vars,
                closing: false,
            },
        );

        self.containers.populate(handle, &items);
        self.containers.present(handle, viewer);

        debug!(target: "registry", "Opened {} for {} from Trigger [{}]", handle, viewer, name);
        Some(handle)
    }

    /// Record the interaction in the instance's shared scope and activate its
    /// trigger with a copy of that scope
    ///
    /// Unknown and closing handles are ignored. Returns what
    /// [`Trigger::activate`] returned, or false when nothing was tracked.
    pub fn on_interact(
        &self,
        event: EventRef,
        handle: ContainerHandle,
        viewer: ActorId,
        action: &str,
        extra: Vars,
    ) -> bool {
        let (trigger, vars) = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(&handle).filter(|entry| !entry.closing) else {
                trace!(target: "registry", "Ignoring interaction with untracked {}", handle);
                return false;
            };
            entry.vars.insert(PLAYER_VAR.to_string(), Value::Actor(viewer));
            entry.vars.insert(ACTION_VAR.to_string(), Value::from(action));
            entry.vars.extend(extra);
            (entry.trigger.clone(), entry.vars.clone())
        };

        trigger.activate(event, vars)
    }

    /// Run the close activation for `handle` with the sync flag forced on,
    /// then stop tracking it
    ///
    /// The entry stays visible while the close activation runs. A second close
    /// for the same handle, before or after the first finishes, returns false
    /// without activating.
    pub fn on_close(&self, event: EventRef, handle: ContainerHandle, viewer: ActorId) -> bool {
        let (trigger, vars) = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(&handle).filter(|entry| !entry.closing) else {
                trace!(target: "registry", "{} already closed", handle);
                return false;
            };
            entry.closing = true;
            entry.vars.insert(PLAYER_VAR.to_string(), Value::Actor(viewer));
            entry.vars.insert(ACTION_VAR.to_string(), Value::from(CLOSE_ACTION));
            (entry.trigger.clone(), entry.vars.clone())
        };

        debug!(target: "registry", "Closing {} for {}", handle, viewer);
        let activated = trigger.with_sync(true, || trigger.activate(event, vars));

        self.entries.lock().remove(&handle);
        activated
    }

    pub fn is_open(&self, handle: ContainerHandle) -> bool {
        self.entries.lock().contains_key(&handle)
    }

    pub fn trigger_for(&self, handle: ContainerHandle) -> Option<Arc<Trigger<L>>> {
        self.entries
            .lock()
            .get(&handle)
            .map(|entry| entry.trigger.clone())
    }

    /// Snapshot of the instance's shared scope
    pub fn shared_vars(&self, handle: ContainerHandle) -> Option<Vars> {
        self.entries
            .lock()
            .get(&handle)
            .map(|entry| entry.vars.clone())
    }

    pub fn open_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Handles currently backed by `trigger`
    pub fn handles_for(&self, trigger: &Arc<Trigger<L>>) -> Vec<ContainerHandle> {
        let mut handles: Vec<_> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| Arc::ptr_eq(&entry.trigger, trigger))
            .map(|(handle, _)| *handle)
            .collect();
        handles.sort();
        handles
    }
}
