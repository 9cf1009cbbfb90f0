//! Name-keyed trigger table plus the container registry wiring
//!
//! File IO stays with the caller: definitions go in and come out as serde
//! records so any format can persist them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::error::TriggerInitError;
use crate::host::{ContainerHost, ItemLayout, ItemRef};
use crate::language::Language;
use crate::registry::{ContainerHandle, CorrelationRegistry};
use crate::trigger::{Trigger, TriggerKind};
use crate::value::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    #[default]
    Plain,
    Command,
    Container,
}

/// One item placed in a container definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotItem {
    pub slot: usize,
    #[serde(flatten)]
    pub item: ItemRef,
}

/// Persistable form of a trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDefinition {
    pub name: String,
    pub script: String,
    #[serde(default)]
    pub sync: bool,
    #[serde(default)]
    pub kind: DefinitionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<SlotItem>,
}

impl TriggerDefinition {
    pub fn to_kind(&self) -> Result<TriggerKind, TriggerInitError> {
        Ok(match self.kind {
            DefinitionKind::Plain => TriggerKind::Plain,
            DefinitionKind::Command => TriggerKind::Command {
                permissions: self.permissions.iter().cloned().collect(),
                aliases: self.aliases.iter().cloned().collect(),
            },
            DefinitionKind::Container => {
                let slots = self.slots.ok_or_else(|| TriggerInitError::MissingSlots {
                    trigger: self.name.clone(),
                })?;
                let items = self
                    .items
                    .iter()
                    .map(|entry| (entry.slot, entry.item.clone()))
                    .collect();
                TriggerKind::Container { slots, items }
            }
        })
    }

    fn from_trigger<L: Language>(trigger: &Trigger<L>) -> Self {
        let mut definition = TriggerDefinition {
            name: trigger.name(),
            script: trigger.script(),
            sync: trigger.is_sync(),
            kind: DefinitionKind::Plain,
            permissions: Vec::new(),
            aliases: Vec::new(),
            slots: None,
            items: Vec::new(),
        };

        match trigger.kind() {
            TriggerKind::Plain => {}
            TriggerKind::Command {
                permissions,
                aliases,
            } => {
                definition.kind = DefinitionKind::Command;
                definition.permissions = permissions.into_iter().collect();
                definition.aliases = aliases.into_iter().collect();
            }
            TriggerKind::Container { slots, items } => {
                definition.kind = DefinitionKind::Container;
                definition.slots = Some(slots);
                definition.items = items
                    .into_iter()
                    .map(|(slot, item)| SlotItem { slot, item })
                    .collect();
            }
        }

        definition
    }
}

pub struct TriggerManager<L: Language> {
    engine: Engine<L>,
    triggers: RwLock<BTreeMap<String, Arc<Trigger<L>>>>,
    registry: CorrelationRegistry<L>,
}

impl<L: Language> TriggerManager<L> {
    pub fn new(engine: Engine<L>, containers: Arc<dyn ContainerHost>) -> Self {
        Self {
            engine,
            triggers: RwLock::new(BTreeMap::new()),
            registry: CorrelationRegistry::new(containers),
        }
    }

    pub fn engine(&self) -> &Engine<L> {
        &self.engine
    }

    pub fn registry(&self) -> &CorrelationRegistry<L> {
        &self.registry
    }

    /// Compile and store a trigger; `Ok(false)` if the name is taken
    pub fn create(
        &self,
        name: &str,
        source: &str,
        kind: TriggerKind,
    ) -> Result<bool, TriggerInitError> {
        if self.triggers.read().contains_key(name) {
            return Ok(false);
        }

        let trigger = self.engine.build_trigger(name, source, kind, None)?;
        Ok(self.insert(trigger))
    }

    pub fn create_trigger(&self, name: &str, source: &str) -> Result<bool, TriggerInitError> {
        self.create(name, source, TriggerKind::Plain)
    }

    pub fn create_command_trigger(
        &self,
        name: &str,
        source: &str,
        permissions: BTreeSet<String>,
        aliases: BTreeSet<String>,
    ) -> Result<bool, TriggerInitError> {
        self.create(
            name,
            source,
            TriggerKind::Command {
                permissions,
                aliases,
            },
        )
    }

    pub fn create_container_trigger(
        &self,
        name: &str,
        source: &str,
        slots: usize,
        items: ItemLayout,
    ) -> Result<bool, TriggerInitError> {
        self.create(name, source, TriggerKind::Container { slots, items })
    }

    /// Store an already built trigger under its own name; false if taken
    pub fn insert(&self, trigger: Arc<Trigger<L>>) -> bool {
        let name = trigger.name();
        let mut triggers = self.triggers.write();
        if triggers.contains_key(&name) {
            return false;
        }
        debug!(target: "trigger", "Registered {}", trigger);
        triggers.insert(name, trigger);
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<Trigger<L>>> {
        self.triggers.read().get(name).cloned()
    }

    /// Drop the trigger stored under `name`; false if there was none
    pub fn remove(&self, name: &str) -> bool {
        self.triggers.write().remove(name).is_some()
    }

    /// Move a trigger to a new key, renaming it; false if `from` is missing or
    /// `to` is taken
    pub fn rename(&self, from: &str, to: &str) -> bool {
        let mut triggers = self.triggers.write();
        if triggers.contains_key(to) {
            return false;
        }
        let Some(trigger) = triggers.remove(from) else {
            return false;
        };
        trigger.rename(to);
        triggers.insert(to.to_string(), trigger);
        true
    }

    pub fn names(&self) -> Vec<String> {
        self.triggers.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.triggers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.read().is_empty()
    }

    /// Resolve a command label by trigger name first, then by alias
    pub fn find_command(&self, label: &str) -> Option<Arc<Trigger<L>>> {
        let triggers = self.triggers.read();
        let is_command = |t: &Arc<Trigger<L>>| matches!(t.kind(), TriggerKind::Command { .. });

        if let Some(trigger) = triggers.get(label).filter(|t| is_command(t)) {
            return Some(trigger.clone());
        }
        triggers
            .values()
            .find(|t| is_command(t) && t.aliases().contains(label))
            .cloned()
    }

    /// Open the container trigger stored under `name` for `viewer`
    pub fn open_container(&self, name: &str, viewer: ActorId) -> Option<ContainerHandle> {
        let trigger = self.get(name)?;
        self.registry.open(&trigger, viewer)
    }

    pub fn definitions(&self) -> Vec<TriggerDefinition> {
        self.triggers
            .read()
            .values()
            .map(|trigger| TriggerDefinition::from_trigger(trigger.as_ref()))
            .collect()
    }

    /// Build and store every definition, returning how many were added
    ///
    /// Names already present are skipped with a warning. The first definition
    /// that fails to build stops the load; triggers added before it stay.
    pub fn load_definitions(
        &self,
        definitions: impl IntoIterator<Item = TriggerDefinition>,
    ) -> Result<usize, TriggerInitError> {
        let mut loaded = 0;

        for definition in definitions {
            if self.triggers.read().contains_key(&definition.name) {
                warn!(target: "trigger", "Skipping duplicate Trigger [{}]", definition.name);
                continue;
            }

            let kind = definition.to_kind()?;
            let trigger = self
                .engine
                .build_trigger(&definition.name, &definition.script, kind, None)?;
            trigger.set_sync(definition.sync);

            if self.insert(trigger) {
                loaded += 1;
            }
        }

        info!(target: "trigger", "Loaded {} trigger(s)", loaded);
        Ok(loaded)
    }
}
