//! Custom verbs, value providers and global variables shared by every trigger
//!
//! All three tables are live: registering or removing an entry is visible to
//! triggers that were compiled earlier and to runs already in flight.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::language::{Flow, Interpreter};
use crate::value::Value;

/// A custom verb callable from scripts
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, interp: &mut Interpreter, args: &[Value]) -> anyhow::Result<Flow>;
}

impl<F> Executor for F
where
    F: Fn(&mut Interpreter, &[Value]) -> anyhow::Result<Flow> + Send + Sync + 'static,
{
    fn execute(&self, interp: &mut Interpreter, args: &[Value]) -> anyhow::Result<Flow> {
        self(interp, args)
    }
}

/// A named value provider callable from scripts
pub trait Placeholder: Send + Sync + 'static {
    fn resolve(&self, interp: &mut Interpreter, args: &[Value]) -> anyhow::Result<Value>;
}

impl<F> Placeholder for F
where
    F: Fn(&mut Interpreter, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    fn resolve(&self, interp: &mut Interpreter, args: &[Value]) -> anyhow::Result<Value> {
        self(interp, args)
    }
}

/// Process-wide variables that outlive any single activation
#[derive(Default)]
pub struct GlobalVars {
    vars: RwLock<HashMap<String, Value>>,
}

impl GlobalVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.vars.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.write().insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.vars.write().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.vars.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.read().is_empty()
    }

    /// Copy of all entries, sorted by key
    pub fn snapshot(&self) -> Vec<(String, Value)> {
        let mut entries: Vec<_> = self
            .vars
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

/// The verb table, the value-provider table and the global-variable adapter
#[derive(Default)]
pub struct Extensions {
    verbs: RwLock<HashMap<String, Arc<dyn Executor>>>,
    placeholders: RwLock<HashMap<String, Arc<dyn Placeholder>>>,
    globals: GlobalVars,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a verb, replacing any existing one with the same name
    pub fn register_verb<F>(&self, name: impl Into<String>, verb: F)
    where
        F: Fn(&mut Interpreter, &[Value]) -> anyhow::Result<Flow> + Send + Sync + 'static,
    {
        self.register_executor(name, Arc::new(verb));
    }

    pub fn register_executor(&self, name: impl Into<String>, verb: Arc<dyn Executor>) {
        let name = name.into();
        tracing::debug!(target: "trigger", "Registering verb: {}", name);
        self.verbs.write().insert(name, verb);
    }

    pub fn remove_verb(&self, name: &str) -> bool {
        self.verbs.write().remove(name).is_some()
    }

    pub fn verb(&self, name: &str) -> Option<Arc<dyn Executor>> {
        self.verbs.read().get(name).cloned()
    }

    pub fn has_verb(&self, name: &str) -> bool {
        self.verbs.read().contains_key(name)
    }

    /// Register a value provider, replacing any existing one with the same name
    pub fn register_placeholder<F>(&self, name: impl Into<String>, placeholder: F)
    where
        F: Fn(&mut Interpreter, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register_provider(name, Arc::new(placeholder));
    }

    pub fn register_provider(&self, name: impl Into<String>, placeholder: Arc<dyn Placeholder>) {
        let name = name.into();
        tracing::debug!(target: "trigger", "Registering placeholder: {}", name);
        self.placeholders.write().insert(name, placeholder);
    }

    pub fn remove_placeholder(&self, name: &str) -> bool {
        self.placeholders.write().remove(name).is_some()
    }

    pub fn placeholder(&self, name: &str) -> Option<Arc<dyn Placeholder>> {
        self.placeholders.read().get(name).cloned()
    }

    pub fn globals(&self) -> &GlobalVars {
        &self.globals
    }

    /// Names of all registered verbs, sorted
    pub fn verb_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.verbs.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of all registered value providers, sorted
    pub fn placeholder_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.placeholders.read().keys().cloned().collect();
        names.sort();
        names
    }
}
