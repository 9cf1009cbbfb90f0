//! Trigger execution engine
//!
//! Scripts are compiled once per edit and run once per event. Each run gets a
//! freshly merged variable scope, passes a per-actor cooldown gate, and is
//! dispatched either to a worker pool or to the host's main thread.

pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod extensions;
pub mod host;
pub mod language;
pub mod main_thread;
pub mod manager;
pub mod registry;
pub mod scheduler;
pub mod script;
pub mod trigger;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::EngineConfig;
pub use cooldown::CooldownTable;
pub use engine::{Engine, EngineBuilder};
pub use error::{
    BindError, BuildError, CompileError, ConfigLoadError, LexError, ParseError, ScriptError,
    TriggerError, TriggerInitError, error_chain,
};
pub use extensions::{Executor, Extensions, GlobalVars, Placeholder};
pub use host::{ContainerHost, DefaultHost, ExceptionSink, Host, ItemLayout, ItemRef, LogSink};
pub use language::{
    CooldownInterrupter, Flow, Interception, Interpreter, Interrupter, Language, Parsed, Warning,
};
pub use main_thread::{MainExecutor, MainTask, MainThread, MainThreadGone};
pub use manager::{DefinitionKind, SlotItem, TriggerDefinition, TriggerManager};
pub use registry::{ContainerHandle, CorrelationRegistry};
pub use scheduler::{Dispatch, Outcome};
pub use script::ScriptUnit;
pub use trigger::{Activation, MAX_SLOTS, Trigger, TriggerKind};
pub use value::{ActorId, EVENT_VAR, Event, EventRef, Value, Vars};
