//! The contract a scripting language must satisfy to be driven by the engine
//!
//! The engine never looks inside tokens or ASTs. It lexes and parses once per
//! script edit, then hands the compiled AST together with a freshly bound
//! [`Interpreter`] to [`Language::run`] for every activation.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cooldown::CooldownTable;
use crate::error::{LexError, ParseError, ScriptError};
use crate::extensions::Extensions;
use crate::value::{ActorId, EventRef, Value, Vars};

/// Verb name the default interrupter claims for setting cooldowns
pub const COOLDOWN_VERB: &str = "cooldown";

/// A non-fatal diagnostic produced while parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub line: usize,
    pub message: String,
}

/// Parser output: the AST plus any warnings
#[derive(Debug)]
pub struct Parsed<A> {
    pub ast: A,
    pub warnings: Vec<Warning>,
}

impl<A> Parsed<A> {
    pub fn new(ast: A) -> Self {
        Self {
            ast,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, line: usize, message: impl Into<String>) -> Self {
        self.warnings.push(Warning {
            line,
            message: message.into(),
        });
        self
    }
}

pub trait Language: Send + Sync + 'static {
    type Token: Send;
    type Ast: Send + Sync + 'static;

    fn lex(&self, source: &str) -> Result<Vec<Self::Token>, LexError>;

    fn parse(&self, tokens: Vec<Self::Token>) -> Result<Parsed<Self::Ast>, ParseError>;

    /// Execute a compiled script against one bound interpreter
    ///
    /// Implementations must offer every verb call to `interrupter` before
    /// looking it up in the verb table.
    fn run(
        &self,
        ast: &Self::Ast,
        interp: &mut Interpreter,
        interrupter: &mut dyn Interrupter,
    ) -> Result<(), ScriptError>;
}

/// What a verb asks the interpreter to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// An interrupter's verdict on a verb call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interception {
    /// Not handled here; run the verb normally
    Pass,
    /// Handled by the interrupter; skip the verb table
    Handled,
    /// Cut the run short
    Stop,
}

/// Per-run cancellation and interception hook
pub trait Interrupter: Send {
    fn intercept(
        &mut self,
        interp: &mut Interpreter,
        verb: &str,
        args: &[Value],
    ) -> Result<Interception, ScriptError>;
}

/// Handles `cooldown <seconds>` by writing the acting actor's expiry into the
/// trigger's cooldown table
pub struct CooldownInterrupter {
    actor: Option<ActorId>,
    cooldowns: CooldownTable,
}

impl CooldownInterrupter {
    pub fn new(actor: Option<ActorId>, cooldowns: CooldownTable) -> Self {
        Self { actor, cooldowns }
    }
}

impl Interrupter for CooldownInterrupter {
    fn intercept(
        &mut self,
        interp: &mut Interpreter,
        verb: &str,
        args: &[Value],
    ) -> Result<Interception, ScriptError> {
        if verb != COOLDOWN_VERB {
            return Ok(Interception::Pass);
        }

        let seconds = args.first().and_then(Value::as_f64).ok_or_else(|| {
            ScriptError::Message(format!(
                "`{}` expects a non-negative number of seconds",
                COOLDOWN_VERB
            ))
        })?;
        let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
            ScriptError::Message(format!("`{}` cannot wait {} seconds", COOLDOWN_VERB, seconds))
        })?;

        match self.actor {
            Some(actor) => {
                self.cooldowns.set(actor, duration);
                debug!(
                    target: "trigger",
                    "Trigger [{}] set {}s cooldown for {}",
                    interp.trigger_name(),
                    seconds,
                    actor
                );
            }
            None => {
                debug!(
                    target: "trigger",
                    "Trigger [{}] requested a cooldown but the event has no actor",
                    interp.trigger_name()
                );
            }
        }

        Ok(Interception::Handled)
    }
}

/// One activation's execution-bound state
///
/// Built fresh for every activation from the merged variable scope, the shared
/// extension maps, the sync flag and the host's self reference.
pub struct Interpreter {
    trigger: String,
    event: EventRef,
    vars: Vars,
    extensions: Arc<Extensions>,
    sync: bool,
    self_ref: Value,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("trigger", &self.trigger)
            .field("event", &self.event)
            .field("vars", &self.vars)
            .field("sync", &self.sync)
            .field("self_ref", &self.self_ref)
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    pub fn new(
        trigger: impl Into<String>,
        event: EventRef,
        vars: Vars,
        extensions: Arc<Extensions>,
        sync: bool,
        self_ref: Value,
    ) -> Self {
        Self {
            trigger: trigger.into(),
            event,
            vars,
            extensions,
            sync,
            self_ref,
        }
    }

    pub fn trigger_name(&self) -> &str {
        &self.trigger
    }

    pub fn event(&self) -> &EventRef {
        &self.event
    }

    pub fn is_sync(&self) -> bool {
        self.sync
    }

    pub fn self_reference(&self) -> &Value {
        &self.self_ref
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    pub fn remove_var(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    pub fn into_vars(self) -> Vars {
        self.vars
    }

    pub fn global(&self, key: &str) -> Option<Value> {
        self.extensions.globals().get(key)
    }

    pub fn set_global(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.extensions.globals().set(key, value)
    }

    pub fn extensions(&self) -> &Arc<Extensions> {
        &self.extensions
    }

    /// Look up and run a verb from the shared table
    pub fn call_verb(&mut self, name: &str, args: &[Value]) -> Result<Flow, ScriptError> {
        let verb = self
            .extensions
            .verb(name)
            .ok_or_else(|| ScriptError::UnknownVerb(name.to_string()))?;

        verb.execute(self, args).map_err(|source| ScriptError::Verb {
            name: name.to_string(),
            source,
        })
    }

    /// Look up and evaluate a value provider from the shared table
    pub fn resolve_placeholder(
        &mut self,
        name: &str,
        args: &[Value],
    ) -> Result<Value, ScriptError> {
        let placeholder = self
            .extensions
            .placeholder(name)
            .ok_or_else(|| ScriptError::UnknownPlaceholder(name.to_string()))?;

        placeholder
            .resolve(self, args)
            .map_err(|source| ScriptError::Placeholder {
                name: name.to_string(),
                source,
            })
    }
}
