//! Engine handle and builder
//!
//! The engine owns everything triggers share: the language, the extension
//! maps, process-wide shared variables and the scheduler. Triggers only hold a
//! weak reference back to it, so dropping the last [`Engine`] handle turns
//! further activations into bind failures.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{BuildError, TriggerInitError};
use crate::extensions::Extensions;
use crate::host::{DefaultHost, ExceptionSink, Host, ItemLayout, LogSink};
use crate::language::Language;
use crate::main_thread::{MainExecutor, MainThread};
use crate::scheduler::Scheduler;
use crate::trigger::{Trigger, TriggerKind};
use crate::value::{Value, Vars};

pub(crate) struct Core<L: Language> {
    language: Arc<L>,
    extensions: Arc<Extensions>,
    shared: RwLock<Vars>,
    host: Arc<dyn Host>,
    scheduler: Scheduler,
    config: EngineConfig,
}

impl<L: Language> Core<L> {
    pub(crate) fn language(&self) -> &L {
        &self.language
    }

    pub(crate) fn language_handle(&self) -> Arc<L> {
        self.language.clone()
    }

    pub(crate) fn extensions(&self) -> &Arc<Extensions> {
        &self.extensions
    }

    /// Snapshot of the process-wide shared variables
    pub(crate) fn shared_vars(&self) -> Vars {
        self.shared.read().clone()
    }

    pub(crate) fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub(crate) fn sink(&self) -> &Arc<dyn ExceptionSink> {
        self.scheduler.sink()
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

/// Cheap, clonable handle onto a running engine
pub struct Engine<L: Language> {
    core: Arc<Core<L>>,
}

impl<L: Language> Clone for Engine<L> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<L: Language> Engine<L> {
    pub fn builder(language: L) -> EngineBuilder<L> {
        EngineBuilder::new(language)
    }

    pub fn language(&self) -> &L {
        &self.core.language
    }

    pub fn extensions(&self) -> &Arc<Extensions> {
        &self.core.extensions
    }

    pub fn config(&self) -> &EngineConfig {
        &self.core.config
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.core.host
    }

    pub fn sink(&self) -> &Arc<dyn ExceptionSink> {
        self.core.sink()
    }

    pub fn main_executor(&self) -> &Arc<dyn MainExecutor> {
        self.core.scheduler.main_executor()
    }

    pub fn shared_var(&self, key: &str) -> Option<Value> {
        self.core.shared.read().get(key).cloned()
    }

    /// Set a variable visible to every activation of every trigger
    pub fn set_shared_var(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.core.shared.write().insert(key.into(), value)
    }

    pub fn remove_shared_var(&self, key: &str) -> Option<Value> {
        self.core.shared.write().remove(key)
    }

    pub fn shared_vars(&self) -> Vars {
        self.core.shared_vars()
    }

    /// Compile a trigger of any kind
    pub fn build_trigger(
        &self,
        name: impl Into<String>,
        source: impl Into<String>,
        kind: TriggerKind,
        location: Option<PathBuf>,
    ) -> Result<Arc<Trigger<L>>, TriggerInitError> {
        Trigger::new(&self.core, name, source, kind, location).map(Arc::new)
    }

    pub fn trigger(
        &self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Arc<Trigger<L>>, TriggerInitError> {
        self.build_trigger(name, source, TriggerKind::Plain, None)
    }

    pub fn command_trigger<P, A>(
        &self,
        name: impl Into<String>,
        source: impl Into<String>,
        permissions: P,
        aliases: A,
    ) -> Result<Arc<Trigger<L>>, TriggerInitError>
    where
        P: IntoIterator,
        P::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        let kind = TriggerKind::Command {
            permissions: permissions.into_iter().map(Into::into).collect(),
            aliases: aliases.into_iter().map(Into::into).collect(),
        };
        self.build_trigger(name, source, kind, None)
    }

    /// Fails with [`TriggerInitError::InvalidSlots`] for sizes that are not a
    /// whole number of rows
    pub fn container_trigger(
        &self,
        name: impl Into<String>,
        source: impl Into<String>,
        slots: usize,
        items: ItemLayout,
    ) -> Result<Arc<Trigger<L>>, TriggerInitError> {
        self.build_trigger(name, source, TriggerKind::Container { slots, items }, None)
    }
}

/// Builder for [`Engine`]
pub struct EngineBuilder<L: Language> {
    language: L,
    host: Option<Arc<dyn Host>>,
    sink: Option<Arc<dyn ExceptionSink>>,
    main: Option<Arc<dyn MainExecutor>>,
    runtime: Option<Handle>,
    config: EngineConfig,
}

impl<L: Language> EngineBuilder<L> {
    pub fn new(language: L) -> Self {
        Self {
            language,
            host: None,
            sink: None,
            main: None,
            runtime: None,
            config: EngineConfig::default(),
        }
    }

    /// Defaults to [`DefaultHost`]
    pub fn with_host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    /// Defaults to [`LogSink`]
    pub fn with_sink(mut self, sink: Arc<dyn ExceptionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Use the host's main thread instead of spawning a dedicated one
    pub fn with_main_executor(mut self, main: Arc<dyn MainExecutor>) -> Self {
        self.main = Some(main);
        self
    }

    /// Run async activations on an existing runtime instead of an owned one
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Engine<L>, BuildError> {
        let EngineBuilder {
            language,
            host,
            sink,
            main,
            runtime,
            config,
        } = self;

        let host = host.unwrap_or_else(|| Arc::new(DefaultHost));
        let sink = sink.unwrap_or_else(|| Arc::new(LogSink));
        let main: Arc<dyn MainExecutor> = match main {
            Some(main) => main,
            None => Arc::new(
                MainThread::spawn(&config.main_thread_name).map_err(BuildError::MainThread)?,
            ),
        };

        let scheduler = match runtime {
            Some(handle) => Scheduler::with_handle(handle, &config, main, sink),
            None => Scheduler::new(&config, main, sink)?,
        };

        debug!(
            target: "trigger",
            "Engine ready (sync budget {:?})",
            scheduler.sync_timeout()
        );

        Ok(Engine {
            core: Arc::new(Core {
                language: Arc::new(language),
                extensions: Arc::new(Extensions::new()),
                shared: RwLock::new(Vars::new()),
                host,
                scheduler,
                config,
            }),
        })
    }
}
