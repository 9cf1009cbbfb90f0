use std::sync::Arc;

use anyhow::Context;
use reactor_engine::{Activation, ActorId, ContainerHandle, EventRef, TriggerManager, Value, Vars};
use reactor_script::{ReactorScript, build_engine, engine_builder};
use tracing::debug;

use crate::config::ReactorConfig;
use crate::console::{CliEvent, Console, ConsoleHost};

/// Local bound to the text after a command label
pub const ARGS_VAR: &str = "args";

/// Local bound to the label a command was invoked by
pub const LABEL_VAR: &str = "label";

/// An engine wired to the console, with the configured triggers loaded
pub struct Session {
    manager: TriggerManager<ReactorScript>,
    console: Arc<Console>,
}

impl Session {
    pub fn new(config: &ReactorConfig, echo: bool) -> anyhow::Result<Self> {
        let console = Arc::new(Console::new(echo));
        let engine = build_engine(
            engine_builder()
                .with_host(Arc::new(ConsoleHost))
                .with_sink(console.clone())
                .with_config(config.engine.clone()),
        )
        .context("Failed to start the engine")?;
        console.install(engine.extensions());

        for (key, value) in config.shared_vars() {
            engine.set_shared_var(key, value);
        }

        let manager = TriggerManager::new(engine, console.clone());
        manager
            .load_definitions(config.triggers.iter().cloned())
            .context("Failed to load triggers")?;

        Ok(Self { manager, console })
    }

    pub fn manager(&self) -> &TriggerManager<ReactorScript> {
        &self.manager
    }

    pub fn console(&self) -> &Arc<Console> {
        &self.console
    }

    /// One line per trigger, with its parse warnings indented below it
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for name in self.manager.names() {
            let Some(trigger) = self.manager.get(&name) else {
                continue;
            };
            lines.push(trigger.to_string());
            for warning in trigger.unit().warnings() {
                lines.push(format!("  line {}: {}", warning.line, warning.message));
            }
        }
        lines
    }

    /// Activate the trigger called `name`
    pub fn fire(
        &self,
        name: &str,
        player: Option<ActorId>,
        locals: Vars,
    ) -> anyhow::Result<Activation> {
        let trigger = self
            .manager
            .get(name)
            .with_context(|| format!("No trigger named `{}`", name))?;

        Ok(trigger.try_activate(event("fire", player), locals))
    }

    /// Run the command trigger answering to `label` with `args` bound as text
    pub fn command(
        &self,
        label: &str,
        player: Option<ActorId>,
        args: &[String],
    ) -> anyhow::Result<Activation> {
        let trigger = self
            .manager
            .find_command(label)
            .with_context(|| format!("No command answers to `{}`", label))?;

        let mut locals = Vars::new();
        locals.insert(ARGS_VAR.to_string(), Value::from(args.join(" ")));
        locals.insert(LABEL_VAR.to_string(), Value::from(label));

        debug!("Running {} as `{}`", trigger, label);
        Ok(trigger.try_activate(event("command", player), locals))
    }

    /// Open the container trigger `name`, click each action in order, then close
    pub fn open(
        &self,
        name: &str,
        player: ActorId,
        clicks: &[String],
    ) -> anyhow::Result<ContainerHandle> {
        let handle = self
            .manager
            .open_container(name, player)
            .with_context(|| format!("No container trigger named `{}`", name))?;

        let registry = self.manager.registry();
        for action in clicks {
            registry.on_interact(
                event("container", Some(player)),
                handle,
                player,
                action,
                Vars::new(),
            );
        }
        registry.on_close(event("container", Some(player)), handle, player);

        Ok(handle)
    }
}

fn event(source: &'static str, player: Option<ActorId>) -> EventRef {
    Arc::new(CliEvent::new(source, player))
}
