//! Terminal stand-ins for the host platform
//!
//! Containers are printed instead of shown, and `say` writes to stdout. Every
//! line is also kept so callers can inspect what a run produced.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use reactor_engine::{
    ActorId, ContainerHandle, ContainerHost, Event, EventRef, ExceptionSink, Extensions, Flow,
    Host, ItemLayout, LogSink, TriggerError, Value, Vars, error_chain,
};
use tracing::info;

/// What the CLI fires triggers with
#[derive(Debug, Clone)]
pub struct CliEvent {
    pub source: &'static str,
    pub player: Option<ActorId>,
}

impl CliEvent {
    pub fn new(source: &'static str, player: Option<ActorId>) -> Self {
        Self { source, player }
    }
}

#[derive(Debug, Default)]
pub struct ConsoleHost;

impl Host for ConsoleHost {
    fn extract_actor(&self, event: &dyn Event) -> Option<ActorId> {
        event.downcast_ref::<CliEvent>().and_then(|e| e.player)
    }

    fn custom_vars(&self, event: &dyn Event) -> Option<Vars> {
        let event = event.downcast_ref::<CliEvent>()?;
        let mut vars = Vars::new();
        vars.insert("source".to_string(), Value::from(event.source));
        if let Some(player) = event.player {
            vars.insert("player".to_string(), Value::Actor(player));
        }
        Some(vars)
    }

    fn self_reference(&self) -> Value {
        Value::from("console")
    }
}

pub struct Console {
    echo: bool,
    next_handle: AtomicU64,
    lines: Mutex<Vec<String>>,
}

impl Console {
    pub fn new(echo: bool) -> Self {
        Self {
            echo,
            next_handle: AtomicU64::new(0),
            lines: Mutex::new(Vec::new()),
        }
    }

    fn emit(&self, line: String) {
        if self.echo {
            println!("{}", line);
        }
        self.lines.lock().push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Register `say`, which prints its arguments joined by spaces
    pub fn install(self: &std::sync::Arc<Self>, extensions: &Extensions) {
        let console = self.clone();
        extensions.register_verb("say", move |_, args| {
            let line = args
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            console.emit(line);
            Ok(Flow::Continue)
        });
    }
}

impl ContainerHost for Console {
    fn create_container(&self, size: usize, title: &str) -> ContainerHandle {
        let handle = ContainerHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        info!("Created {} '{}' with {} slots", handle, title, size);
        handle
    }

    fn populate(&self, handle: ContainerHandle, items: &ItemLayout) {
        for (slot, item) in items {
            let label = item.label.as_deref().unwrap_or(&item.kind);
            self.emit(format!("{} [{}] {} x{}", handle, slot, label, item.amount));
        }
    }

    fn present(&self, handle: ContainerHandle, viewer: ActorId) {
        self.emit(format!("{} shown to {}", handle, viewer));
    }
}

impl ExceptionSink for Console {
    fn handle(&self, event: &EventRef, error: TriggerError) {
        self.emit(format!("error: {}", error_chain(&error)));
        LogSink.handle(event, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reactor_engine::ItemRef;
    use std::sync::Arc;

    #[test]
    fn test_host_reads_cli_events() {
        let player = ActorId::random();
        let event: EventRef = Arc::new(CliEvent::new("fire", Some(player)));

        assert_eq!(ConsoleHost.extract_actor(&*event), Some(player));
        let vars = ConsoleHost.custom_vars(&*event).unwrap();
        assert_eq!(vars["source"], Value::from("fire"));
        assert_eq!(vars["player"], Value::Actor(player));

        let other: EventRef = Arc::new(42u32);
        assert!(ConsoleHost.extract_actor(&*other).is_none());
        assert!(ConsoleHost.custom_vars(&*other).is_none());
    }

    #[test]
    fn test_containers_are_printed() {
        let console = Console::new(false);
        let viewer = ActorId::random();
        let first = console.create_container(9, "shop");
        let second = console.create_container(9, "shop");
        assert_ne!(first, second);

        let mut items = ItemLayout::new();
        items.insert(2, ItemRef::new("bread", 3));
        items.insert(8, ItemRef::new("barrier", 1).with_label("Close"));
        console.populate(first, &items);
        console.present(first, viewer);

        assert_eq!(
            console.lines(),
            vec![
                "container#0 [2] bread x3".to_string(),
                "container#0 [8] Close x1".to_string(),
                format!("container#0 shown to {}", viewer),
            ]
        );
    }
}
