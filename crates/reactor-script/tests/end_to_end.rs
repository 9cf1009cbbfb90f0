use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reactor_engine::{
    ActorId, Activation, ContainerHandle, ContainerHost, Dispatch, Engine, EngineConfig, Event,
    EventRef, ExceptionSink, Flow, Host, ItemLayout, ItemRef, TriggerError, TriggerManager, Value,
    Vars, error_chain,
};
use reactor_script::{ReactorScript, build_engine, engine_builder};

#[derive(Debug)]
struct PlayerEvent {
    player: ActorId,
}

fn event(player: ActorId) -> EventRef {
    Arc::new(PlayerEvent { player })
}

struct PlayerHost;

impl Host for PlayerHost {
    fn extract_actor(&self, event: &dyn Event) -> Option<ActorId> {
        event.downcast_ref::<PlayerEvent>().map(|e| e.player)
    }

    fn custom_vars(&self, event: &dyn Event) -> Option<Vars> {
        let event = event.downcast_ref::<PlayerEvent>()?;
        let mut vars = Vars::new();
        vars.insert("player".into(), Value::Actor(event.player));
        Some(vars)
    }
}

#[derive(Default)]
struct Sink {
    reports: Mutex<Vec<(String, bool)>>,
}

impl Sink {
    fn count(&self) -> usize {
        self.reports.lock().len()
    }

    fn timeouts(&self) -> usize {
        self.reports.lock().iter().filter(|(_, t)| *t).count()
    }

    fn messages(&self) -> Vec<String> {
        self.reports.lock().iter().map(|(m, _)| m.clone()).collect()
    }
}

impl ExceptionSink for Sink {
    fn handle(&self, _event: &EventRef, error: TriggerError) {
        let timeout = error.is_timeout();
        self.reports.lock().push((error_chain(&error), timeout));
    }
}

#[derive(Default)]
struct Containers {
    next: AtomicU64,
    shown: Mutex<Vec<(ContainerHandle, ActorId)>>,
}

impl ContainerHost for Containers {
    fn create_container(&self, _size: usize, _title: &str) -> ContainerHandle {
        ContainerHandle::new(self.next.fetch_add(1, Ordering::SeqCst))
    }

    fn populate(&self, _handle: ContainerHandle, _items: &ItemLayout) {}

    fn present(&self, handle: ContainerHandle, viewer: ActorId) {
        self.shown.lock().push((handle, viewer));
    }
}

fn counter(engine: &Engine<ReactorScript>, verb: &str) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let hits = count.clone();
    engine.extensions().register_verb(verb, move |_, _| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(Flow::Continue)
    });
    count
}

fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

#[test]
fn sync_activation_from_another_thread_times_out_but_finishes() {
    let sink = Arc::new(Sink::default());
    let engine = build_engine(
        engine_builder()
            .with_host(Arc::new(PlayerHost))
            .with_sink(sink.clone())
            .with_config(EngineConfig {
                sync_timeout_ms: 100,
                ..Default::default()
            }),
    )
    .unwrap();
    let finished = counter(&engine, "finished");

    let trigger = engine
        .trigger("slow", "wait 400\ncooldown 60\nfinished")
        .unwrap();
    trigger.set_sync(true);
    let player = ActorId::random();

    let started = Instant::now();
    let outcome = trigger.try_activate(event(player), Vars::new());
    assert_eq!(outcome, Activation::Dispatched(Dispatch::TimedOut));
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(sink.timeouts(), 1);

    // The abandoned run still completes and its cooldown sticks
    assert!(wait_until(Duration::from_secs(3), || finished.load(Ordering::SeqCst) == 1));
    assert!(trigger.cooldowns().is_cooling_down(player));
    assert!(!trigger.activate(event(player), Vars::new()));
    assert_eq!(sink.count(), 1);
}

#[test]
fn sync_activation_within_budget_runs_on_main_thread() {
    let sink = Arc::new(Sink::default());
    let engine = build_engine(engine_builder().with_sink(sink.clone())).unwrap();
    let main = engine.main_executor().clone();
    let on_main = Arc::new(AtomicUsize::new(0));
    let seen = on_main.clone();
    engine.extensions().register_verb("check_thread", move |_, _| {
        if main.is_main_thread() {
            seen.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Flow::Continue)
    });

    let trigger = engine.trigger("quick", "check_thread").unwrap();
    trigger.set_sync(true);

    assert!(trigger.activate(event(ActorId::random()), Vars::new()));
    assert_eq!(on_main.load(Ordering::SeqCst), 1);
    assert_eq!(sink.count(), 0);
}

#[test]
fn async_activations_do_not_block_and_all_report() {
    let sink = Arc::new(Sink::default());
    let engine = build_engine(engine_builder().with_sink(sink.clone())).unwrap();
    let done = counter(&engine, "done");

    let ok = engine.trigger("ok", "wait 100\ndone").unwrap();
    let broken = engine.trigger("broken", "wait 100\nfail \"no luck\"").unwrap();

    let started = Instant::now();
    for i in 0..20 {
        let trigger = if i % 4 == 0 { &broken } else { &ok };
        assert!(trigger.activate(event(ActorId::random()), Vars::new()));
    }
    assert!(started.elapsed() < Duration::from_millis(100));

    assert!(wait_until(Duration::from_secs(5), || {
        done.load(Ordering::SeqCst) == 15 && sink.count() == 5
    }));
    assert!(
        sink.messages()
            .iter()
            .all(|m| m == "Trigger [broken] produced an error!: verb `fail` failed: no luck")
    );
}

#[test]
fn host_variables_reach_the_script() {
    let sink = Arc::new(Sink::default());
    let engine = build_engine(
        engine_builder()
            .with_host(Arc::new(PlayerHost))
            .with_sink(sink.clone()),
    )
    .unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    engine.extensions().register_verb("record", move |_, args| {
        record.lock().extend(args.iter().cloned());
        Ok(Flow::Continue)
    });
    engine.set_shared_var("server", Value::from("alpha"));

    let trigger = engine.trigger("vars", "record $player $server $local").unwrap();
    trigger.set_sync(true);
    let player = ActorId::random();
    let mut locals = Vars::new();
    locals.insert("local".into(), Value::Int(7));

    assert!(trigger.activate(event(player), locals));
    assert_eq!(
        seen.lock().clone(),
        vec![Value::Actor(player), Value::from("alpha"), Value::Int(7)]
    );
}

#[test]
fn container_lifecycle_through_the_manager() {
    let sink = Arc::new(Sink::default());
    let engine = build_engine(
        engine_builder()
            .with_host(Arc::new(PlayerHost))
            .with_sink(sink.clone()),
    )
    .unwrap();
    let containers = Arc::new(Containers::default());
    let manager = TriggerManager::new(engine.clone(), containers.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    engine.extensions().register_verb("record", move |interp, args| {
        record
            .lock()
            .push((args[0].to_string(), interp.is_sync()));
        Ok(Flow::Continue)
    });

    let mut items = ItemLayout::new();
    items.insert(0, ItemRef::new("compass", 1));
    manager
        .create_container_trigger("menu", "record $trigger", 9, items)
        .unwrap();
    let menu = manager.get("menu").unwrap();
    let player = ActorId::random();

    let handle = manager.open_container("menu", player).unwrap();
    assert_eq!(containers.shown.lock().clone(), vec![(handle, player)]);

    // Interactions from the caller's thread run async by default
    assert!(manager.registry().on_interact(event(player), handle, player, "click", Vars::new()));
    assert!(wait_until(Duration::from_secs(3), || seen.lock().len() == 1));

    assert!(manager.registry().on_close(event(player), handle, player));
    assert!(!manager.registry().on_close(event(player), handle, player));
    assert!(!menu.is_sync());

    let seen = seen.lock().clone();
    assert_eq!(
        seen,
        vec![("click".to_string(), false), ("close".to_string(), true)]
    );
    assert_eq!(manager.registry().open_count(), 0);
    assert_eq!(sink.count(), 0);
}

#[test]
fn failed_edit_keeps_the_running_script() {
    let engine = build_engine(engine_builder()).unwrap();
    let trigger = engine.trigger("edit", "log before").unwrap();

    let err = trigger.set_script("log \"unterminated").unwrap_err();
    assert_eq!(
        error_chain(&err),
        "failed to lex script `edit`: line 1, column 5: unterminated string"
    );
    assert_eq!(trigger.script(), "log before");

    trigger.set_script("if $x\nlog after\nend").unwrap();
    assert_eq!(trigger.script(), "if $x\nlog after\nend");
}
