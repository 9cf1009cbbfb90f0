//! Shared fixtures for the engine's unit tests

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{LexError, ParseError, ScriptError, TriggerError, error_chain};
use crate::extensions::Extensions;
use crate::host::{ContainerHost, ExceptionSink, Host, ItemLayout};
use crate::language::{Flow, Interception, Interpreter, Interrupter, Language, Parsed};
use crate::main_thread::{MainExecutor, MainTask, MainThreadGone};
use crate::registry::ContainerHandle;
use crate::value::{ActorId, Event, EventRef, Value, Vars};

/// One line of the mock language
#[derive(Debug, Clone)]
pub enum Step {
    Call(String, Vec<String>),
    Fail(String),
    Sleep(u64),
    Panic(String),
    Stop,
}

/// Line-per-step language: `call <verb> [args]`, `fail <msg>`,
/// `sleep <ms>`, `panic <msg>`, `stop`, `warn <msg>`
///
/// A line starting with `!` is a lex error; any other keyword is a parse
/// error. `$name` arguments resolve to variables at run time.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockLanguage;

impl Language for MockLanguage {
    type Token = (usize, String);
    type Ast = Vec<Step>;

    fn lex(&self, source: &str) -> Result<Vec<Self::Token>, LexError> {
        let mut tokens = Vec::new();
        for (index, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.starts_with('!') {
                return Err(LexError {
                    line: index + 1,
                    column: 1,
                    message: "unexpected `!`".into(),
                });
            }
            if !line.is_empty() {
                tokens.push((index + 1, line.to_string()));
            }
        }
        Ok(tokens)
    }

    fn parse(&self, tokens: Vec<Self::Token>) -> Result<Parsed<Self::Ast>, ParseError> {
        let mut parsed = Parsed::new(Vec::new());
        for (line, text) in tokens {
            let mut words = text.split_whitespace();
            let keyword = words.next().unwrap_or_default();
            let rest: Vec<String> = words.map(str::to_string).collect();
            let step = match keyword {
                "call" if !rest.is_empty() => Step::Call(rest[0].clone(), rest[1..].to_vec()),
                "fail" => Step::Fail(rest.join(" ")),
                "sleep" => Step::Sleep(rest.first().and_then(|ms| ms.parse().ok()).ok_or(
                    ParseError {
                        line,
                        message: "sleep needs milliseconds".into(),
                    },
                )?),
                "panic" => Step::Panic(rest.join(" ")),
                "stop" => Step::Stop,
                "warn" => {
                    parsed = parsed.with_warning(line, rest.join(" "));
                    Step::Call("noop".into(), Vec::new())
                }
                other => {
                    return Err(ParseError {
                        line,
                        message: format!("unknown step `{}`", other),
                    });
                }
            };
            parsed.ast.push(step);
        }
        Ok(parsed)
    }

    fn run(
        &self,
        ast: &Self::Ast,
        interp: &mut Interpreter,
        interrupter: &mut dyn Interrupter,
    ) -> Result<(), ScriptError> {
        for step in ast {
            match step {
                Step::Call(verb, raw) if verb == "noop" && raw.is_empty() => {}
                Step::Call(verb, raw) => {
                    let args: Vec<Value> = raw.iter().map(|arg| argument(interp, arg)).collect();
                    match interrupter.intercept(interp, verb, &args)? {
                        Interception::Handled => continue,
                        Interception::Stop => return Ok(()),
                        Interception::Pass => {}
                    }
                    if interp.call_verb(verb, &args)? == Flow::Stop {
                        return Ok(());
                    }
                }
                Step::Fail(message) => return Err(ScriptError::Message(message.clone())),
                Step::Sleep(ms) => std::thread::sleep(Duration::from_millis(*ms)),
                Step::Panic(message) => panic!("{}", message),
                Step::Stop => return Ok(()),
            }
        }
        Ok(())
    }
}

fn argument(interp: &Interpreter, raw: &str) -> Value {
    if let Some(name) = raw.strip_prefix('$') {
        return interp.var(name).cloned().unwrap_or_default();
    }
    match raw.parse::<i64>() {
        Ok(n) => Value::Int(n),
        Err(_) => Value::from(raw),
    }
}

/// Records the first argument of every `trace` call
#[derive(Clone, Default)]
pub struct Trace {
    seen: Arc<Mutex<Vec<Value>>>,
}

impl Trace {
    pub fn install(extensions: &Extensions) -> Self {
        let trace = Trace::default();
        let seen = trace.seen.clone();
        extensions.register_verb("trace", move |_, args| {
            seen.lock().push(args.first().cloned().unwrap_or_default());
            Ok(Flow::Continue)
        });
        trace
    }

    /// Register `name` as a verb recording `read(interp)`
    pub fn install_named<F>(extensions: &Extensions, name: &str, read: F) -> Self
    where
        F: Fn(&Interpreter) -> Value + Send + Sync + 'static,
    {
        let trace = Trace::default();
        let seen = trace.seen.clone();
        extensions.register_verb(name, move |interp, _| {
            seen.lock().push(read(interp));
            Ok(Flow::Continue)
        });
        trace
    }

    pub fn values(&self) -> Vec<Value> {
        self.seen.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<(String, bool)>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.reports.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn timeouts(&self) -> usize {
        self.reports.lock().iter().filter(|(_, t)| *t).count()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ExceptionSink for RecordingSink {
    fn handle(&self, _event: &EventRef, error: TriggerError) {
        let timeout = error.is_timeout();
        self.reports.lock().push((error_chain(&error), timeout));
    }
}

#[derive(Debug)]
pub struct TestEvent {
    pub actor: Option<ActorId>,
}

impl TestEvent {
    pub fn by(actor: ActorId) -> EventRef {
        Arc::new(TestEvent { actor: Some(actor) })
    }

    pub fn anonymous() -> EventRef {
        Arc::new(TestEvent { actor: None })
    }
}

/// Reads actors off [`TestEvent`] and serves settable custom variables
#[derive(Default)]
pub struct TestHost {
    custom: Mutex<Vars>,
}

impl TestHost {
    pub fn set_custom_var(&self, key: &str, value: Value) {
        self.custom.lock().insert(key.to_string(), value);
    }

    pub fn clear_custom_vars(&self) {
        self.custom.lock().clear();
    }
}

impl Host for TestHost {
    fn extract_actor(&self, event: &dyn Event) -> Option<ActorId> {
        event.downcast_ref::<TestEvent>().and_then(|e| e.actor)
    }

    fn custom_vars(&self, _event: &dyn Event) -> Option<Vars> {
        let custom = self.custom.lock();
        (!custom.is_empty()).then(|| custom.clone())
    }
}

/// Treats every thread as the main thread
pub struct AlwaysMain;

impl MainExecutor for AlwaysMain {
    fn is_main_thread(&self) -> bool {
        true
    }

    fn submit(&self, task: MainTask) -> Result<(), MainThreadGone> {
        task();
        Ok(())
    }
}

#[derive(Default)]
pub struct MockContainers {
    next: AtomicU64,
    created: Mutex<Vec<(ContainerHandle, usize, String)>>,
    populated: Mutex<HashMap<ContainerHandle, ItemLayout>>,
    presented: Mutex<Vec<(ContainerHandle, ActorId)>>,
}

impl MockContainers {
    pub fn created(&self) -> Vec<(ContainerHandle, usize, String)> {
        self.created.lock().clone()
    }

    pub fn populated(&self, handle: ContainerHandle) -> Option<ItemLayout> {
        self.populated.lock().get(&handle).cloned()
    }

    pub fn presented(&self) -> Vec<(ContainerHandle, ActorId)> {
        self.presented.lock().clone()
    }
}

impl ContainerHost for MockContainers {
    fn create_container(&self, size: usize, title: &str) -> ContainerHandle {
        let handle = ContainerHandle::new(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        self.created.lock().push((handle, size, title.to_string()));
        handle
    }

    fn populate(&self, handle: ContainerHandle, items: &ItemLayout) {
        self.populated.lock().insert(handle, items.clone());
    }

    fn present(&self, handle: ContainerHandle, viewer: ActorId) {
        self.presented.lock().push((handle, viewer));
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
