//! Dispatch of bound activations
//!
//! Async activations go to a tokio blocking pool and are never waited on.
//! Sync activations run inline when the caller is already on the main thread;
//! otherwise they are handed to the main thread and the caller waits at most
//! the configured budget. Giving up on the wait does not cancel the task: it
//! still runs to completion on the main thread, and a late failure still
//! reaches the sink.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{RecvTimeoutError, sync_channel};
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tracing::{debug, debug_span, trace};

use crate::config::EngineConfig;
use crate::error::{BuildError, ScriptError, TriggerError};
use crate::host::ExceptionSink;
use crate::main_thread::MainExecutor;
use crate::value::EventRef;

/// How a finished run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
}

/// Where an activation went once it passed the gate and was bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Submitted to the async pool
    Queued,
    /// Ran inline on the main thread
    Ran(Outcome),
    /// Handed off to the main thread and finished within the budget
    HandedOff(Outcome),
    /// Handed off, but the caller stopped waiting
    TimedOut,
    /// The main thread refused or dropped the task
    Rejected,
}

type RunFn = Box<dyn FnOnce() -> Result<(), ScriptError> + Send + 'static>;

/// A bound interpreter run plus what is needed to report on it
pub struct Job {
    trigger: String,
    timing_id: String,
    event: EventRef,
    run: RunFn,
}

impl Job {
    pub fn new(
        trigger: impl Into<String>,
        timing_id: impl Into<String>,
        event: EventRef,
        run: impl FnOnce() -> Result<(), ScriptError> + Send + 'static,
    ) -> Self {
        Self {
            trigger: trigger.into(),
            timing_id: timing_id.into(),
            event,
            run: Box::new(run),
        }
    }

    /// Run to completion, routing any failure or panic to `sink`
    fn execute(self, sink: &dyn ExceptionSink, sync: bool) -> Outcome {
        let Job {
            trigger,
            timing_id,
            event,
            run,
        } = self;

        let span = debug_span!(target: "scheduler", "trigger_run", timing = %timing_id, sync);
        let _entered = span.enter();

        let result = match catch_unwind(AssertUnwindSafe(run)) {
            Ok(result) => result,
            Err(panic) => Err(ScriptError::Panicked(panic_message(panic.as_ref()))),
        };

        match result {
            Ok(()) => {
                trace!(target: "scheduler", "Trigger [{}] finished", trigger);
                Outcome::Completed
            }
            Err(source) => {
                sink.handle(&event, TriggerError::Runtime { trigger, source });
                Outcome::Failed
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

enum Pool {
    Owned(Runtime),
    Shared(Handle),
}

impl Pool {
    fn handle(&self) -> &Handle {
        match self {
            Pool::Owned(runtime) => runtime.handle(),
            Pool::Shared(handle) => handle,
        }
    }
}

pub struct Scheduler {
    pool: Pool,
    main: Arc<dyn MainExecutor>,
    sink: Arc<dyn ExceptionSink>,
    sync_timeout: Duration,
}

impl Scheduler {
    /// Build a scheduler that owns its worker runtime
    pub fn new(
        config: &EngineConfig,
        main: Arc<dyn MainExecutor>,
        sink: Arc<dyn ExceptionSink>,
    ) -> Result<Self, BuildError> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder
            .thread_name("reactor-worker")
            .max_blocking_threads(config.max_blocking_threads)
            .enable_time();
        if let Some(workers) = config.worker_threads {
            builder.worker_threads(workers);
        }
        let runtime = builder.build().map_err(BuildError::Runtime)?;

        Ok(Self {
            pool: Pool::Owned(runtime),
            main,
            sink,
            sync_timeout: config.sync_timeout(),
        })
    }

    /// Build a scheduler on an existing tokio runtime
    pub fn with_handle(
        handle: Handle,
        config: &EngineConfig,
        main: Arc<dyn MainExecutor>,
        sink: Arc<dyn ExceptionSink>,
    ) -> Self {
        Self {
            pool: Pool::Shared(handle),
            main,
            sink,
            sync_timeout: config.sync_timeout(),
        }
    }

    pub fn sync_timeout(&self) -> Duration {
        self.sync_timeout
    }

    pub fn main_executor(&self) -> &Arc<dyn MainExecutor> {
        &self.main
    }

    pub fn sink(&self) -> &Arc<dyn ExceptionSink> {
        &self.sink
    }

    pub fn dispatch(&self, job: Job, sync: bool) -> Dispatch {
        if !sync {
            let sink = self.sink.clone();
            debug!(target: "scheduler", "Queueing Trigger [{}] on the worker pool", job.trigger);
            // Detached: nothing joins async runs
            drop(
                self.pool
                    .handle()
                    .spawn_blocking(move || job.execute(sink.as_ref(), false)),
            );
            return Dispatch::Queued;
        }

        if self.main.is_main_thread() {
            return Dispatch::Ran(job.execute(self.sink.as_ref(), true));
        }

        self.hand_off(job)
    }

    fn hand_off(&self, job: Job) -> Dispatch {
        let trigger = job.trigger.clone();
        let event = job.event.clone();
        let (done_tx, done_rx) = sync_channel::<Outcome>(1);

        let sink = self.sink.clone();
        let task = Box::new(move || {
            let name = job.trigger.clone();
            let outcome = job.execute(sink.as_ref(), true);
            if done_tx.send(outcome).is_err() {
                debug!(
                    target: "scheduler",
                    "Trigger [{}] finished ({:?}) after its caller stopped waiting",
                    name,
                    outcome
                );
            }
        });

        if self.main.submit(task).is_err() {
            self.sink
                .handle(&event, TriggerError::MainThreadGone { trigger });
            return Dispatch::Rejected;
        }

        match done_rx.recv_timeout(self.sync_timeout) {
            Ok(outcome) => Dispatch::HandedOff(outcome),
            Err(RecvTimeoutError::Timeout) => {
                self.sink.handle(
                    &event,
                    TriggerError::TimedOut {
                        trigger,
                        budget: self.sync_timeout,
                    },
                );
                Dispatch::TimedOut
            }
            Err(RecvTimeoutError::Disconnected) => {
                // Queue dropped the task without running it
                self.sink
                    .handle(&event, TriggerError::MainThreadGone { trigger });
                Dispatch::Rejected
            }
        }
    }
}
