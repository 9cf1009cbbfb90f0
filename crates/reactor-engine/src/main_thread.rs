//! The single designated thread that runs sync-mode activations
//!
//! Tasks submitted from other threads queue up and run one at a time in
//! submission order.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{JoinHandle, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing::{debug, error};

/// Work handed to the main thread
pub type MainTask = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the main thread has shut down")]
pub struct MainThreadGone;

/// Detection of, and hand-off to, the host's main execution context
pub trait MainExecutor: Send + Sync + 'static {
    fn is_main_thread(&self) -> bool;

    /// Queue `task` on the main thread without waiting for it
    fn submit(&self, task: MainTask) -> Result<(), MainThreadGone>;
}

/// A dedicated OS thread draining a FIFO task queue
pub struct MainThread {
    tx: Mutex<Option<UnboundedSender<MainTask>>>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MainThread {
    /// Spawn the thread under `name`
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx, mut rx) = unbounded_channel::<MainTask>();

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(task) = rx.blocking_recv() {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
                        error!(target: "scheduler", "Main thread task panicked: {:?}", panic);
                    }
                }
                debug!(target: "scheduler", "Main thread queue closed, exiting");
            })?;

        debug!(target: "scheduler", "Spawned main thread '{}'", name);

        Ok(Self {
            thread_id: handle.thread().id(),
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop accepting work, let queued tasks finish, and join the thread
    ///
    /// Calling this from the main thread itself only closes the queue.
    pub fn shutdown(&self) {
        self.tx.lock().take();

        if self.is_main_thread() {
            return;
        }

        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                error!(target: "scheduler", "Main thread panicked during shutdown");
            }
        }
    }
}

impl MainExecutor for MainThread {
    fn is_main_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    fn submit(&self, task: MainTask) -> Result<(), MainThreadGone> {
        let tx = self.tx.lock();
        match tx.as_ref() {
            Some(tx) => tx.send(task).map_err(|_| MainThreadGone),
            None => Err(MainThreadGone),
        }
    }
}

impl Drop for MainThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_tasks_run_on_the_main_thread() {
        let main = Arc::new(MainThread::spawn("test-main").unwrap());
        assert!(!main.is_main_thread());

        let (tx, rx) = mpsc::channel();
        let main_handle = main.clone();
        main.submit(Box::new(move || {
            tx.send(main_handle.is_main_thread()).unwrap();
        }))
        .unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap());
    }

    #[test]
    fn test_tasks_run_in_submission_order() {
        let main = MainThread::spawn("test-order").unwrap();
        let (tx, rx) = mpsc::channel();

        for i in 0..20 {
            let tx = tx.clone();
            main.submit(Box::new(move || tx.send(i).unwrap())).unwrap();
        }

        let seen: Vec<i32> = (0..20)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_task_does_not_kill_the_thread() {
        let main = MainThread::spawn("test-panic").unwrap();
        let (tx, rx) = mpsc::channel();

        main.submit(Box::new(|| panic!("boom"))).unwrap();
        main.submit(Box::new(move || tx.send(()).unwrap())).unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let main = MainThread::spawn("test-shutdown").unwrap();
        main.shutdown();
        assert_eq!(main.submit(Box::new(|| {})), Err(MainThreadGone));
    }
}
