use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use tokio::sync::oneshot;

/// Error returned by [`TaskHandle::wait`].
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The executor has been shut down; the task was never run.
    #[error("executor queue is closed")]
    Closed,

    /// The task panicked while running on the worker thread.
    #[error("task panicked: {0}")]
    Panicked(String),
}

type Task<S> = Box<dyn FnOnce(&mut S) + Send>;

/// A single dedicated worker thread that owns a state value `S` and runs
/// submitted closures against it, one at a time, in submission order.
///
/// This is the sole synchronization boundary for state that is not `Send`:
/// `S` is constructed on the worker thread and never leaves it. A panic
/// inside a task is captured into its [`TaskHandle`]; the worker keeps
/// processing subsequent tasks.
pub struct SerialExecutor<S> {
    tx: Mutex<Option<Sender<Task<S>>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl<S: 'static> SerialExecutor<S> {
    /// Spawn the worker thread. `init` runs on the worker and produces the
    /// state value all tasks will receive.
    pub fn spawn<I>(name: &str, init: I) -> Self
    where
        I: FnOnce() -> S + Send + 'static,
    {
        let (tx, rx) = unbounded::<Task<S>>();

        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut state = init();
                while let Ok(task) = rx.recv() {
                    task(&mut state);
                }
            })
            .expect("Failed to spawn executor worker thread");

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Submit a task. The returned handle resolves when the task has run;
    /// after [`shutdown`](Self::shutdown) it resolves to [`TaskError::Closed`]
    /// without the task ever executing.
    pub fn submit<T, F>(&self, f: F) -> TaskHandle<T>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();

        let task: Task<S> = Box::new(move |state| {
            let result = catch_unwind(AssertUnwindSafe(|| f(state)));
            // Receiver may have been dropped for fire-and-forget tasks.
            let _ = done_tx.send(result.map_err(panic_message));
        });

        let accepted = match self.tx.lock().unwrap().as_ref() {
            Some(tx) => tx.send(task).is_ok(),
            None => false,
        };

        if !accepted {
            log::warn!("SerialExecutor: task submitted after shutdown, dropping");
        }

        TaskHandle { rx: done_rx }
    }

    /// True once [`shutdown`](Self::shutdown) has run; later submissions
    /// fail fast with [`TaskError::Closed`].
    pub fn is_closed(&self) -> bool {
        self.tx.lock().unwrap().is_none()
    }

    /// Close the queue and join the worker. Tasks already queued still run.
    pub fn shutdown(&self) {
        self.tx.lock().unwrap().take();
        if let Some(worker) = self.worker.lock().unwrap().take() {
            if worker.join().is_err() {
                log::error!("SerialExecutor: worker thread terminated abnormally");
            }
        }
    }
}

impl<S> Drop for SerialExecutor<S> {
    fn drop(&mut self) {
        self.tx.lock().unwrap().take();
        if let Some(worker) = self.worker.lock().unwrap().take() {
            let _ = worker.join();
        }
    }
}

/// Future-like handle to the result of a submitted task.
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T, String>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task has settled. Intended only for short, bounded
    /// operations (focus-state queries, teardown completion).
    pub fn wait(self) -> Result<T, TaskError> {
        match self.rx.blocking_recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(msg)) => Err(TaskError::Panicked(msg)),
            // Sender dropped without sending: the task never ran.
            Err(_) => Err(TaskError::Closed),
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn tasks_run_in_submission_order_against_worker_state() {
        let executor = SerialExecutor::spawn("test-exec", Vec::<u32>::new);

        for i in 0..100u32 {
            executor.submit(move |state: &mut Vec<u32>| state.push(i));
        }

        let seen = executor
            .submit(|state: &mut Vec<u32>| state.clone())
            .wait()
            .unwrap();
        assert_eq!(seen, (0..100).collect::<Vec<u32>>());
    }

    #[test]
    fn panicking_task_is_captured_and_worker_survives() {
        let executor = SerialExecutor::spawn("test-exec", || 0u32);

        let failed = executor.submit(|_: &mut u32| panic!("boom"));
        match failed.wait() {
            Err(TaskError::Panicked(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected panic capture, got {other:?}"),
        }

        // The worker must still process subsequent tasks.
        let answer = executor.submit(|state: &mut u32| {
            *state += 42;
            *state
        });
        assert_eq!(answer.wait().unwrap(), 42);
    }

    #[test]
    fn submissions_after_shutdown_resolve_to_closed() {
        let executor = SerialExecutor::spawn("test-exec", || ());
        executor.shutdown();
        assert!(executor.is_closed());

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        let handle = executor.submit(move |_: &mut ()| {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(matches!(handle.wait(), Err(TaskError::Closed)));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn queued_tasks_still_run_during_shutdown() {
        let executor = SerialExecutor::spawn("test-exec", || 0u32);
        let handle = executor.submit(|state: &mut u32| {
            *state += 1;
            *state
        });
        executor.shutdown();
        assert_eq!(handle.wait().unwrap(), 1);
    }
}
