use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Smallest sleep slice, so `stop()` takes effect promptly even while the
/// ticker is sitting out a backoff period.
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Runs a caller-supplied task repeatedly on its own thread until stopped.
///
/// A failing (or panicking) iteration is logged and followed by a fixed
/// backoff before the next attempt; the ticker never terminates because of
/// task failure. Used to drive the embedded engine's timer/update logic
/// independent of the host frame rate.
pub struct Ticker {
    stop: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Ticker {
    pub fn spawn<F>(name: &str, interval: Duration, backoff: Duration, mut task: F) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let thread_name = name.to_string();

        let worker = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                while !stop_flag.load(Ordering::Acquire) {
                    let outcome = catch_unwind(AssertUnwindSafe(&mut task));
                    let delay = match outcome {
                        Ok(Ok(())) => interval,
                        Ok(Err(e)) => {
                            log::error!("Ticker [{thread_name}]: iteration failed: {e}");
                            backoff
                        }
                        Err(_) => {
                            log::error!("Ticker [{thread_name}]: iteration panicked");
                            backoff
                        }
                    };
                    sleep_with_stop(&stop_flag, delay);
                }
            })
            .expect("Failed to spawn ticker thread");

        Self {
            stop,
            worker: Some(worker),
        }
    }

    /// Ask the ticker to stop after the current iteration.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn sleep_with_stop(stop: &AtomicBool, total: Duration) {
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::Acquire) {
        let slice = remaining.min(SLEEP_SLICE);
        thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}
