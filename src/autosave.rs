//! Debounced autosave.
//!
//! Every edit calls [`Debouncer::schedule`]; only the last job scheduled within
//! the quiet period actually runs. Earlier pending jobs are aborted.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;

use crate::metrics::AUTOSAVE_SCHEDULED_TOTAL;

pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any pending job with `job`, to run once `delay` has elapsed
    /// without another call. Must be called inside a tokio runtime.
    pub fn schedule<F, Fut>(&self, job: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let mut slot = self.pending.lock().expect("debouncer mutex poisoned");
        if let Some(prev) = slot.take() {
            prev.abort();
        }
        counter!(AUTOSAVE_SCHEDULED_TOTAL).increment(1);
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job().await;
        }));
    }

    /// Drop the pending job, if any. Returns whether one was still waiting.
    pub fn cancel(&self) -> bool {
        let mut slot = self.pending.lock().expect("debouncer mutex poisoned");
        match slot.take() {
            Some(h) if !h.is_finished() => {
                h.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .expect("debouncer mutex poisoned")
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.pending.lock() {
            if let Some(h) = slot.take() {
                h.abort();
            }
        }
    }
}
