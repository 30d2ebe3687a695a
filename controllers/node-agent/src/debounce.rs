//! Trailing-edge debounce for watch events
//!
//! Every call schedules its closure after the window; only the closure of
//! the last call made within a window runs.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedules `f`, superseding any call still waiting out its window
    pub fn call<F, Fut>(&self, f: F) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = self.generation.clone();
        let window = self.window;

        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if generation.load(Ordering::SeqCst) == ticket {
                f().await;
            }
        })
    }
}
