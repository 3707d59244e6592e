//! Cancellable, rearmable single-shot timer.
//!
//! A `Session` carries five of these (connect-delay, connect-timeout,
//! heartbeat, recv-idle, rate-limit). Each is backed by a
//! generation counter rather than a cancellation token: arming bumps the
//! generation and spawns a `compio::time::sleep` task tagged with the new
//! generation number; the task only invokes its callback if the generation
//! it captured is still current when the sleep completes. A later `arm` or
//! an explicit `cancel` bumps the generation again, silently invalidating
//! any in-flight wait — arming a timer at a new deadline cancels any prior
//! wait on the same timer.
//!
//! Must be armed from the thread running the owning Reactor's `compio`
//! runtime, since `arm` spawns onto the current-thread executor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A single logical timer slot.
#[derive(Debug, Default)]
pub struct Timer {
    generation: Arc<AtomicU64>,
}

impl Timer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Arm the timer for `duration`. `on_fire` runs on the owning Reactor's
    /// thread when `duration` elapses, unless a later `arm`/`cancel` on this
    /// same `Timer` happened first.
    pub fn arm<F>(&self, duration: Duration, on_fire: F)
    where
        F: FnOnce() + 'static,
    {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        compio::runtime::spawn(async move {
            compio::time::sleep(duration).await;
            if generation.load(Ordering::SeqCst) == my_generation {
                on_fire();
            }
        })
        .detach();
    }

    /// Invalidate any pending wait without arming a new one.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
