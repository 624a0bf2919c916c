//! Blocking run loop bound to a periodic timer
//!
//! `World::start()` owns its timer for exactly the duration of the
//! call: a current-thread tokio runtime and a `tokio::time::interval`
//! are built on entry and dropped on every exit path, whether the loop
//! stops normally, a tick fails, or the thread unwinds.
//!
//! Ticks are serialized by construction. The next interval fire is
//! awaited only after the previous `tick()` has returned, and the stop
//! flag is consulted only between ticks, so `stop()` is boundary
//! aligned and never preempts a tick in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time::MissedTickBehavior;

use crate::core::error::{Result, SimError};
use crate::world::World;

/// Cloneable handle for requesting run-loop termination.
///
/// Hooks hold a handle instead of borrowing the world; the request
/// takes effect once the in-progress tick completes.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request loop termination at the next tick boundary
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub(crate) fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl World {
    /// Drive `tick()` once per `tick_interval` until [`World::stop`] or
    /// a [`StopHandle`] takes effect.
    ///
    /// Blocks the calling thread. Returns the first tick error, if any;
    /// the timer resources are released on every exit path.
    pub fn start(&mut self) -> Result<()> {
        let interval = self.config().tick_interval;
        if interval.is_zero() {
            return Err(SimError::InvalidConfig(
                "tick_interval must be non-zero for start()".into(),
            ));
        }

        self.stop.clear();
        tracing::info!(interval_ms = interval.as_millis() as u64, "run loop starting");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let result: Result<()> = runtime.block_on(async {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval fire completes immediately; consume it
            // so every tick waits out one full interval.
            timer.tick().await;

            loop {
                timer.tick().await;
                self.tick()?;
                if self.stop.is_set() {
                    break;
                }
            }
            Ok(())
        });

        if result.is_ok() {
            tracing::info!(tick = self.current_tick(), "run loop stopped");
        }
        result
    }

    /// Request loop termination; effective once the in-progress tick
    /// returns
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Handle that hooks (or other code) can use to stop the run loop
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}
