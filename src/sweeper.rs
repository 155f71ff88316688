//! Background housekeeping for an [`ObjectCache`].
//!
//! Lookups never need a sweep to stay correct: a slot whose key was
//! reclaimed can no longer be matched. The sweeper only bounds the memory
//! held by such slots (and enforces the soft capacity) by running
//! [`ObjectCache::purge`] on a tokio interval.
//!
//! The task holds a `Weak` reference to the cache and exits on its own once
//! the cache is dropped.
//!
//! ```no_run
//! use object_cache::{KeyStrength, ObjectCache, Sweeper};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> object_cache::Result<()> {
//! let cache: Arc<ObjectCache<String, String>> = Arc::new(ObjectCache::new(KeyStrength::Weak));
//! let sweeper = Sweeper::spawn(&cache, Duration::from_secs(30))?;
//! // ...
//! sweeper.stop();
//! # Ok(())
//! # }
//! ```

use crate::cache::ObjectCache;
use crate::error::{Error, Result};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Handle to a running sweep task. Dropping it stops the task.
pub struct Sweeper {
    task: JoinHandle<()>,
    sweeps: Arc<AtomicU64>,
    period: Duration,
}

impl Sweeper {
    /// Spawn a sweep task on the current tokio runtime.
    ///
    /// The first sweep runs one `period` after spawning.
    ///
    /// # Errors
    ///
    /// - `Error::ConfigError` if `period` is zero
    /// - `Error::Other` if called outside a tokio runtime
    pub fn spawn<K, V>(cache: &Arc<ObjectCache<K, V>>, period: Duration) -> Result<Self>
    where
        K: Hash + Eq + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        if period.is_zero() {
            return Err(Error::ConfigError(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        let runtime = Handle::try_current()
            .map_err(|e| Error::Other(format!("sweeper needs a tokio runtime: {}", e)))?;

        let cache = Arc::downgrade(cache);
        let sweeps = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&sweeps);

        let task = runtime.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            info!("Cache sweeper started (every {:?})", period);
            loop {
                ticker.tick().await;
                let Some(live) = cache.upgrade() else {
                    info!("Cache dropped, sweeper exiting");
                    break;
                };

                let purged = live.purge();
                counter.fetch_add(1, Ordering::Relaxed);
                if purged > 0 {
                    debug!("Sweep purged {} slots, {} remain", purged, live.len());
                } else {
                    trace!("Sweep found nothing to purge");
                }
            }
        });

        Ok(Sweeper {
            task,
            sweeps,
            period,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of completed sweeps.
    pub fn sweep_count(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the sweep task.
    pub fn stop(&self) {
        if !self.task.is_finished() {
            debug!("Stopping cache sweeper");
        }
        self.task.abort();
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.task.abort();
    }
}
