//! Named wall-clock timers
//!
//! ```ignore
//! let perf = PerfLog::new();
//! {
//!     let _scope = perf.scope("forward");
//!     op.op(&image)?;
//! }
//! let secs = perf.get_timer("forward");
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use tracing::info;

/// Last recorded duration per timer name, in seconds
#[derive(Debug, Default)]
pub struct PerfLog {
    timers: Mutex<HashMap<String, f64>>,
}

impl PerfLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing `name`; the duration is recorded when the guard drops
    #[must_use = "the scope records its duration when dropped"]
    pub fn scope(&self, name: &str) -> PerfScope<'_> {
        PerfScope {
            log: self,
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    /// Duration of the most recently closed scope named `name`
    #[must_use]
    pub fn get_timer(&self, name: &str) -> Option<f64> {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    fn record(&self, name: String, seconds: f64) {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, seconds);
    }
}

/// Guard returned by [`PerfLog::scope`]
pub struct PerfScope<'a> {
    log: &'a PerfLog,
    name: String,
    start: Instant,
}

impl Drop for PerfScope<'_> {
    fn drop(&mut self) {
        let seconds = self.start.elapsed().as_secs_f64();
        info!(timer = %self.name, seconds, "timed");
        self.log.record(std::mem::take(&mut self.name), seconds);
    }
}
