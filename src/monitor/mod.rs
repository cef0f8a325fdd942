//! Resource monitoring during timed runs
//!
//! A [`ResourceMonitor`] samples process memory and CPU usage (and optionally
//! GPU memory and utilisation) on a background thread for as long as a
//! [`MonitorSession`] is alive. Each session starts from an empty sample set and
//! always records at least one sample at its start and one at its end, so
//! [`ResourceMonitor::values`] is never empty for a metric the probes support.
//!
//! Probes are created once per monitor and reused by every session, so CPU
//! usage is always measured against the previous refresh and NVML is
//! initialised only once. CPU usage is refreshed at most every
//! `sysinfo::System::MINIMUM_CPU_UPDATE_INTERVAL`; samples in between repeat
//! the last reading.
//!
//! Metric names:
//! - `rss_GiB`: resident set size of this process
//! - `cpus`: CPU usage in cores (1.0 = one fully used core)
//! - `gpu{i}_mem_GiB`, `gpu{i}_util`: per-device GPU metrics (`nvml` feature)

mod gpu;
mod process;
pub mod timer;

pub use timer::{PerfLog, PerfScope};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

pub(crate) const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Sampled values per metric name
pub type Samples = BTreeMap<String, Vec<f64>>;

/// A source of metric samples, polled from the monitor thread
pub(crate) trait Probe: Send {
    fn sample(&mut self, out: &mut Vec<(String, f64)>);
}

type Probes = Arc<Mutex<Vec<Box<dyn Probe>>>>;

fn build_probes(gpu: bool) -> Vec<Box<dyn Probe>> {
    let mut probes: Vec<Box<dyn Probe>> = Vec::new();
    if let Some(p) = process::ProcessProbe::new() {
        probes.push(Box::new(p));
    }
    if gpu && let Some(p) = gpu::gpu_probe() {
        probes.push(p);
    }
    probes
}

fn record(probes: &Mutex<Vec<Box<dyn Probe>>>, samples: &Mutex<Samples>) {
    let mut batch = Vec::new();
    for probe in probes.lock().unwrap_or_else(PoisonError::into_inner).iter_mut() {
        probe.sample(&mut batch);
    }
    let mut samples = samples.lock().unwrap_or_else(PoisonError::into_inner);
    for (name, value) in batch {
        samples.entry(name).or_default().push(value);
    }
}

/// Background sampler of process and GPU resources
pub struct ResourceMonitor {
    interval: Duration,
    gpu: bool,
    probes: Probes,
    samples: Arc<Mutex<Samples>>,
}

impl std::fmt::Debug for ResourceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let probes = self.probes.lock().unwrap_or_else(PoisonError::into_inner).len();
        f.debug_struct("ResourceMonitor")
            .field("interval", &self.interval)
            .field("gpu", &self.gpu)
            .field("probes", &probes)
            .finish_non_exhaustive()
    }
}

impl ResourceMonitor {
    /// `interval` is the sampling period; `gpu` adds the GPU probe
    #[must_use]
    pub fn new(interval: Duration, gpu: bool) -> Self {
        Self::with_probes(interval, gpu, build_probes(gpu))
    }

    pub(crate) fn with_probes(interval: Duration, gpu: bool, probes: Vec<Box<dyn Probe>>) -> Self {
        Self {
            interval,
            gpu,
            probes: Arc::new(Mutex::new(probes)),
            samples: Arc::new(Mutex::new(Samples::new())),
        }
    }

    #[must_use]
    pub fn gpu(&self) -> bool {
        self.gpu
    }

    /// Clear previous samples and start sampling until the session drops
    /// # Errors
    /// `Io` if the sampling thread cannot be spawned
    pub fn session(&self) -> Result<MonitorSession<'_>> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            let samples = Arc::clone(&self.samples);
            let probes = Arc::clone(&self.probes);
            let interval = self.interval;
            thread::Builder::new()
                .name("resource-monitor".to_string())
                .spawn(move || {
                    record(&probes, &samples);
                    loop {
                        if !stop.load(Ordering::Acquire) {
                            thread::park_timeout(interval);
                        }
                        record(&probes, &samples);
                        if stop.load(Ordering::Acquire) {
                            break;
                        }
                    }
                })?
        };

        Ok(MonitorSession {
            monitor: self,
            stop,
            handle: Some(handle),
        })
    }

    /// Copy of the samples collected by the latest session
    #[must_use]
    pub fn values(&self) -> Samples {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Active sampling; stops and joins the sampling thread when dropped
pub struct MonitorSession<'a> {
    monitor: &'a ResourceMonitor,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MonitorSession<'_> {
    /// Stop sampling and return what was collected
    #[must_use]
    pub fn finish(mut self) -> Samples {
        self.stop_sampling();
        self.monitor.values()
    }

    fn stop_sampling(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.store(true, Ordering::Release);
            handle.thread().unpark();
            if handle.join().is_err() {
                debug!("resource monitor thread panicked");
            }
        }
    }
}

impl Drop for MonitorSession<'_> {
    fn drop(&mut self) {
        self.stop_sampling();
    }
}

/// Arithmetic mean, 0.0 for no samples
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Largest sample, 0.0 for no samples
#[must_use]
pub fn peak(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}
