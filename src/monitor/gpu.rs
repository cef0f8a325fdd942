//! GPU probe backed by NVML
//!
//! Reports `gpu{i}_mem_GiB` (device memory in use) and `gpu{i}_util` (percent)
//! for every visible device. Without the `nvml` feature, or when the NVML
//! library cannot be loaded, no GPU metrics are produced.

use super::Probe;

#[cfg(feature = "nvml")]
pub(crate) use enabled::NvmlProbe;

#[cfg(feature = "nvml")]
mod enabled {
    use nvml_wrapper::Nvml;
    use tracing::debug;

    use super::super::{GIB, Probe};

    pub(crate) struct NvmlProbe {
        nvml: Nvml,
        devices: u32,
    }

    impl NvmlProbe {
        pub(crate) fn new() -> Option<Self> {
            let nvml = match Nvml::init() {
                Ok(nvml) => nvml,
                Err(e) => {
                    debug!(error = %e, "NVML not available, skipping GPU metrics");
                    return None;
                }
            };
            let devices = nvml.device_count().ok()?;
            Some(Self { nvml, devices })
        }
    }

    impl Probe for NvmlProbe {
        fn sample(&mut self, out: &mut Vec<(String, f64)>) {
            for i in 0..self.devices {
                let Ok(device) = self.nvml.device_by_index(i) else {
                    continue;
                };
                if let Ok(memory) = device.memory_info() {
                    out.push((format!("gpu{i}_mem_GiB"), memory.used as f64 / GIB));
                }
                if let Ok(rates) = device.utilization_rates() {
                    out.push((format!("gpu{i}_util"), f64::from(rates.gpu)));
                }
            }
        }
    }
}

/// The GPU probe for this build, if any device can be queried
pub(crate) fn gpu_probe() -> Option<Box<dyn Probe>> {
    #[cfg(feature = "nvml")]
    {
        NvmlProbe::new().map(|p| Box::new(p) as Box<dyn Probe>)
    }
    #[cfg(not(feature = "nvml"))]
    {
        tracing::debug!("GPU metrics requested but the nvml feature is disabled");
        None
    }
}
