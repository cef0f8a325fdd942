//! Accelerator runtime shared by GPU back-ends
//!
//! With the `gpu` feature, a process-wide [`GpuContext`] (adapter, device,
//! queue and a reusable buffer pool) is created lazily on first use. The
//! benchmark runner only needs the cleanup hook: after every configuration the
//! pooled device memory is released so the next back-end starts from a clean
//! slate. Without the feature, or when no adapter is found, every function here
//! is a no-op.

#[cfg(feature = "gpu")]
mod context;
#[cfg(feature = "gpu")]
mod pool;

#[cfg(feature = "gpu")]
pub use context::GpuContext;
#[cfg(feature = "gpu")]
pub use pool::{BufferPool, BufferPoolConfig, BufferPoolStats};

#[cfg(feature = "gpu")]
use std::sync::OnceLock;

#[cfg(feature = "gpu")]
static GPU_CONTEXT: OnceLock<Option<GpuContext>> = OnceLock::new();

/// Get the global GPU context, initializing it if necessary
/// Returns None if no adapter is available
#[cfg(feature = "gpu")]
pub fn get_gpu_context() -> Option<&'static GpuContext> {
    GPU_CONTEXT
        .get_or_init(|| match GpuContext::new() {
            Ok(ctx) => {
                tracing::info!(device = ctx.device_name(), "GPU initialized");
                Some(ctx)
            }
            Err(e) => {
                tracing::debug!(error = %e, "GPU initialization failed, accelerator disabled");
                None
            }
        })
        .as_ref()
}

/// Check if an accelerator is available
#[must_use]
pub fn is_gpu_available() -> bool {
    #[cfg(feature = "gpu")]
    {
        get_gpu_context().is_some()
    }
    #[cfg(not(feature = "gpu"))]
    {
        false
    }
}

/// Release pooled accelerator memory
///
/// Returns the number of buffers freed, 0 when there is no accelerator.
pub fn release_memory_pools() -> usize {
    #[cfg(feature = "gpu")]
    {
        match get_gpu_context() {
            Some(ctx) => {
                let freed = ctx.buffer_pool().clear();
                tracing::debug!(freed, "released GPU buffer pool");
                freed
            }
            None => 0,
        }
    }
    #[cfg(not(feature = "gpu"))]
    {
        tracing::debug!("no accelerator runtime, nothing to release");
        0
    }
}

/// Number of buffers currently held by the pool, if an accelerator is present
#[must_use]
pub fn pooled_buffers() -> Option<usize> {
    #[cfg(feature = "gpu")]
    {
        get_gpu_context().map(|ctx| ctx.buffer_pool().stats().total_pooled)
    }
    #[cfg(not(feature = "gpu"))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_without_accelerator_is_noop() {
        if !is_gpu_available() {
            assert_eq!(release_memory_pools(), 0);
            assert_eq!(pooled_buffers(), None);
        }
    }

    #[cfg(feature = "gpu")]
    #[test]
    fn test_scratch_buffers_are_pooled_until_cleared() {
        // Private context so the runner tests cannot clear this pool midway
        let Ok(ctx) = GpuContext::new() else {
            return;
        };

        let buffer = ctx.scratch_buffer(5000);
        assert_eq!(buffer.size(), 8192);
        ctx.recycle(buffer);
        assert_eq!(ctx.buffer_pool().stats().total_pooled, 1);

        let again = ctx.scratch_buffer(6000);
        assert_eq!(ctx.buffer_pool().stats().total_pooled, 0);
        ctx.recycle(again);

        assert_eq!(ctx.buffer_pool().clear(), 1);
        assert_eq!(ctx.buffer_pool().stats().total_pooled, 0);
    }
}
