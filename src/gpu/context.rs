//! GPU context management
//!
//! The `GpuContext` holds the wgpu device and queue that GPU back-ends submit
//! their transforms to, plus the buffer pool they allocate scratch memory from.

use std::sync::Arc;

use super::pool::{BufferPool, BufferPoolConfig};

pub struct GpuContext {
    /// The GPU device
    device: wgpu::Device,
    /// Command queue
    queue: wgpu::Queue,
    /// Adapter info for logging
    adapter_info: wgpu::AdapterInfo,
    /// Reusable device buffers
    buffer_pool: Arc<BufferPool>,
}

impl GpuContext {
    /// Create a new GPU context
    ///
    /// Picks a high-performance adapter and opens a device on it.
    /// # Errors
    /// no adapter, or the device request fails
    pub fn new() -> Result<Self, String> {
        // wgpu is async; the harness is not
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Result<Self, String> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| format!("No suitable GPU adapter found: {e}"))?;

        let adapter_info = adapter.get_info();

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("nufft-bench device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        };

        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .map_err(|e| format!("Failed to create device: {e}"))?;

        Ok(Self {
            device,
            queue,
            adapter_info,
            buffer_pool: Arc::new(BufferPool::new(BufferPoolConfig::default())),
        })
    }

    /// GPU device name for display
    pub fn device_name(&self) -> &str {
        &self.adapter_info.name
    }

    pub const fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub const fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    /// Storage buffer of at least `size` bytes, reused from the pool when possible
    ///
    /// The returned buffer's actual size is [`BufferPool::allocation_size`].
    /// Hand it back with [`GpuContext::recycle`] once the transform is done.
    pub fn scratch_buffer(&self, size: usize) -> wgpu::Buffer {
        if let Some(buffer) = self.buffer_pool.acquire(size) {
            return buffer;
        }
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("nufft-bench scratch"),
            size: BufferPool::allocation_size(size.max(4)) as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Return a scratch buffer to the pool; buffers the pool rejects are freed
    pub fn recycle(&self, buffer: wgpu::Buffer) {
        let size = buffer.size() as usize;
        if !self.buffer_pool.release(buffer, size) {
            tracing::debug!(size, "GPU buffer pool full, freeing buffer");
        }
    }
}
