//! GPU buffer pooling for memory reuse across benchmark runs
//!
//! Buffers are organized into power-of-2 size buckets. A back-end acquires
//! scratch memory from the pool and hands it back when a transform is done;
//! the runner empties the pool after each configuration.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Configuration for the buffer pool
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Maximum number of buffers per size bucket
    pub max_buffers_per_bucket: usize,
    /// Maximum total buffers across all buckets
    pub max_total_buffers: usize,
    /// Largest buffer size (bytes) kept in the pool
    pub max_pooled_size: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            max_buffers_per_bucket: 4,
            max_total_buffers: 32,
            max_pooled_size: 256 * 1024 * 1024,
        }
    }
}

/// Free buffers and their count, guarded together
#[derive(Default)]
struct PoolState {
    buckets: HashMap<u32, VecDeque<wgpu::Buffer>>,
    total: usize,
}

/// A pool of reusable GPU buffers, organized by size buckets
///
/// A 5000-byte request is served from the 8192-byte bucket.
pub struct BufferPool {
    state: Mutex<PoolState>,
    config: BufferPoolConfig,
}

impl BufferPool {
    #[must_use]
    pub fn new(config: BufferPoolConfig) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            config,
        }
    }

    /// Bucket index (log2 of the rounded-up size)
    const fn size_to_bucket(size: usize) -> u32 {
        if size == 0 {
            return 0;
        }
        usize::BITS - (size - 1).leading_zeros()
    }

    const fn bucket_to_size(bucket: u32) -> usize {
        1usize << bucket
    }

    /// Allocation size for a request of `min_size` bytes (next power of 2)
    #[must_use]
    pub const fn allocation_size(min_size: usize) -> usize {
        if min_size == 0 {
            return 0;
        }
        Self::bucket_to_size(Self::size_to_bucket(min_size))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a pooled buffer of at least `min_size` bytes, if one is free
    pub fn acquire(&self, min_size: usize) -> Option<wgpu::Buffer> {
        if min_size > self.config.max_pooled_size {
            return None;
        }
        let bucket = Self::size_to_bucket(min_size);
        let mut state = self.lock();
        let buffer = state.buckets.get_mut(&bucket)?.pop_front()?;
        state.total = state.total.saturating_sub(1);
        Some(buffer)
    }

    /// Return a buffer for reuse
    ///
    /// Returns `false` (and drops the buffer) when it is too large or the pool
    /// is full.
    pub fn release(&self, buffer: wgpu::Buffer, size: usize) -> bool {
        if size > self.config.max_pooled_size {
            return false;
        }
        let bucket = Self::size_to_bucket(size);
        let mut state = self.lock();
        if state.total >= self.config.max_total_buffers {
            return false;
        }
        let queue = state.buckets.entry(bucket).or_default();
        if queue.len() >= self.config.max_buffers_per_bucket {
            return false;
        }
        queue.push_back(buffer);
        state.total += 1;
        true
    }

    /// Free every pooled buffer, returning how many were held
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let freed = state.total;
        state.buckets.clear();
        state.total = 0;
        freed
    }

    #[must_use]
    pub fn stats(&self) -> BufferPoolStats {
        let state = self.lock();
        let mut buckets: Vec<(usize, usize)> = state
            .buckets
            .iter()
            .map(|(&bucket, queue)| (Self::bucket_to_size(bucket), queue.len()))
            .collect();
        buckets.sort_unstable();
        BufferPoolStats {
            total_pooled: state.total,
            buckets,
        }
    }
}

/// Statistics about buffer pool usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Total number of buffers currently in the pool
    pub total_pooled: usize,
    /// `(bucket_size, count)` pairs, smallest bucket first
    pub buckets: Vec<(usize, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_to_bucket() {
        assert_eq!(BufferPool::size_to_bucket(1), 0);
        assert_eq!(BufferPool::size_to_bucket(4), 2);
        assert_eq!(BufferPool::size_to_bucket(3), 2);
        assert_eq!(BufferPool::size_to_bucket(5000), 13);
        assert_eq!(BufferPool::size_to_bucket(0), 0);
    }

    #[test]
    fn test_allocation_size() {
        assert_eq!(BufferPool::allocation_size(0), 0);
        assert_eq!(BufferPool::allocation_size(5), 8);
        assert_eq!(BufferPool::allocation_size(1000), 1024);
        // One 64³ complex64 volume
        assert_eq!(BufferPool::allocation_size(64 * 64 * 64 * 8), 2 * 1024 * 1024);
    }

    #[test]
    fn test_empty_pool() {
        let pool = BufferPool::new(BufferPoolConfig {
            max_buffers_per_bucket: 2,
            max_total_buffers: 4,
            max_pooled_size: 1024,
        });
        assert!(pool.acquire(2048).is_none());
        assert!(pool.acquire(16).is_none());
        assert_eq!(pool.clear(), 0);
        assert_eq!(pool.stats().total_pooled, 0);
    }
}
