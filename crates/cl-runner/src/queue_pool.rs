//! Lazily grown pool of per-device command queues.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::runtime::ComputeRuntime;

/// One queue per device index, created on first demand.
///
/// The pool only grows. [`QueuePool::release_all`] empties it and the next
/// acquisition rebuilds from scratch. Queues created before a failed growth
/// step stay pooled.
pub struct QueuePool<R: ComputeRuntime> {
    queues: Vec<Arc<R::Queue>>,
}

impl<R: ComputeRuntime> Default for QueuePool<R> {
    fn default() -> Self {
        Self { queues: Vec::new() }
    }
}

impl<R: ComputeRuntime> QueuePool<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return handles to the queues of devices `0..count`, growing the pool
    /// as needed.
    pub(crate) fn acquire(
        &mut self,
        runtime: &R,
        context: &R::Context,
        devices: &[R::Device],
        count: usize,
    ) -> Result<Vec<Arc<R::Queue>>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        if self.queues.len() < count {
            let target = count.min(devices.len());
            self.queues.reserve(target.saturating_sub(self.queues.len()));
            for (index, device) in devices.iter().enumerate().take(target).skip(self.queues.len()) {
                let queue = runtime
                    .create_queue(context, device)
                    .map_err(|status| Error::QueueCreationFailed { device_index: index, status })?;
                self.queues.push(Arc::new(queue));
            }
            debug!("Queue pool grown to {} queue(s)", self.queues.len());

            if self.queues.len() < count {
                let available = self.queues.len();
                return Err(Error::InsufficientQueues { requested: count, available });
            }
        }

        Ok(self.queues[..count].to_vec())
    }

    /// Drop every pooled queue.
    pub fn release_all(&mut self) {
        if !self.queues.is_empty() {
            debug!("Releasing {} queue(s)", self.queues.len());
        }
        self.queues.clear();
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
