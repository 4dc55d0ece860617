//! Named device buffers with aggregate byte accounting.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::BudgetPolicy;
use crate::error::{Error, Result};
use crate::runtime::{ComputeRuntime, MemFlags};
use crate::selector::MemoryBudget;

/// A registered buffer and the size it was created with.
pub struct BufferEntry<R: ComputeRuntime> {
    handle: Arc<R::Buffer>,
    size: u64,
    flags: MemFlags,
}

impl<R: ComputeRuntime> BufferEntry<R> {
    pub fn handle(&self) -> &Arc<R::Buffer> {
        &self.handle
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn flags(&self) -> MemFlags {
        self.flags
    }
}

/// Name-keyed buffers plus a running total of their sizes.
///
/// The total changes only on successful creation and on release of an
/// existing entry. Whether the [`MemoryBudget`] can refuse an allocation is
/// decided by the [`BudgetPolicy`].
pub struct BufferRegistry<R: ComputeRuntime> {
    buffers: HashMap<String, BufferEntry<R>>,
    allocated: u64,
    budget: MemoryBudget,
    policy: BudgetPolicy,
}

impl<R: ComputeRuntime> BufferRegistry<R> {
    pub fn new(budget: MemoryBudget, policy: BudgetPolicy) -> Self {
        Self { buffers: HashMap::new(), allocated: 0, budget, policy }
    }

    pub(crate) fn create(
        &mut self,
        runtime: &R,
        context: &R::Context,
        name: &str,
        size: usize,
        flags: MemFlags,
        host_data: Option<&[u8]>,
    ) -> Result<Arc<R::Buffer>> {
        if self.buffers.contains_key(name) {
            return Err(Error::DuplicateBufferName { name: name.to_owned() });
        }

        let requested = size as u64;
        self.check_budget(name, requested)?;

        let handle = Arc::new(
            runtime
                .create_buffer(context, flags, size, host_data)
                .map_err(|s| Error::runtime("create buffer", s))?,
        );
        self.allocated += requested;
        let entry = BufferEntry { handle: Arc::clone(&handle), size: requested, flags };
        self.buffers.insert(name.to_owned(), entry);
        debug!("Buffer {name} created ({requested} bytes, {} allocated)", self.allocated);
        Ok(handle)
    }

    fn check_budget(&self, name: &str, requested: u64) -> Result<()> {
        let single = requested > self.budget.buffer_memory;
        let total = self.allocated.saturating_add(requested) > self.budget.total_memory;
        if !single && !total {
            return Ok(());
        }

        let available = if single {
            self.budget.buffer_memory
        } else {
            self.budget.total_memory.saturating_sub(self.allocated)
        };
        match self.policy {
            BudgetPolicy::Enforce => {
                Err(Error::MemoryBudgetExceeded { name: name.to_owned(), requested, available })
            }
            BudgetPolicy::Track => {
                warn!(
                    "Buffer {name} exceeds memory budget \
                     ({requested} requested, {available} available)"
                );
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<R::Buffer>> {
        self.entry(name).map(|e| Arc::clone(&e.handle))
    }

    pub fn entry(&self, name: &str) -> Result<&BufferEntry<R>> {
        self.buffers.get(name).ok_or_else(|| Error::BufferNotFound { name: name.to_owned() })
    }

    /// Remove the entry if present. Returns whether anything was removed.
    pub fn release(&mut self, name: &str) -> bool {
        match self.buffers.remove(name) {
            Some(entry) => {
                self.allocated -= entry.size;
                debug!(
                    "Buffer {name} released ({} bytes, {} allocated)",
                    entry.size, self.allocated
                );
                true
            }
            None => false,
        }
    }

    /// Sum of the sizes of all registered buffers.
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated
    }

    pub fn budget(&self) -> MemoryBudget {
        self.budget
    }

    pub fn policy(&self) -> BudgetPolicy {
        self.policy
    }

    pub fn contains(&self, name: &str) -> bool {
        self.buffers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
