//! The top-level context manager.

use std::sync::Arc;

use tracing::{debug, info};

use crate::buffers::BufferRegistry;
use crate::config::RunnerConfig;
use crate::diagnostics::{Diagnostics, DiagnosticsReporter, DiagnosticsSink, StdioSink};
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelArgs, KernelFactory, KernelFunctor};
use crate::program::{CompiledProgram, ProgramRegistry, ProgramSource};
use crate::queue_pool::QueuePool;
use crate::runtime::{ComputeRuntime, DeviceInfo, MemFlags};
use crate::selector::{DeviceSelector, MemoryBudget, SelectedDevices};

/// Owns one compute context over the best available device set and the
/// named programs, queues and buffers built on it.
///
/// Mutating operations take `&mut self`; share a runner across threads
/// behind a `Mutex`. Handles are returned as `Arc` clones and stay valid
/// after their registry entry is released.
pub struct Runner<R: ComputeRuntime> {
    // Field order is drop order: dependents go before the context.
    programs: ProgramRegistry<R>,
    queues: QueuePool<R>,
    buffers: BufferRegistry<R>,
    context: R::Context,
    selected: SelectedDevices<R>,
    diagnostics: Diagnostics,
    runtime: Arc<R>,
}

impl<R: ComputeRuntime> Runner<R> {
    /// Select devices and create the context, reporting to stdout/stderr.
    pub fn new(runtime: R, config: &RunnerConfig) -> Result<Self> {
        Self::with_sink(runtime, config, Arc::new(StdioSink))
    }

    pub fn with_sink(
        runtime: R,
        config: &RunnerConfig,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self> {
        Self::from_shared(Arc::new(runtime), config, sink)
    }

    /// Like [`Self::with_sink`] for a runtime that is already shared.
    pub fn from_shared(
        runtime: Arc<R>,
        config: &RunnerConfig,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self> {
        config.validate()?;
        let selector =
            DeviceSelector::new(runtime.as_ref(), config.device_type, config.requirement());
        let selected = selector.select()?;
        let context = runtime
            .create_context(selected.devices())
            .map_err(|s| Error::runtime("create context", s))?;
        info!(
            "Context created on {} ({} device{})",
            selected.platform_name(),
            selected.len(),
            if selected.len() > 1 { "s" } else { "" }
        );

        let buffers = BufferRegistry::new(selected.budget(), config.budget_policy);
        Ok(Self {
            programs: ProgramRegistry::new(),
            queues: QueuePool::new(),
            buffers,
            context,
            selected,
            diagnostics: Diagnostics::new(sink, config.verbose),
            runtime,
        })
    }

    // ── Programs ─────────────────────────────────────────────────────────────

    /// Compile a program for every selected device and register it.
    pub fn load_program(&mut self, source: &dyn ProgramSource) -> Result<Arc<CompiledProgram<R>>> {
        self.programs.load(&self.runtime, &self.context, &self.selected, source, &self.diagnostics)
    }

    /// Forget a program. Releasing an unknown name is a no-op.
    pub fn release_program(&mut self, name: &str) -> bool {
        self.programs.release(name)
    }

    pub fn program(&self, name: &str) -> Result<Arc<CompiledProgram<R>>> {
        self.programs.get(name)
    }

    pub fn programs(&self) -> &ProgramRegistry<R> {
        &self.programs
    }

    // ── Queues ───────────────────────────────────────────────────────────────

    /// Queues for devices `0..count`, created on first demand.
    pub fn command_queues(&mut self, count: usize) -> Result<Vec<Arc<R::Queue>>> {
        self.queues.acquire(&self.runtime, &self.context, self.selected.devices(), count)
    }

    pub fn release_queues(&mut self) {
        self.queues.release_all();
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    // ── Buffers ──────────────────────────────────────────────────────────────

    /// Allocate a named buffer. `host_data`, when given, is copied in and
    /// must cover `size` bytes.
    pub fn create_buffer(
        &mut self,
        name: &str,
        size: usize,
        flags: MemFlags,
        host_data: Option<&[u8]>,
    ) -> Result<Arc<R::Buffer>> {
        self.buffers.create(&self.runtime, &self.context, name, size, flags, host_data)
    }

    pub fn buffer(&self, name: &str) -> Result<Arc<R::Buffer>> {
        self.buffers.get(name)
    }

    /// Release a named buffer. Releasing an unknown name is a no-op.
    pub fn release_buffer(&mut self, name: &str) -> bool {
        self.buffers.release(name)
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.buffers.allocated_bytes()
    }

    pub fn buffers(&self) -> &BufferRegistry<R> {
        &self.buffers
    }

    // ── Kernels ──────────────────────────────────────────────────────────────

    fn kernel_factory(&self) -> KernelFactory<'_, R> {
        KernelFactory {
            runtime: &self.runtime,
            programs: &self.programs,
            devices: &self.selected,
            diagnostics: &self.diagnostics,
        }
    }

    /// Create a kernel from a loaded program. Its per-device work-group
    /// report is printed when verbose.
    pub fn make_kernel(&self, program: &str, kernel: &str) -> Result<Kernel<R>> {
        self.kernel_factory().make_kernel(program, kernel)
    }

    /// Create a kernel wrapped for typed invocation with argument tuple `A`.
    pub fn make_kernel_functor<A: KernelArgs<R>>(
        &self,
        program: &str,
        kernel: &str,
    ) -> Result<KernelFunctor<R, A>> {
        self.kernel_factory().make_kernel_functor(program, kernel)
    }

    // ── Devices and memory ───────────────────────────────────────────────────

    /// Smallest global memory size over the selected devices.
    pub fn total_memory(&self) -> u64 {
        self.selected.budget().total_memory
    }

    /// Smallest maximum single allocation over the selected devices.
    pub fn buffer_memory(&self) -> u64 {
        self.selected.budget().buffer_memory
    }

    pub fn memory_budget(&self) -> MemoryBudget {
        self.selected.budget()
    }

    pub fn devices(&self) -> &[R::Device] {
        self.selected.devices()
    }

    pub fn device_infos(&self) -> &[DeviceInfo] {
        self.selected.infos()
    }

    pub fn device_count(&self) -> usize {
        self.selected.len()
    }

    pub fn platform_name(&self) -> &str {
        self.selected.platform_name()
    }

    pub fn context(&self) -> &R::Context {
        &self.context
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    pub fn is_verbose(&self) -> bool {
        self.diagnostics.is_verbose()
    }

    // ── Diagnostics ──────────────────────────────────────────────────────────

    pub fn reporter(&self) -> DiagnosticsReporter<'_, R> {
        DiagnosticsReporter::new(self.runtime.as_ref(), Arc::clone(self.diagnostics.sink()))
    }

    /// Print the long-form block of every selected device. Returns how many
    /// were described.
    pub fn describe_devices(&self) -> usize {
        let reporter = self.reporter();
        let devices = self.selected.devices();
        let described = devices.iter().filter(|d| reporter.describe_device(d)).count();
        debug!("Described {described} of {} devices", self.selected.len());
        described
    }
}

impl<R: ComputeRuntime> std::fmt::Debug for Runner<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("selected", &self.selected)
            .field("programs", &self.programs.len())
            .field("queues", &self.queues.len())
            .field("buffers", &self.buffers.len())
            .field("allocated_bytes", &self.buffers.allocated_bytes())
            .finish_non_exhaustive()
    }
}
