//! Compute context lifecycle management.
//!
//! This crate provides:
//! - [`selector`]: platform and device selection under extension requirements
//! - [`program`]: compile-once, name-keyed program cache with build logs
//! - [`queue_pool`]: lazily grown per-device command queues
//! - [`buffers`]: named buffers with allocated-byte accounting
//! - [`kernel`]: kernel creation and typed invocation
//! - [`diagnostics`]: human-readable platform, device and kernel reports
//! - [`runner`]: the [`Runner`] tying them together over one context
//!
//! The compute API sits behind the [`ComputeRuntime`] trait. [`MockRuntime`]
//! runs everything in-process; enable the `opencl` feature for
//! `OpenClRuntime`.

pub mod buffers;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod error_codes;
pub mod kernel;
pub mod mock;
pub mod program;
pub mod queue_pool;
pub mod runner;
pub mod runtime;
pub mod selector;

#[cfg(feature = "opencl")]
pub mod opencl;

// Re-exports for convenience.
pub use buffers::{BufferEntry, BufferRegistry};
pub use config::{BudgetPolicy, RunnerConfig};
pub use diagnostics::{
    DiagnosticsReporter, DiagnosticsSink, MemorySink, StdioSink, format_device_info,
    format_device_tree, format_kernel_info,
};
pub use error::{Error, Result};
pub use error_codes::{ClStatus, mnemonic};
pub use kernel::{Kernel, KernelArg, KernelArgs, KernelFunctor, LocalMem, Scalar};
pub use mock::MockRuntime;
pub use program::{BuildLog, CompiledProgram, ProgramDescriptor, ProgramRegistry, ProgramSource};
pub use queue_pool::QueuePool;
pub use runner::Runner;
pub use runtime::{
    AccessMode, ComputeRuntime, DeviceInfo, DeviceType, KernelWorkGroupInfo, MemFlags, NdRange,
};
pub use selector::{CapabilityRequirement, DeviceSelector, MemoryBudget, SelectedDevices};

#[cfg(feature = "opencl")]
pub use opencl::OpenClRuntime;
