//! The compute runtime seam.
//!
//! [`ComputeRuntime`] is the narrow interface the registries use to reach the
//! underlying compute API. It is abstracted so the whole lifecycle can be
//! exercised without GPU hardware (see [`crate::mock::MockRuntime`]); the
//! `opencl` feature provides the real implementation.
//!
//! All fallible calls return a raw [`ClStatus`]. Translation into
//! [`crate::Error`] happens in the callers, never here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error_codes::ClStatus;

/// Result of a single runtime call.
pub type RuntimeResult<T> = std::result::Result<T, ClStatus>;

// ── Device class ─────────────────────────────────────────────────────────────

/// Device class used to filter platform enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Gpu,
    Cpu,
    Accelerator,
    All,
}

impl DeviceType {
    /// Whether a device of class `actual` is matched by this filter.
    pub fn matches(self, actual: DeviceType) -> bool {
        self == DeviceType::All || self == actual
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Gpu => write!(f, "GPU"),
            DeviceType::Cpu => write!(f, "CPU"),
            DeviceType::Accelerator => write!(f, "accelerator"),
            DeviceType::All => write!(f, "any"),
        }
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpu" => Ok(DeviceType::Gpu),
            "cpu" => Ok(DeviceType::Cpu),
            "accelerator" | "accel" => Ok(DeviceType::Accelerator),
            "all" | "any" => Ok(DeviceType::All),
            other => Err(format!("unknown device type '{other}'")),
        }
    }
}

// ── Device description ───────────────────────────────────────────────────────

/// Static properties of one device, queried once per selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub name: String,
    /// Driver / API version string.
    pub driver_version: String,
    /// Space separated extension list.
    pub extensions: String,
    pub global_mem_bytes: u64,
    pub local_mem_bytes: u64,
    pub max_constant_buffer_bytes: u64,
    /// Largest single allocation the device accepts.
    pub max_mem_alloc_bytes: u64,
    pub max_clock_mhz: u32,
    pub max_compute_units: u32,
    pub max_work_group_size: usize,
}

impl DeviceInfo {
    /// True when every token occurs as a substring of the extension list.
    pub fn has_extensions<S: AsRef<str>>(&self, tokens: &[S]) -> bool {
        tokens.iter().all(|t| self.extensions.contains(t.as_ref()))
    }
}

/// Per-device resource metadata of a built kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KernelWorkGroupInfo {
    pub compile_work_group_size: [usize; 3],
    pub global_work_size: [usize; 3],
    pub local_mem_bytes: u64,
    pub private_mem_bytes: u64,
    pub preferred_work_group_size_multiple: usize,
    pub work_group_size: usize,
}

// ── Memory flags ─────────────────────────────────────────────────────────────

/// Kernel-side access mode of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

/// Allocation flags for [`ComputeRuntime::create_buffer`].
///
/// Host data passed at creation time is always copied into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemFlags {
    pub access: AccessMode,
    /// Ask the driver for host-accessible backing memory.
    pub alloc_host: bool,
}

impl MemFlags {
    pub const READ_ONLY: Self = Self { access: AccessMode::ReadOnly, alloc_host: false };
    pub const WRITE_ONLY: Self = Self { access: AccessMode::WriteOnly, alloc_host: false };
    pub const READ_WRITE: Self = Self { access: AccessMode::ReadWrite, alloc_host: false };

    #[must_use]
    pub const fn with_alloc_host(mut self) -> Self {
        self.alloc_host = true;
        self
    }
}

// ── Launch shape ─────────────────────────────────────────────────────────────

/// Global and optional local work sizes of one kernel launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdRange {
    global: Vec<usize>,
    local: Option<Vec<usize>>,
}

impl NdRange {
    pub fn linear(global: usize) -> Self {
        Self { global: vec![global], local: None }
    }

    pub fn grid2(x: usize, y: usize) -> Self {
        Self { global: vec![x, y], local: None }
    }

    pub fn grid3(x: usize, y: usize, z: usize) -> Self {
        Self { global: vec![x, y, z], local: None }
    }

    #[must_use]
    pub fn with_local(mut self, local: &[usize]) -> Self {
        self.local = Some(local.to_vec());
        self
    }

    pub fn dimensions(&self) -> u32 {
        self.global.len() as u32
    }

    pub fn global(&self) -> &[usize] {
        &self.global
    }

    pub fn local(&self) -> Option<&[usize]> {
        self.local.as_deref()
    }
}

// ── The seam ─────────────────────────────────────────────────────────────────

/// Capability provider behind the runner.
///
/// Handles are opaque to the registries. The runner keeps programs, queues
/// and buffers behind `Arc`, so handle types need not be `Clone`; platforms
/// and devices are referenced from several places and must be.
pub trait ComputeRuntime {
    type Platform: Clone;
    type Device: Clone;
    type Context;
    type Program;
    type Queue;
    type Buffer;
    type Kernel;

    // Enumeration

    fn platforms(&self) -> RuntimeResult<Vec<Self::Platform>>;

    fn platform_name(&self, platform: &Self::Platform) -> RuntimeResult<String>;

    fn devices(
        &self,
        platform: &Self::Platform,
        device_type: DeviceType,
    ) -> RuntimeResult<Vec<Self::Device>>;

    fn device_info(&self, device: &Self::Device) -> RuntimeResult<DeviceInfo>;

    /// Name only. Succeeds on devices whose full info query fails.
    fn device_name(&self, device: &Self::Device) -> RuntimeResult<String>;

    // Construction

    fn create_context(&self, devices: &[Self::Device]) -> RuntimeResult<Self::Context>;

    fn create_program(&self, context: &Self::Context, source: &str)
    -> RuntimeResult<Self::Program>;

    fn build_program(
        &self,
        program: &Self::Program,
        devices: &[Self::Device],
        options: &str,
    ) -> RuntimeResult<()>;

    fn build_log(&self, program: &Self::Program, device: &Self::Device) -> RuntimeResult<String>;

    fn create_queue(&self, context: &Self::Context, device: &Self::Device)
    -> RuntimeResult<Self::Queue>;

    /// Allocate `size` bytes. `host_data`, when given, must hold at least
    /// `size` bytes and is copied into the new buffer.
    fn create_buffer(
        &self,
        context: &Self::Context,
        flags: MemFlags,
        size: usize,
        host_data: Option<&[u8]>,
    ) -> RuntimeResult<Self::Buffer>;

    fn create_kernel(&self, program: &Self::Program, name: &str) -> RuntimeResult<Self::Kernel>;

    fn kernel_work_group_info(
        &self,
        kernel: &Self::Kernel,
        device: &Self::Device,
    ) -> RuntimeResult<KernelWorkGroupInfo>;

    // Invocation

    fn set_kernel_arg_buffer(
        &self,
        kernel: &Self::Kernel,
        index: u32,
        buffer: &Self::Buffer,
    ) -> RuntimeResult<()>;

    fn set_kernel_arg_scalar<T: Copy + 'static>(
        &self,
        kernel: &Self::Kernel,
        index: u32,
        value: &T,
    ) -> RuntimeResult<()>;

    fn set_kernel_arg_local(&self, kernel: &Self::Kernel, index: u32, bytes: usize)
    -> RuntimeResult<()>;

    fn enqueue_kernel(
        &self,
        queue: &Self::Queue,
        kernel: &Self::Kernel,
        range: &NdRange,
    ) -> RuntimeResult<()>;
}
