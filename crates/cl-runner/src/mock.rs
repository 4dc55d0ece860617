//! In-process compute runtime for tests and host-only development.
//!
//! [`MockRuntime`] models platforms, devices, programs, queues, buffers and
//! kernels closely enough to drive every registry path without a driver:
//!
//! - every created object gets a unique id, so identity is observable;
//! - a program fails to build when its source contains `#error`; the rest of
//!   that line becomes the build log of every device. `#warning` builds but
//!   leaves a log behind;
//! - kernels are discovered by scanning for `__kernel void name(params)` and
//!   their parameter count is enforced when arguments are set and launched;
//! - queue creation and device enumeration failures can be injected.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::trace;

use crate::error_codes::{
    CL_BUILD_PROGRAM_FAILURE, CL_DEVICE_NOT_FOUND, CL_INVALID_ARG_INDEX, CL_INVALID_ARG_SIZE,
    CL_INVALID_BUFFER_SIZE, CL_INVALID_DEVICE, CL_INVALID_HOST_PTR, CL_INVALID_KERNEL_ARGS,
    CL_INVALID_KERNEL_NAME, CL_INVALID_PLATFORM, CL_INVALID_PROGRAM_EXECUTABLE, CL_INVALID_VALUE,
    CL_INVALID_WORK_DIMENSION, CL_INVALID_WORK_GROUP_SIZE, CL_OUT_OF_RESOURCES, ClStatus,
};
use crate::runtime::{
    ComputeRuntime, DeviceInfo, DeviceType, KernelWorkGroupInfo, MemFlags, NdRange, RuntimeResult,
};

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * MB;

// ── Builders ─────────────────────────────────────────────────────────────────

/// Description of one mock device.
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    pub device_type: DeviceType,
    pub info: DeviceInfo,
}

impl DeviceSpec {
    /// A mid-range GPU: 8 GB global memory, 2 GB max allocation, 64 KB local
    /// memory, 32 compute units.
    pub fn gpu(name: &str) -> Self {
        Self {
            device_type: DeviceType::Gpu,
            info: DeviceInfo {
                name: name.to_owned(),
                driver_version: "OpenCL 3.0 mock".into(),
                extensions: "cl_khr_global_int32_base_atomics cl_khr_fp16 cl_khr_fp64".into(),
                global_mem_bytes: 8 * GB,
                local_mem_bytes: 64 * 1024,
                max_constant_buffer_bytes: 64 * 1024,
                max_mem_alloc_bytes: 2 * GB,
                max_clock_mhz: 1500,
                max_compute_units: 32,
                max_work_group_size: 1024,
            },
        }
    }

    /// A host CPU device: 16 GB global memory, 4 GB max allocation.
    pub fn cpu(name: &str) -> Self {
        Self {
            device_type: DeviceType::Cpu,
            info: DeviceInfo {
                name: name.to_owned(),
                driver_version: "OpenCL 3.0 mock".into(),
                extensions: "cl_khr_global_int32_base_atomics cl_khr_fp64".into(),
                global_mem_bytes: 16 * GB,
                local_mem_bytes: 32 * 1024,
                max_constant_buffer_bytes: 128 * 1024,
                max_mem_alloc_bytes: 4 * GB,
                max_clock_mhz: 3000,
                max_compute_units: 8,
                max_work_group_size: 8192,
            },
        }
    }

    #[must_use]
    pub fn with_extensions(mut self, extensions: &str) -> Self {
        self.info.extensions = extensions.to_owned();
        self
    }

    #[must_use]
    pub fn with_memory(mut self, global_mem_bytes: u64, max_mem_alloc_bytes: u64) -> Self {
        self.info.global_mem_bytes = global_mem_bytes;
        self.info.max_mem_alloc_bytes = max_mem_alloc_bytes;
        self
    }
}

/// Description of one mock platform.
#[derive(Debug, Clone)]
pub struct PlatformSpec {
    pub name: String,
    pub devices: Vec<DeviceSpec>,
}

impl PlatformSpec {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_owned(), devices: Vec::new() }
    }

    #[must_use]
    pub fn with_device(mut self, device: DeviceSpec) -> Self {
        self.devices.push(device);
        self
    }
}

// ── Handles ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockPlatform {
    index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockDevice {
    platform: usize,
    slot: usize,
}

#[derive(Debug)]
pub struct MockContext {
    id: u64,
    devices: Vec<MockDevice>,
}

impl MockContext {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug)]
pub struct MockProgram {
    id: u64,
    source: String,
    kernels: HashMap<String, usize>,
    build_attempted: Mutex<bool>,
    built: Mutex<bool>,
}

impl MockProgram {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[derive(Debug)]
pub struct MockQueue {
    id: u64,
    device: MockDevice,
    launches: AtomicUsize,
}

impl MockQueue {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device(&self) -> MockDevice {
        self.device
    }

    /// Kernels enqueued on this queue.
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct MockBuffer {
    id: u64,
    size: usize,
    flags: MemFlags,
    contents: Vec<u8>,
}

impl MockBuffer {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn flags(&self) -> MemFlags {
        self.flags
    }

    /// Host bytes copied in at creation; empty when none were given.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }
}

/// What was bound to one kernel argument slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockArg {
    Buffer(u64),
    Scalar(usize),
    Local(usize),
}

#[derive(Debug)]
pub struct MockKernel {
    id: u64,
    name: String,
    args: Mutex<Vec<Option<MockArg>>>,
}

impl MockKernel {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arg(&self, index: usize) -> Option<MockArg> {
        lock(&self.args).get(index).cloned().flatten()
    }
}

// ── Runtime ──────────────────────────────────────────────────────────────────

/// Deterministic [`ComputeRuntime`] backed by plain data.
#[derive(Debug)]
pub struct MockRuntime {
    platforms: Vec<PlatformSpec>,
    next_id: AtomicU64,
    failing_platforms: Mutex<HashSet<usize>>,
    failing_device_names: Mutex<HashSet<String>>,
    failing_name_queries: Mutex<HashSet<String>>,
    queue_allowance: Mutex<Option<usize>>,
    queues_created: AtomicUsize,
    programs_built: AtomicUsize,
    kernels_enqueued: AtomicUsize,
}

impl MockRuntime {
    pub fn new(platforms: Vec<PlatformSpec>) -> Self {
        Self {
            platforms,
            next_id: AtomicU64::new(1),
            failing_platforms: Mutex::new(HashSet::new()),
            failing_device_names: Mutex::new(HashSet::new()),
            failing_name_queries: Mutex::new(HashSet::new()),
            queue_allowance: Mutex::new(None),
            queues_created: AtomicUsize::new(0),
            programs_built: AtomicUsize::new(0),
            kernels_enqueued: AtomicUsize::new(0),
        }
    }

    /// One platform exposing `count` identical GPUs named `Mock GPU <i>`.
    pub fn with_gpus(count: usize) -> Self {
        let platform = (0..count).fold(PlatformSpec::new("Mock Platform"), |p, i| {
            p.with_device(DeviceSpec::gpu(&format!("Mock GPU {i}")))
        });
        Self::new(vec![platform])
    }

    /// Make device enumeration of the platform at `index` fail.
    pub fn fail_device_enumeration(&self, index: usize) {
        lock(&self.failing_platforms).insert(index);
    }

    /// Make info queries for the named device fail.
    pub fn fail_device_info(&self, name: &str) {
        lock(&self.failing_device_names).insert(name.to_owned());
    }

    /// Make every query for the named device fail, the name included.
    pub fn fail_device_name(&self, name: &str) {
        lock(&self.failing_name_queries).insert(name.to_owned());
        self.fail_device_info(name);
    }

    /// Allow only `n` more queue creations; later ones fail with
    /// `CL_OUT_OF_RESOURCES`.
    pub fn limit_queue_creations(&self, n: usize) {
        *lock(&self.queue_allowance) = Some(n);
    }

    pub fn clear_queue_limit(&self) {
        *lock(&self.queue_allowance) = None;
    }

    pub fn queues_created(&self) -> usize {
        self.queues_created.load(Ordering::Relaxed)
    }

    pub fn programs_built(&self) -> usize {
        self.programs_built.load(Ordering::Relaxed)
    }

    pub fn kernels_enqueued(&self) -> usize {
        self.kernels_enqueued.load(Ordering::Relaxed)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn spec(&self, device: &MockDevice) -> RuntimeResult<&DeviceSpec> {
        self.platforms
            .get(device.platform)
            .and_then(|p| p.devices.get(device.slot))
            .ok_or(ClStatus(CL_INVALID_DEVICE))
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Find `__kernel void name(params)` declarations and count parameters.
fn scan_kernels(source: &str) -> HashMap<String, usize> {
    let mut kernels = HashMap::new();
    let mut rest = source;
    while let Some(pos) = rest.find("__kernel") {
        rest = &rest[pos + "__kernel".len()..];
        let Some(open) = rest.find('(') else { break };
        let Some(close) = rest[open..].find(')') else { break };
        let signature = rest[..open].trim();
        let Some(name) = signature.split_whitespace().last() else { continue };
        let params = rest[open + 1..open + close].trim();
        let count = if params.is_empty() || params == "void" {
            0
        } else {
            params.split(',').count()
        };
        kernels.insert(name.to_owned(), count);
        rest = &rest[open + close..];
    }
    kernels
}

/// Text following `marker` up to the end of its line.
fn marker_text<'a>(source: &'a str, marker: &str) -> Option<&'a str> {
    let start = source.find(marker)? + marker.len();
    Some(source[start..].lines().next().unwrap_or("").trim())
}

impl ComputeRuntime for MockRuntime {
    type Platform = MockPlatform;
    type Device = MockDevice;
    type Context = MockContext;
    type Program = MockProgram;
    type Queue = MockQueue;
    type Buffer = MockBuffer;
    type Kernel = MockKernel;

    fn platforms(&self) -> RuntimeResult<Vec<MockPlatform>> {
        Ok((0..self.platforms.len()).map(|index| MockPlatform { index }).collect())
    }

    fn platform_name(&self, platform: &MockPlatform) -> RuntimeResult<String> {
        self.platforms
            .get(platform.index)
            .map(|p| p.name.clone())
            .ok_or(ClStatus(CL_INVALID_PLATFORM))
    }

    fn devices(
        &self,
        platform: &MockPlatform,
        device_type: DeviceType,
    ) -> RuntimeResult<Vec<MockDevice>> {
        if lock(&self.failing_platforms).contains(&platform.index) {
            return Err(ClStatus(CL_INVALID_PLATFORM));
        }
        let spec = self.platforms.get(platform.index).ok_or(ClStatus(CL_INVALID_PLATFORM))?;
        let devices: Vec<MockDevice> = spec
            .devices
            .iter()
            .enumerate()
            .filter(|(_, d)| device_type.matches(d.device_type))
            .map(|(slot, _)| MockDevice { platform: platform.index, slot })
            .collect();
        // Matches the ICD loader, which reports an empty class as an error.
        if devices.is_empty() {
            return Err(ClStatus(CL_DEVICE_NOT_FOUND));
        }
        Ok(devices)
    }

    fn device_info(&self, device: &MockDevice) -> RuntimeResult<DeviceInfo> {
        let spec = self.spec(device)?;
        if lock(&self.failing_device_names).contains(&spec.info.name) {
            return Err(ClStatus(CL_INVALID_DEVICE));
        }
        Ok(spec.info.clone())
    }

    fn device_name(&self, device: &MockDevice) -> RuntimeResult<String> {
        let spec = self.spec(device)?;
        if lock(&self.failing_name_queries).contains(&spec.info.name) {
            return Err(ClStatus(CL_INVALID_DEVICE));
        }
        Ok(spec.info.name.clone())
    }

    fn create_context(&self, devices: &[MockDevice]) -> RuntimeResult<MockContext> {
        if devices.is_empty() {
            return Err(ClStatus(CL_INVALID_VALUE));
        }
        for d in devices {
            self.spec(d)?;
        }
        Ok(MockContext { id: self.next_id(), devices: devices.to_vec() })
    }

    fn create_program(&self, _context: &MockContext, source: &str) -> RuntimeResult<MockProgram> {
        if source.is_empty() {
            return Err(ClStatus(CL_INVALID_VALUE));
        }
        Ok(MockProgram {
            id: self.next_id(),
            source: source.to_owned(),
            kernels: scan_kernels(source),
            build_attempted: Mutex::new(false),
            built: Mutex::new(false),
        })
    }

    fn build_program(
        &self,
        program: &MockProgram,
        devices: &[MockDevice],
        _options: &str,
    ) -> RuntimeResult<()> {
        if devices.is_empty() {
            return Err(ClStatus(CL_INVALID_VALUE));
        }
        *lock(&program.build_attempted) = true;
        if marker_text(&program.source, "#error").is_some() {
            trace!(program = program.id, "mock build failure");
            return Err(ClStatus(CL_BUILD_PROGRAM_FAILURE));
        }
        *lock(&program.built) = true;
        self.programs_built.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn build_log(&self, program: &MockProgram, device: &MockDevice) -> RuntimeResult<String> {
        let spec = self.spec(device)?;
        if !*lock(&program.build_attempted) {
            return Ok(String::new());
        }
        let log = marker_text(&program.source, "#error")
            .map(|msg| format!("{}: error: {msg}", spec.info.name))
            .or_else(|| {
                marker_text(&program.source, "#warning")
                    .map(|msg| format!("{}: warning: {msg}", spec.info.name))
            })
            .unwrap_or_default();
        Ok(log)
    }

    fn create_queue(&self, context: &MockContext, device: &MockDevice) -> RuntimeResult<MockQueue> {
        if !context.devices.contains(device) {
            return Err(ClStatus(CL_INVALID_DEVICE));
        }
        {
            let mut allowance = lock(&self.queue_allowance);
            if let Some(left) = allowance.as_mut() {
                if *left == 0 {
                    return Err(ClStatus(CL_OUT_OF_RESOURCES));
                }
                *left -= 1;
            }
        }
        self.queues_created.fetch_add(1, Ordering::Relaxed);
        Ok(MockQueue { id: self.next_id(), device: *device, launches: AtomicUsize::new(0) })
    }

    fn create_buffer(
        &self,
        context: &MockContext,
        flags: MemFlags,
        size: usize,
        host_data: Option<&[u8]>,
    ) -> RuntimeResult<MockBuffer> {
        if size == 0 {
            return Err(ClStatus(CL_INVALID_BUFFER_SIZE));
        }
        let mut max_alloc = u64::MAX;
        for d in &context.devices {
            max_alloc = max_alloc.min(self.spec(d)?.info.max_mem_alloc_bytes);
        }
        if size as u64 > max_alloc {
            return Err(ClStatus(CL_INVALID_BUFFER_SIZE));
        }
        let contents = match host_data {
            Some(data) if data.len() < size => return Err(ClStatus(CL_INVALID_HOST_PTR)),
            Some(data) => data[..size].to_vec(),
            None => Vec::new(),
        };
        Ok(MockBuffer { id: self.next_id(), size, flags, contents })
    }

    fn create_kernel(&self, program: &MockProgram, name: &str) -> RuntimeResult<MockKernel> {
        if !*lock(&program.built) {
            return Err(ClStatus(CL_INVALID_PROGRAM_EXECUTABLE));
        }
        let params = *program.kernels.get(name).ok_or(ClStatus(CL_INVALID_KERNEL_NAME))?;
        Ok(MockKernel {
            id: self.next_id(),
            name: name.to_owned(),
            args: Mutex::new(vec![None; params]),
        })
    }

    fn kernel_work_group_info(
        &self,
        _kernel: &MockKernel,
        device: &MockDevice,
    ) -> RuntimeResult<KernelWorkGroupInfo> {
        let spec = self.spec(device)?;
        let multiple = if spec.device_type == DeviceType::Cpu { 1 } else { 32 };
        Ok(KernelWorkGroupInfo {
            compile_work_group_size: [0, 0, 0],
            global_work_size: [0, 0, 0],
            local_mem_bytes: 0,
            private_mem_bytes: 0,
            preferred_work_group_size_multiple: multiple,
            work_group_size: spec.info.max_work_group_size,
        })
    }

    fn set_kernel_arg_buffer(
        &self,
        kernel: &MockKernel,
        index: u32,
        buffer: &MockBuffer,
    ) -> RuntimeResult<()> {
        bind(kernel, index, MockArg::Buffer(buffer.id))
    }

    fn set_kernel_arg_scalar<T: Copy + 'static>(
        &self,
        kernel: &MockKernel,
        index: u32,
        _value: &T,
    ) -> RuntimeResult<()> {
        let size = std::mem::size_of::<T>();
        if size == 0 {
            return Err(ClStatus(CL_INVALID_ARG_SIZE));
        }
        bind(kernel, index, MockArg::Scalar(size))
    }

    fn set_kernel_arg_local(
        &self,
        kernel: &MockKernel,
        index: u32,
        bytes: usize,
    ) -> RuntimeResult<()> {
        if bytes == 0 {
            return Err(ClStatus(CL_INVALID_ARG_SIZE));
        }
        bind(kernel, index, MockArg::Local(bytes))
    }

    fn enqueue_kernel(
        &self,
        queue: &MockQueue,
        kernel: &MockKernel,
        range: &NdRange,
    ) -> RuntimeResult<()> {
        if !(1..=3).contains(&range.dimensions()) {
            return Err(ClStatus(CL_INVALID_WORK_DIMENSION));
        }
        if let Some(local) = range.local() {
            let fits = local.len() == range.global().len()
                && local.iter().zip(range.global()).all(|(l, g)| *l > 0 && g % l == 0);
            if !fits {
                return Err(ClStatus(CL_INVALID_WORK_GROUP_SIZE));
            }
        }
        if lock(&kernel.args).iter().any(Option::is_none) {
            return Err(ClStatus(CL_INVALID_KERNEL_ARGS));
        }
        queue.launches.fetch_add(1, Ordering::Relaxed);
        self.kernels_enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn bind(kernel: &MockKernel, index: u32, arg: MockArg) -> RuntimeResult<()> {
    let mut args = lock(&kernel.args);
    let slot = args.get_mut(index as usize).ok_or(ClStatus(CL_INVALID_ARG_INDEX))?;
    *slot = Some(arg);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAXPY: &str = "__kernel void saxpy(__global float* x, __global float* y, float a) {}\n\
                         __kernel void zero(void) {}";

    fn runtime_with_context() -> (MockRuntime, MockContext) {
        let rt = MockRuntime::with_gpus(2);
        let platform = rt.platforms().unwrap()[0];
        let devices = rt.devices(&platform, DeviceType::Gpu).unwrap();
        let ctx = rt.create_context(&devices).unwrap();
        (rt, ctx)
    }

    #[test]
    fn scan_finds_kernels_and_param_counts() {
        let kernels = scan_kernels(SAXPY);
        assert_eq!(kernels.get("saxpy"), Some(&3));
        assert_eq!(kernels.get("zero"), Some(&0));
        assert_eq!(kernels.len(), 2);
    }

    #[test]
    fn device_class_filter() {
        let rt = MockRuntime::new(vec![
            PlatformSpec::new("mixed")
                .with_device(DeviceSpec::cpu("host"))
                .with_device(DeviceSpec::gpu("card")),
        ]);
        let p = rt.platforms().unwrap()[0];
        assert_eq!(rt.devices(&p, DeviceType::Gpu).unwrap().len(), 1);
        assert_eq!(rt.devices(&p, DeviceType::All).unwrap().len(), 2);
        assert_eq!(rt.devices(&p, DeviceType::Accelerator), Err(ClStatus(CL_DEVICE_NOT_FOUND)));
    }

    #[test]
    fn ids_are_unique() {
        let (rt, ctx) = runtime_with_context();
        let d = ctx.devices[0];
        let q1 = rt.create_queue(&ctx, &d).unwrap();
        let q2 = rt.create_queue(&ctx, &d).unwrap();
        assert_ne!(q1.id(), q2.id());
        assert_eq!(rt.queues_created(), 2);
    }

    #[test]
    fn error_marker_fails_build_with_log() {
        let (rt, ctx) = runtime_with_context();
        let program = rt.create_program(&ctx, "#error missing semicolon\n").unwrap();
        assert_eq!(rt.build_log(&program, &ctx.devices[0]).unwrap(), "");
        let err = rt.build_program(&program, &ctx.devices, "").unwrap_err();
        assert_eq!(err, ClStatus(CL_BUILD_PROGRAM_FAILURE));
        let log = rt.build_log(&program, &ctx.devices[1]).unwrap();
        assert_eq!(log, "Mock GPU 1: error: missing semicolon");
    }

    #[test]
    fn kernel_requires_built_program_and_known_name() {
        let (rt, ctx) = runtime_with_context();
        let program = rt.create_program(&ctx, SAXPY).unwrap();
        assert!(rt.create_kernel(&program, "saxpy").is_err());
        rt.build_program(&program, &ctx.devices, "-cl-fast-relaxed-math").unwrap();
        assert!(rt.create_kernel(&program, "saxpy").is_ok());
        let err = rt.create_kernel(&program, "nope").unwrap_err();
        assert_eq!(err, ClStatus(CL_INVALID_KERNEL_NAME));
    }

    #[test]
    fn enqueue_checks_arguments() {
        let (rt, ctx) = runtime_with_context();
        let program = rt.create_program(&ctx, SAXPY).unwrap();
        rt.build_program(&program, &ctx.devices, "").unwrap();
        let kernel = rt.create_kernel(&program, "saxpy").unwrap();
        let queue = rt.create_queue(&ctx, &ctx.devices[0]).unwrap();
        let buf = rt.create_buffer(&ctx, MemFlags::READ_WRITE, 64, None).unwrap();

        rt.set_kernel_arg_buffer(&kernel, 0, &buf).unwrap();
        assert_eq!(
            rt.enqueue_kernel(&queue, &kernel, &NdRange::linear(16)),
            Err(ClStatus(CL_INVALID_KERNEL_ARGS))
        );
        rt.set_kernel_arg_buffer(&kernel, 1, &buf).unwrap();
        rt.set_kernel_arg_scalar(&kernel, 2, &2.0_f32).unwrap();
        let extra = rt.set_kernel_arg_scalar(&kernel, 3, &1_u32);
        assert_eq!(extra, Err(ClStatus(CL_INVALID_ARG_INDEX)));
        rt.enqueue_kernel(&queue, &kernel, &NdRange::linear(16)).unwrap();
        assert_eq!(queue.launches(), 1);
        assert_eq!(kernel.arg(2), Some(MockArg::Scalar(4)));
    }

    #[test]
    fn buffer_limits() {
        let (rt, ctx) = runtime_with_context();
        assert_eq!(
            rt.create_buffer(&ctx, MemFlags::READ_ONLY, 0, None).unwrap_err(),
            ClStatus(CL_INVALID_BUFFER_SIZE)
        );
        assert_eq!(
            rt.create_buffer(&ctx, MemFlags::READ_ONLY, (3 * GB) as usize, None).unwrap_err(),
            ClStatus(CL_INVALID_BUFFER_SIZE)
        );
        assert_eq!(
            rt.create_buffer(&ctx, MemFlags::READ_ONLY, 8, Some(&[1, 2, 3][..])).unwrap_err(),
            ClStatus(CL_INVALID_HOST_PTR)
        );
        let buf = rt.create_buffer(&ctx, MemFlags::READ_ONLY, 3, Some(&[1, 2, 3, 4][..])).unwrap();
        assert_eq!(buf.contents(), &[1, 2, 3]);
    }

    #[test]
    fn queue_limit_injection() {
        let (rt, ctx) = runtime_with_context();
        rt.limit_queue_creations(1);
        assert!(rt.create_queue(&ctx, &ctx.devices[0]).is_ok());
        assert_eq!(
            rt.create_queue(&ctx, &ctx.devices[1]).unwrap_err(),
            ClStatus(CL_OUT_OF_RESOURCES)
        );
        rt.clear_queue_limit();
        assert!(rt.create_queue(&ctx, &ctx.devices[1]).is_ok());
    }
}
