//! [`ComputeRuntime`] over the system OpenCL ICD loader.
//!
//! Status codes from `opencl3` pass through unchanged as [`ClStatus`].

use std::ffi::{CString, c_void};
use std::ptr;

use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::{
    CL_DEVICE_TYPE_ACCELERATOR, CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_CPU, CL_DEVICE_TYPE_GPU, Device,
};
use opencl3::error_codes::ClError;
use opencl3::kernel::{CL_KERNEL_GLOBAL_WORK_SIZE, Kernel, get_kernel_work_group_info};
use opencl3::memory::{
    Buffer, CL_MEM_ALLOC_HOST_PTR, CL_MEM_COPY_HOST_PTR, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE,
    CL_MEM_WRITE_ONLY, ClMem,
};
use opencl3::platform::{Platform, get_platforms};
use opencl3::program::{Program, build_program};
use opencl3::types::{cl_device_id, cl_device_type, cl_mem_flags};
use tracing::trace;

use crate::error_codes::{CL_INVALID_BUILD_OPTIONS, CL_INVALID_HOST_PTR, ClStatus};
use crate::runtime::{
    AccessMode, ComputeRuntime, DeviceInfo, DeviceType, KernelWorkGroupInfo, MemFlags, NdRange,
    RuntimeResult,
};

fn status<E: Into<ClError>>(e: E) -> ClStatus {
    ClStatus(e.into().0)
}

fn device_type_bits(device_type: DeviceType) -> cl_device_type {
    match device_type {
        DeviceType::Gpu => CL_DEVICE_TYPE_GPU,
        DeviceType::Cpu => CL_DEVICE_TYPE_CPU,
        DeviceType::Accelerator => CL_DEVICE_TYPE_ACCELERATOR,
        DeviceType::All => CL_DEVICE_TYPE_ALL,
    }
}

fn mem_flag_bits(flags: MemFlags, copy_host: bool) -> cl_mem_flags {
    let mut bits = match flags.access {
        AccessMode::ReadOnly => CL_MEM_READ_ONLY,
        AccessMode::WriteOnly => CL_MEM_WRITE_ONLY,
        AccessMode::ReadWrite => CL_MEM_READ_WRITE,
    };
    if flags.alloc_host {
        bits |= CL_MEM_ALLOC_HOST_PTR;
    }
    if copy_host {
        bits |= CL_MEM_COPY_HOST_PTR;
    }
    bits
}

fn triple(v: &[usize]) -> [usize; 3] {
    let mut out = [0; 3];
    for (o, x) in out.iter_mut().zip(v) {
        *o = *x;
    }
    out
}

/// Build options cross the FFI boundary as a C string.
fn c_options(options: &str) -> RuntimeResult<CString> {
    CString::new(options).map_err(|_| ClStatus(CL_INVALID_BUILD_OPTIONS))
}

/// Major version out of a `CL_DEVICE_VERSION` string such as
/// `"OpenCL 3.0 CUDA"`. Zero when the string is malformed.
fn major_version(version: &str) -> u32 {
    version
        .strip_prefix("OpenCL ")
        .and_then(|rest| rest.split('.').next())
        .and_then(|major| major.trim().parse().ok())
        .unwrap_or(0)
}

/// The real OpenCL backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenClRuntime;

impl OpenClRuntime {
    pub fn new() -> Self {
        Self
    }
}

fn ids(devices: &[Device]) -> Vec<cl_device_id> {
    devices.iter().map(Device::id).collect()
}

impl ComputeRuntime for OpenClRuntime {
    type Platform = Platform;
    type Device = Device;
    type Context = Context;
    type Program = Program;
    type Queue = CommandQueue;
    type Buffer = Buffer<u8>;
    type Kernel = Kernel;

    fn platforms(&self) -> RuntimeResult<Vec<Platform>> {
        get_platforms().map_err(status)
    }

    fn platform_name(&self, platform: &Platform) -> RuntimeResult<String> {
        platform.name().map_err(status)
    }

    fn devices(&self, platform: &Platform, device_type: DeviceType) -> RuntimeResult<Vec<Device>> {
        let ids = platform.get_devices(device_type_bits(device_type)).map_err(status)?;
        Ok(ids.into_iter().map(Device::new).collect())
    }

    fn device_name(&self, device: &Device) -> RuntimeResult<String> {
        device.name().map_err(status)
    }

    fn device_info(&self, device: &Device) -> RuntimeResult<DeviceInfo> {
        Ok(DeviceInfo {
            name: device.name().map_err(status)?,
            driver_version: device.driver_version().map_err(status)?,
            extensions: device.extensions().map_err(status)?,
            global_mem_bytes: device.global_mem_size().map_err(status)?,
            local_mem_bytes: device.local_mem_size().map_err(status)?,
            max_constant_buffer_bytes: device.max_constant_buffer_size().map_err(status)?,
            max_mem_alloc_bytes: device.max_mem_alloc_size().map_err(status)?,
            max_clock_mhz: device.max_clock_frequency().map_err(status)?,
            max_compute_units: device.max_compute_units().map_err(status)?,
            max_work_group_size: device.max_work_group_size().map_err(status)?,
        })
    }

    fn create_context(&self, devices: &[Device]) -> RuntimeResult<Context> {
        Context::from_devices(&ids(devices), &[], None, ptr::null_mut()).map_err(status)
    }

    fn create_program(&self, context: &Context, source: &str) -> RuntimeResult<Program> {
        Program::create_from_source(context, source).map_err(status)
    }

    fn build_program(
        &self,
        program: &Program,
        devices: &[Device],
        options: &str,
    ) -> RuntimeResult<()> {
        let options = c_options(options)?;
        build_program(program.get(), &ids(devices), &options, None, ptr::null_mut())
            .map_err(status)
    }

    fn build_log(&self, program: &Program, device: &Device) -> RuntimeResult<String> {
        program.get_build_log(device.id()).map_err(status)
    }

    fn create_queue(&self, context: &Context, device: &Device) -> RuntimeResult<CommandQueue> {
        let version = device.version().map_err(status)?;
        if major_version(&version) >= 2 {
            // SAFETY: the device belongs to the context; no queue properties are requested.
            unsafe { CommandQueue::create_with_properties(context, device.id(), 0, 0) }
                .map_err(status)
        } else {
            // SAFETY: as above. 1.x devices lack clCreateCommandQueueWithProperties.
            #[allow(deprecated)]
            let queue = unsafe { CommandQueue::create(context, device.id(), 0) };
            queue.map_err(status)
        }
    }

    fn create_buffer(
        &self,
        context: &Context,
        flags: MemFlags,
        size: usize,
        host_data: Option<&[u8]>,
    ) -> RuntimeResult<Buffer<u8>> {
        let host_ptr = match host_data {
            Some(data) if data.len() < size => return Err(ClStatus(CL_INVALID_HOST_PTR)),
            Some(data) => data.as_ptr() as *mut c_void,
            None => ptr::null_mut(),
        };
        let bits = mem_flag_bits(flags, host_data.is_some());
        trace!(size, bits, "clCreateBuffer");
        // SAFETY: with CL_MEM_COPY_HOST_PTR the driver only reads `size`
        // bytes from `host_ptr` during the call, and `data` covers them.
        unsafe { Buffer::<u8>::create(context, bits, size, host_ptr) }.map_err(status)
    }

    fn create_kernel(&self, program: &Program, name: &str) -> RuntimeResult<Kernel> {
        Kernel::create(program, name).map_err(status)
    }

    fn kernel_work_group_info(
        &self,
        kernel: &Kernel,
        device: &Device,
    ) -> RuntimeResult<KernelWorkGroupInfo> {
        let id = device.id();
        // Only defined for custom devices and built-in kernels.
        let global_work_size =
            get_kernel_work_group_info(kernel.get(), id, CL_KERNEL_GLOBAL_WORK_SIZE).map(|info| {
                let sizes: Vec<usize> = info.into();
                triple(&sizes)
            });
        let global_work_size = global_work_size.unwrap_or_default();
        Ok(KernelWorkGroupInfo {
            compile_work_group_size: triple(
                &kernel.get_compile_work_group_size(id).map_err(status)?,
            ),
            global_work_size,
            local_mem_bytes: kernel.get_local_mem_size(id).map_err(status)?,
            private_mem_bytes: kernel.get_private_mem_size(id).map_err(status)?,
            preferred_work_group_size_multiple: kernel
                .get_work_group_size_multiple(id)
                .map_err(status)?,
            work_group_size: kernel.get_work_group_size(id).map_err(status)?,
        })
    }

    fn set_kernel_arg_buffer(
        &self,
        kernel: &Kernel,
        index: u32,
        buffer: &Buffer<u8>,
    ) -> RuntimeResult<()> {
        // SAFETY: the argument is a live cl_mem handle.
        unsafe { kernel.set_arg(index, &buffer.get()) }.map_err(status)
    }

    fn set_kernel_arg_scalar<T: Copy + 'static>(
        &self,
        kernel: &Kernel,
        index: u32,
        value: &T,
    ) -> RuntimeResult<()> {
        // SAFETY: `T` is plain data; the runtime checks its size against the parameter.
        unsafe { kernel.set_arg(index, value) }.map_err(status)
    }

    fn set_kernel_arg_local(
        &self,
        kernel: &Kernel,
        index: u32,
        bytes: usize,
    ) -> RuntimeResult<()> {
        // SAFETY: local memory arguments carry no host pointer.
        unsafe { kernel.set_arg_local_buffer(index, bytes) }.map_err(status)
    }

    fn enqueue_kernel(
        &self,
        queue: &CommandQueue,
        kernel: &Kernel,
        range: &NdRange,
    ) -> RuntimeResult<()> {
        let local = range.local().map_or(ptr::null(), <[usize]>::as_ptr);
        // SAFETY: the size arrays outlive the call and hold `dimensions()` entries.
        unsafe {
            queue.enqueue_nd_range_kernel(
                kernel.get(),
                range.dimensions(),
                ptr::null(),
                range.global().as_ptr(),
                local,
                &[],
            )
        }
        .map(drop)
        .map_err(status)
    }
}
