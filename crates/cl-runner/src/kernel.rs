//! Kernel handles and typed invocation.
//!
//! [`KernelFactory`] resolves a loaded program and creates a named kernel in
//! it. [`KernelFunctor`] pairs a kernel with a fixed argument tuple type so a
//! launch is a single `call`.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::diagnostics::{Diagnostics, format_kernel_info};
use crate::error::{Error, Result};
use crate::error_codes::CL_INVALID_KERNEL_NAME;
use crate::program::ProgramRegistry;
use crate::runtime::{ComputeRuntime, NdRange, RuntimeResult};
use crate::selector::SelectedDevices;

// ── Kernel ───────────────────────────────────────────────────────────────────

/// A kernel created from a loaded program.
pub struct Kernel<R: ComputeRuntime> {
    program: String,
    name: String,
    handle: Arc<R::Kernel>,
}

impl<R: ComputeRuntime> Kernel<R> {
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &Arc<R::Kernel> {
        &self.handle
    }
}

impl<R: ComputeRuntime> Clone for Kernel<R> {
    fn clone(&self) -> Self {
        Self {
            program: self.program.clone(),
            name: self.name.clone(),
            handle: Arc::clone(&self.handle),
        }
    }
}

impl<R: ComputeRuntime> std::fmt::Debug for Kernel<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel").field("program", &self.program).field("name", &self.name).finish()
    }
}

// ── Arguments ────────────────────────────────────────────────────────────────

/// A value that can be bound to one kernel argument slot.
pub trait KernelArg<R: ComputeRuntime> {
    fn bind(&self, runtime: &R, kernel: &R::Kernel, index: u32) -> RuntimeResult<()>;
}

/// A by-value argument such as a `u32` length or an `f32` coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scalar<T>(pub T);

/// `__local` scratch memory of the given size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalMem(pub usize);

impl<R: ComputeRuntime> KernelArg<R> for Arc<R::Buffer> {
    fn bind(&self, runtime: &R, kernel: &R::Kernel, index: u32) -> RuntimeResult<()> {
        runtime.set_kernel_arg_buffer(kernel, index, &**self)
    }
}

impl<R: ComputeRuntime, T: Copy + 'static> KernelArg<R> for Scalar<T> {
    fn bind(&self, runtime: &R, kernel: &R::Kernel, index: u32) -> RuntimeResult<()> {
        runtime.set_kernel_arg_scalar(kernel, index, &self.0)
    }
}

impl<R: ComputeRuntime> KernelArg<R> for LocalMem {
    fn bind(&self, runtime: &R, kernel: &R::Kernel, index: u32) -> RuntimeResult<()> {
        runtime.set_kernel_arg_local(kernel, index, self.0)
    }
}

impl<R: ComputeRuntime, A: KernelArg<R> + ?Sized> KernelArg<R> for &A {
    fn bind(&self, runtime: &R, kernel: &R::Kernel, index: u32) -> RuntimeResult<()> {
        (**self).bind(runtime, kernel, index)
    }
}

/// An ordered argument list, bound to slots `0..N`.
pub trait KernelArgs<R: ComputeRuntime> {
    fn bind_all(&self, runtime: &R, kernel: &R::Kernel) -> RuntimeResult<()>;
}

macro_rules! impl_kernel_args {
    ($($idx:tt $ty:ident),*) => {
        impl<R: ComputeRuntime, $($ty: KernelArg<R>),*> KernelArgs<R> for ($($ty,)*) {
            #[allow(unused_variables)]
            fn bind_all(&self, runtime: &R, kernel: &R::Kernel) -> RuntimeResult<()> {
                $( self.$idx.bind(runtime, kernel, $idx)?; )*
                Ok(())
            }
        }
    };
}

impl_kernel_args!();
impl_kernel_args!(0 A0);
impl_kernel_args!(0 A0, 1 A1);
impl_kernel_args!(0 A0, 1 A1, 2 A2);
impl_kernel_args!(0 A0, 1 A1, 2 A2, 3 A3);
impl_kernel_args!(0 A0, 1 A1, 2 A2, 3 A3, 4 A4);
impl_kernel_args!(0 A0, 1 A1, 2 A2, 3 A3, 4 A4, 5 A5);
impl_kernel_args!(0 A0, 1 A1, 2 A2, 3 A3, 4 A4, 5 A5, 6 A6);
impl_kernel_args!(0 A0, 1 A1, 2 A2, 3 A3, 4 A4, 5 A5, 6 A6, 7 A7);

// ── KernelFunctor ────────────────────────────────────────────────────────────

/// A kernel bound to an argument tuple type.
///
/// Argument count and sizes are checked by the runtime when [`Self::call`]
/// binds them, not when the functor is made.
pub struct KernelFunctor<R: ComputeRuntime, A> {
    runtime: Arc<R>,
    kernel: Kernel<R>,
    _args: PhantomData<fn(A)>,
}

impl<R: ComputeRuntime, A: KernelArgs<R>> KernelFunctor<R, A> {
    pub fn kernel(&self) -> &Kernel<R> {
        &self.kernel
    }

    /// Bind `args` and enqueue one launch on `queue`.
    pub fn call(&self, queue: &R::Queue, range: NdRange, args: A) -> Result<()> {
        let handle = self.kernel.handle();
        args.bind_all(&self.runtime, &**handle)
            .map_err(|s| Error::runtime("set kernel argument", s))?;
        self.runtime
            .enqueue_kernel(queue, &**handle, &range)
            .map_err(|s| Error::runtime("enqueue kernel", s))?;
        debug!("Enqueued {}::{} over {:?}", self.kernel.program, self.kernel.name, range.global());
        Ok(())
    }
}

// ── KernelFactory ────────────────────────────────────────────────────────────

/// Creates kernels from the programs of one registry.
pub(crate) struct KernelFactory<'a, R: ComputeRuntime> {
    pub(crate) runtime: &'a Arc<R>,
    pub(crate) programs: &'a ProgramRegistry<R>,
    pub(crate) devices: &'a SelectedDevices<R>,
    pub(crate) diagnostics: &'a Diagnostics,
}

impl<R: ComputeRuntime> KernelFactory<'_, R> {
    fn create(&self, program: &str, kernel: &str) -> Result<Kernel<R>> {
        let compiled = self.programs.get(program)?;
        let handle = self.runtime.create_kernel(compiled.handle(), kernel).map_err(|status| {
            if status.code() == CL_INVALID_KERNEL_NAME {
                Error::InvalidKernelName { program: program.to_owned(), kernel: kernel.to_owned() }
            } else {
                Error::runtime("create kernel", status)
            }
        })?;
        Ok(Kernel {
            program: program.to_owned(),
            name: kernel.to_owned(),
            handle: Arc::new(handle),
        })
    }

    /// Create `kernel` from `program` and report its per-device resource use.
    pub(crate) fn make_kernel(&self, program: &str, kernel: &str) -> Result<Kernel<R>> {
        let created = self.create(program, kernel)?;
        for (i, device) in self.devices.devices().iter().enumerate() {
            match self.runtime.kernel_work_group_info(created.handle(), device) {
                Ok(info) => {
                    let text = format_kernel_info(self.devices.device_name(i), &info);
                    self.diagnostics.report(&text);
                    self.diagnostics.report("");
                }
                Err(status) => debug!("No work-group info for {kernel} on device {i}: {status}"),
            }
        }
        Ok(created)
    }

    pub(crate) fn make_kernel_functor<A: KernelArgs<R>>(
        &self,
        program: &str,
        kernel: &str,
    ) -> Result<KernelFunctor<R, A>> {
        let kernel = self.create(program, kernel)?;
        Ok(KernelFunctor { runtime: Arc::clone(self.runtime), kernel, _args: PhantomData })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::mock::{MockArg, MockRuntime};
    use crate::program::ProgramDescriptor;
    use crate::runtime::{DeviceType, MemFlags};
    use crate::selector::{CapabilityRequirement, DeviceSelector};

    const SRC: &str = "__kernel void scale(__global float* v, float k, __local float* tmp) {}";

    struct Fixture {
        rt: Arc<MockRuntime>,
        devices: SelectedDevices<MockRuntime>,
        ctx: crate::mock::MockContext,
        programs: ProgramRegistry<MockRuntime>,
        sink: Arc<MemorySink>,
        diag: Diagnostics,
    }

    impl Fixture {
        fn new(verbose: bool) -> Self {
            let rt = Arc::new(MockRuntime::with_gpus(2));
            let devices =
                DeviceSelector::new(rt.as_ref(), DeviceType::Gpu, CapabilityRequirement::none())
                    .select()
                    .unwrap();
            let ctx = rt.create_context(devices.devices()).unwrap();
            let sink = Arc::new(MemorySink::new());
            let diag = Diagnostics::new(sink.clone(), verbose);
            let mut programs = ProgramRegistry::new();
            let ops = ProgramDescriptor::new("ops", SRC);
            programs.load(rt.as_ref(), &ctx, &devices, &ops, &diag).unwrap();
            Self { rt, devices, ctx, programs, sink, diag }
        }

        fn factory(&self) -> KernelFactory<'_, MockRuntime> {
            KernelFactory {
                runtime: &self.rt,
                programs: &self.programs,
                devices: &self.devices,
                diagnostics: &self.diag,
            }
        }
    }

    #[test]
    fn unknown_program_and_kernel() {
        let f = Fixture::new(false);
        let err = f.factory().make_kernel("missing", "scale").unwrap_err();
        assert!(matches!(err, Error::ProgramNotLoaded { .. }));
        let err = f.factory().make_kernel("ops", "nope").unwrap_err();
        assert!(matches!(err, Error::InvalidKernelName { ref kernel, .. } if kernel == "nope"));
    }

    #[test]
    fn verbose_kernel_report_per_device() {
        let f = Fixture::new(true);
        f.sink.clear();
        let k = f.factory().make_kernel("ops", "scale").unwrap();
        assert_eq!(k.name(), "scale");
        assert_eq!(k.program(), "ops");
        let out = f.sink.out_text();
        assert!(out.contains("Kernel info for Mock GPU 0"));
        assert!(out.contains("Kernel info for Mock GPU 1"));
        assert!(out.contains(" * Work group size:                1024"));
    }

    #[test]
    fn functor_binds_and_enqueues() {
        let f = Fixture::new(false);
        type Args = (Arc<crate::mock::MockBuffer>, Scalar<f32>, LocalMem);
        let functor = f.factory().make_kernel_functor::<Args>("ops", "scale").unwrap();
        let buf = Arc::new(f.rt.create_buffer(&f.ctx, MemFlags::READ_WRITE, 256, None).unwrap());
        let queue = f.rt.create_queue(&f.ctx, &f.devices.devices()[0]).unwrap();

        let args = (Arc::clone(&buf), Scalar(2.0_f32), LocalMem(128));
        functor.call(&queue, NdRange::linear(64), args).unwrap();

        let handle = functor.kernel().handle();
        assert_eq!(handle.arg(0), Some(MockArg::Buffer(buf.id())));
        assert_eq!(handle.arg(1), Some(MockArg::Scalar(4)));
        assert_eq!(handle.arg(2), Some(MockArg::Local(128)));
        assert_eq!(queue.launches(), 1);
        assert_eq!(f.rt.kernels_enqueued(), 1);
    }

    #[test]
    fn functor_arity_mismatch_surfaces_at_call() {
        let f = Fixture::new(false);
        let short = f.factory().make_kernel_functor::<(Scalar<u32>,)>("ops", "scale").unwrap();
        let queue = f.rt.create_queue(&f.ctx, &f.devices.devices()[0]).unwrap();
        let err = short.call(&queue, NdRange::linear(8), (Scalar(1_u32),)).unwrap_err();
        assert_eq!(err.status_code(), Some(crate::error_codes::CL_INVALID_KERNEL_ARGS));

        type Four = (Scalar<u32>, Scalar<u32>, Scalar<u32>, Scalar<u32>);
        let long = f.factory().make_kernel_functor::<Four>("ops", "scale").unwrap();
        let err = long
            .call(&queue, NdRange::linear(8), (Scalar(1), Scalar(2), Scalar(3), Scalar(4)))
            .unwrap_err();
        assert_eq!(err.status_code(), Some(crate::error_codes::CL_INVALID_ARG_INDEX));
        assert_eq!(queue.launches(), 0);
    }
}
