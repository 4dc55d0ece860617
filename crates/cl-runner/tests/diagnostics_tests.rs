//! Output of the reporting paths, captured through `MemorySink`.

use std::sync::Arc;

use cl_runner::mock::{DeviceSpec, MockRuntime, PlatformSpec};
use cl_runner::{DiagnosticsReporter, Error, MemorySink, ProgramDescriptor, Runner, RunnerConfig};

fn two_platforms() -> MockRuntime {
    MockRuntime::new(vec![
        PlatformSpec::new("  Portable Computing Language ")
            .with_device(DeviceSpec::cpu("cpu-haswell"))
            .with_device(DeviceSpec::gpu("pocl-gpu")),
        PlatformSpec::new("NVIDIA CUDA").with_device(DeviceSpec::gpu("GeForce RTX 3080 ")),
    ])
}

#[test]
fn list_all_prints_tree() {
    let rt = two_platforms();
    let sink = Arc::new(MemorySink::new());
    let listed = DiagnosticsReporter::new(&rt, sink.clone()).list_all().unwrap();
    assert_eq!(listed, 3);
    assert_eq!(
        sink.out_text(),
        "Listing all platforms and devices..\n\
         Portable Computing Language\n ├ cpu-haswell\n └ pocl-gpu\n\
         NVIDIA CUDA\n └ GeForce RTX 3080\n"
    );
}

#[test]
fn list_all_without_platforms() {
    let rt = MockRuntime::new(vec![]);
    let sink = Arc::new(MemorySink::new());
    let err = DiagnosticsReporter::new(&rt, sink.clone()).list_all().unwrap_err();
    assert!(matches!(err, Error::NoPlatformsFound));
    assert!(sink.err_text().contains("OpenCL platforms not found"));
}

#[test]
fn list_all_skips_failing_items() {
    let rt = two_platforms();
    rt.fail_device_enumeration(0);
    rt.fail_device_name("GeForce RTX 3080 ");
    let sink = Arc::new(MemorySink::new());
    let listed = DiagnosticsReporter::new(&rt, sink.clone()).list_all().unwrap();
    assert_eq!(listed, 0);
    assert_eq!(
        sink.out_text(),
        "Listing all platforms and devices..\nPortable Computing Language\nNVIDIA CUDA\n"
    );
}

#[test]
fn list_all_keeps_device_with_failing_info_query() {
    let rt = two_platforms();
    rt.fail_device_info("pocl-gpu");
    let sink = Arc::new(MemorySink::new());
    let listed = DiagnosticsReporter::new(&rt, sink.clone()).list_all().unwrap();
    assert_eq!(listed, 3);
    assert!(sink.out_text().contains(" └ pocl-gpu\n"));
}

#[test]
fn describe_devices_prints_framed_blocks() {
    let sink = Arc::new(MemorySink::new());
    let runner =
        Runner::with_sink(MockRuntime::with_gpus(2), &RunnerConfig::default(), sink.clone())
            .unwrap();
    assert_eq!(runner.describe_devices(), 2);
    let out = sink.out_text();
    assert_eq!(out.matches("=========================|").count(), 4);
    assert!(out.contains("Name:                     Mock GPU 1"));
    assert!(out.contains("Global memory size:       8192MB"));
    assert!(out.contains("Local memory size:        64KB"));
    assert!(out.contains("Max clock frequency:      1500000000Hz"));
    assert!(out.contains("Max compute units:        32"));
}

#[test]
fn describe_skips_unqueryable_device() {
    let rt = MockRuntime::with_gpus(2);
    let sink = Arc::new(MemorySink::new());
    let runner = Runner::with_sink(rt, &RunnerConfig::default(), sink.clone()).unwrap();
    runner.runtime().fail_device_info("Mock GPU 0");
    assert_eq!(runner.describe_devices(), 1);
    assert!(!sink.out_text().contains("Mock GPU 0"));
}

#[test]
fn verbose_runner_reports_builds_and_kernels() {
    let sink = Arc::new(MemorySink::new());
    let config = RunnerConfig::default().verbose(true);
    let mut runner = Runner::with_sink(MockRuntime::with_gpus(2), &config, sink.clone()).unwrap();

    let program = ProgramDescriptor::new("k", "__kernel void add(__global int* a, int b) {}")
        .with_path("k.cl");
    runner.load_program(&program).unwrap();
    runner.make_kernel("k", "add").unwrap();

    let out = sink.out_text();
    assert!(out.starts_with("Build log for k (k.cl)\n"));
    assert!(out.contains(
        "Kernel info for Mock GPU 0\n * Compile work group size:        0, 0, 0\n"
    ));
    assert!(out.contains("Kernel info for Mock GPU 1"));
    assert!(out.contains(" * Preferred group size multiple:  32"));
    assert!(sink.err_text().is_empty());
}
