//! Human-readable reporting of platforms, devices, builds and kernels.
//!
//! Text goes to a [`DiagnosticsSink`], which separates normal output from the
//! error stream. Nothing here is structured; the formatters return plain
//! strings so callers can route them wherever they like.

use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::runtime::{ComputeRuntime, DeviceInfo, DeviceType, KernelWorkGroupInfo};

const FRAME: &str = "=========================|";

// ── Sinks ────────────────────────────────────────────────────────────────────

/// Destination for diagnostic text. Each call writes one line.
pub trait DiagnosticsSink: Send + Sync {
    fn out(&self, line: &str);
    fn err(&self, line: &str);
}

/// Writes to the process stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioSink;

impl DiagnosticsSink for StdioSink {
    fn out(&self, line: &str) {
        let _ = writeln!(std::io::stdout().lock(), "{line}");
    }

    fn err(&self, line: &str) {
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }
}

/// Captures everything in memory. Used by tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    out: Mutex<String>,
    err: Mutex<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn out_text(&self) -> String {
        self.out.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn err_text(&self) -> String {
        self.err.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut s) = self.out.lock() {
            s.clear();
        }
        if let Ok(mut s) = self.err.lock() {
            s.clear();
        }
    }
}

impl DiagnosticsSink for MemorySink {
    fn out(&self, line: &str) {
        if let Ok(mut s) = self.out.lock() {
            s.push_str(line);
            s.push('\n');
        }
    }

    fn err(&self, line: &str) {
        if let Ok(mut s) = self.err.lock() {
            s.push_str(line);
            s.push('\n');
        }
    }
}

/// Sink plus the verbosity switch, shared by the registries.
#[derive(Clone)]
pub(crate) struct Diagnostics {
    sink: Arc<dyn DiagnosticsSink>,
    verbose: bool,
}

impl Diagnostics {
    pub(crate) fn new(sink: Arc<dyn DiagnosticsSink>, verbose: bool) -> Self {
        Self { sink, verbose }
    }

    pub(crate) fn sink(&self) -> &Arc<dyn DiagnosticsSink> {
        &self.sink
    }

    pub(crate) fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Normal-stream output, only when verbose.
    pub(crate) fn report(&self, text: &str) {
        if self.verbose {
            self.sink.out(text);
        }
    }

    /// Error-stream output, always.
    pub(crate) fn error(&self, text: &str) {
        self.sink.err(text);
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics").field("verbose", &self.verbose).finish_non_exhaustive()
    }
}

// ── Formatters ───────────────────────────────────────────────────────────────

/// The framed long-form device block.
pub fn format_device_info(info: &DeviceInfo) -> String {
    let mut lines = Vec::with_capacity(11);

    lines.push(FRAME.to_owned());
    lines.push(format!("Name:                     {}", info.name));
    lines.push(format!("OpenCL version:           {}", info.driver_version));
    lines.push(format!("Global memory size:       {}MB", info.global_mem_bytes / (1024 * 1024)));
    lines.push(format!("Local memory size:        {}KB", info.local_mem_bytes / 1024));
    lines.push(format!("Max constant buffer size: {}KB", info.max_constant_buffer_bytes / 1024));
    let clock_hz = u64::from(info.max_clock_mhz) * 1_000_000;
    lines.push(format!("Max clock frequency:      {clock_hz}Hz"));
    lines.push(format!("Max compute units:        {}", info.max_compute_units));
    lines.push(format!("Max work group size:      {}", info.max_work_group_size));
    lines.push(format!("Extensions:               {}", info.extensions));
    lines.push(FRAME.to_owned());

    lines.join("\n")
}

/// Per-device resource report of one kernel.
pub fn format_kernel_info(device_name: &str, info: &KernelWorkGroupInfo) -> String {
    let [cx, cy, cz] = info.compile_work_group_size;
    let [gx, gy, gz] = info.global_work_size;
    [
        format!("Kernel info for {device_name}"),
        format!(" * Compile work group size:        {cx}, {cy}, {cz}"),
        format!(" * Global work size:               {gx}, {gy}, {gz}"),
        format!(" * Local memory size:              {}B", info.local_mem_bytes),
        format!(" * Preferred group size multiple:  {}", info.preferred_work_group_size_multiple),
        format!(" * Private memory size:            {}B", info.private_mem_bytes),
        format!(" * Work group size:                {}", info.work_group_size),
    ]
    .join("\n")
}

/// Platform names followed by their devices, the last one marked with `└`.
pub fn format_device_tree(platforms: &[(String, Vec<String>)]) -> String {
    let mut lines = Vec::new();
    for (platform, devices) in platforms {
        lines.push(platform.trim().to_owned());
        for (i, device) in devices.iter().enumerate() {
            let branch = if i + 1 == devices.len() { "└" } else { "├" };
            lines.push(format!(" {branch} {}", device.trim()));
        }
    }
    lines.join("\n")
}

// ── Reporter ─────────────────────────────────────────────────────────────────

/// Read-only enumeration and description of whatever the runtime exposes.
///
/// Individual platform or device query failures are logged and skipped.
pub struct DiagnosticsReporter<'a, R: ComputeRuntime> {
    runtime: &'a R,
    sink: Arc<dyn DiagnosticsSink>,
}

impl<'a, R: ComputeRuntime> DiagnosticsReporter<'a, R> {
    pub fn new(runtime: &'a R, sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self { runtime, sink }
    }

    /// Print every platform and every device under it, of any class.
    ///
    /// Returns the number of devices listed. Fails only when the platform
    /// list itself cannot be obtained or is empty.
    pub fn list_all(&self) -> Result<usize> {
        self.sink.out("Listing all platforms and devices..");

        let platforms =
            self.runtime.platforms().map_err(|s| Error::runtime("enumerate platforms", s))?;
        if platforms.is_empty() {
            self.sink.err("OpenCL platforms not found");
            return Err(Error::NoPlatformsFound);
        }

        let mut tree = Vec::with_capacity(platforms.len());
        for platform in &platforms {
            let name = match self.runtime.platform_name(platform) {
                Ok(name) => name,
                Err(status) => {
                    warn!("Skipping platform: {status}");
                    continue;
                }
            };

            let devices = match self.runtime.devices(platform, DeviceType::All) {
                Ok(devices) => devices,
                Err(status) => {
                    debug!("No devices listed for {}: {status}", name.trim());
                    Vec::new()
                }
            };

            let names = devices
                .iter()
                .filter_map(|d| match self.runtime.device_name(d) {
                    Ok(name) => Some(name),
                    Err(status) => {
                        warn!("Skipping device on {}: {status}", name.trim());
                        None
                    }
                })
                .collect::<Vec<_>>();
            tree.push((name, names));
        }

        let listed = tree.iter().map(|(_, d)| d.len()).sum();
        let text = format_device_tree(&tree);
        if !text.is_empty() {
            self.sink.out(&text);
        }
        Ok(listed)
    }

    /// Print the long-form block for one device. Returns `false` when the
    /// device could not be queried and nothing was printed.
    pub fn describe_device(&self, device: &R::Device) -> bool {
        match self.runtime.device_info(device) {
            Ok(info) => {
                self.sink.out(&format_device_info(&info));
                true
            }
            Err(status) => {
                warn!("Skipping device description: {status}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_marks_last_device() {
        let tree = vec![
            ("  Vendor A ".to_owned(), vec!["gpu0".to_owned(), "gpu1 ".to_owned()]),
            ("Vendor B".to_owned(), vec!["cpu".to_owned()]),
            ("Empty".to_owned(), vec![]),
        ];
        assert_eq!(
            format_device_tree(&tree),
            "Vendor A\n ├ gpu0\n └ gpu1\nVendor B\n └ cpu\nEmpty"
        );
    }

    #[test]
    fn device_block_converts_units() {
        let info = DeviceInfo {
            name: "card".into(),
            driver_version: "OpenCL 3.0".into(),
            extensions: "cl_khr_fp64".into(),
            global_mem_bytes: 4096 * 1024 * 1024,
            local_mem_bytes: 48 * 1024,
            max_constant_buffer_bytes: 64 * 1024,
            max_clock_mhz: 1200,
            max_compute_units: 20,
            max_work_group_size: 256,
            ..Default::default()
        };
        let text = format_device_info(&info);
        assert!(text.starts_with(FRAME));
        assert!(text.ends_with(FRAME));
        assert!(text.contains("Global memory size:       4096MB"));
        assert!(text.contains("Local memory size:        48KB"));
        assert!(text.contains("Max constant buffer size: 64KB"));
        assert!(text.contains("Max clock frequency:      1200000000Hz"));
        assert!(text.contains("Extensions:               cl_khr_fp64"));
    }

    #[test]
    fn kernel_report_layout() {
        let info = KernelWorkGroupInfo {
            compile_work_group_size: [8, 8, 1],
            local_mem_bytes: 512,
            preferred_work_group_size_multiple: 32,
            work_group_size: 256,
            ..Default::default()
        };
        let text = format_kernel_info("gpu0", &info);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "Kernel info for gpu0");
        assert!(lines[1].ends_with("8, 8, 1"));
        assert!(lines[3].ends_with("512B"));
        assert!(lines[6].ends_with("256"));
    }

    #[test]
    fn quiet_diagnostics_only_write_errors() {
        let sink = Arc::new(MemorySink::new());
        let diag = Diagnostics::new(sink.clone(), false);
        diag.report("hidden");
        diag.error("shown");
        assert_eq!(sink.out_text(), "");
        assert_eq!(sink.err_text(), "shown\n");
    }
}
