//! Named, built programs.
//!
//! A program is compiled once for every selected device and cached under its
//! name until released. An entry only becomes visible after its build
//! succeeded.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::runtime::ComputeRuntime;
use crate::selector::SelectedDevices;

// ── Sources ──────────────────────────────────────────────────────────────────

/// Supplier of program text and build settings.
pub trait ProgramSource {
    /// Registry key.
    fn name(&self) -> &str;

    /// Where the text came from. Informational only.
    fn path(&self) -> &str;

    fn build_options(&self) -> &str;

    fn source(&self) -> &str;
}

/// Owned [`ProgramSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDescriptor {
    name: String,
    path: String,
    build_options: String,
    source: String,
}

impl ProgramDescriptor {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: String::new(),
            build_options: String::new(),
            source: source.into(),
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_build_options(mut self, options: impl Into<String>) -> Self {
        self.build_options = options.into();
        self
    }
}

impl ProgramSource for ProgramDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn build_options(&self) -> &str {
        &self.build_options
    }

    fn source(&self) -> &str {
        &self.source
    }
}

// ── Build results ────────────────────────────────────────────────────────────

/// Compiler output for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLog {
    pub device: String,
    pub log: String,
}

impl BuildLog {
    /// Logs of a single character or less are compiler noise.
    pub fn is_trivial(&self) -> bool {
        self.log.len() <= 1
    }
}

/// A built program and the logs its build produced.
pub struct CompiledProgram<R: ComputeRuntime> {
    name: String,
    path: String,
    build_options: String,
    handle: R::Program,
    logs: Vec<BuildLog>,
}

impl<R: ComputeRuntime> CompiledProgram<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn build_options(&self) -> &str {
        &self.build_options
    }

    pub fn handle(&self) -> &R::Program {
        &self.handle
    }

    /// Post-build logs, one per selected device.
    pub fn build_logs(&self) -> &[BuildLog] {
        &self.logs
    }
}

impl<R: ComputeRuntime> std::fmt::Debug for CompiledProgram<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("build_options", &self.build_options)
            .field("logs", &self.logs)
            .finish_non_exhaustive()
    }
}

fn collect_logs<R: ComputeRuntime>(
    runtime: &R,
    program: &R::Program,
    devices: &SelectedDevices<R>,
) -> Vec<BuildLog> {
    devices
        .devices()
        .iter()
        .enumerate()
        .map(|(i, device)| {
            let log = runtime.build_log(program, device).unwrap_or_else(|status| {
                debug!("Build log unavailable for device {i}: {status}");
                String::new()
            });
            BuildLog { device: devices.device_name(i).to_owned(), log }
        })
        .collect()
}

// ── ProgramRegistry ──────────────────────────────────────────────────────────

/// Name-keyed cache of built programs.
pub struct ProgramRegistry<R: ComputeRuntime> {
    programs: HashMap<String, Arc<CompiledProgram<R>>>,
}

impl<R: ComputeRuntime> Default for ProgramRegistry<R> {
    fn default() -> Self {
        Self { programs: HashMap::new() }
    }
}

impl<R: ComputeRuntime> ProgramRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `source` for every selected device and register it under its
    /// name.
    pub(crate) fn load(
        &mut self,
        runtime: &R,
        context: &R::Context,
        devices: &SelectedDevices<R>,
        source: &dyn ProgramSource,
        diagnostics: &Diagnostics,
    ) -> Result<Arc<CompiledProgram<R>>> {
        let name = source.name();
        if devices.is_empty() {
            return Err(Error::NoDevicesAvailable { name: name.to_owned() });
        }
        if self.programs.contains_key(name) {
            return Err(Error::DuplicateProgramName { name: name.to_owned() });
        }

        let handle = runtime
            .create_program(context, source.source())
            .map_err(|s| Error::runtime("create program", s))?;

        diagnostics.report(&format!("Build log for {} ({})", name, source.path()));
        for log in collect_logs(runtime, &handle, devices) {
            if !log.is_trivial() {
                diagnostics.report(&format!("== Device {}:\n{}\n=========", log.device, log.log));
            }
        }

        debug!("Building program {name} with options '{}'", source.build_options());
        let built = runtime.build_program(&handle, devices.devices(), source.build_options());
        if let Err(status) = built {
            if !status.is_build_failure() {
                return Err(Error::runtime("build program", status));
            }
            let logs = collect_logs(runtime, &handle, devices);
            for log in &logs {
                diagnostics.error(&format!("Build failure\n{}", log.log));
            }
            warn!("Build of program {name} failed: {status}");
            return Err(Error::BuildFailed { program: name.to_owned(), status, logs });
        }

        let logs = collect_logs(runtime, &handle, devices);
        for log in logs.iter().filter(|l| !l.is_trivial()) {
            debug!("Build log for {name} on {}: {}", log.device, log.log);
        }

        let program = Arc::new(CompiledProgram {
            name: name.to_owned(),
            path: source.path().to_owned(),
            build_options: source.build_options().to_owned(),
            handle,
            logs,
        });
        self.programs.insert(name.to_owned(), Arc::clone(&program));
        debug!("Program {name} loaded ({} registered)", self.programs.len());
        Ok(program)
    }

    pub fn get(&self, name: &str) -> Result<Arc<CompiledProgram<R>>> {
        self.programs
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ProgramNotLoaded { name: name.to_owned() })
    }

    /// Drop the entry if present. Returns whether anything was removed.
    pub fn release(&mut self, name: &str) -> bool {
        let removed = self.programs.remove(name).is_some();
        if removed {
            debug!("Program {name} released");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
