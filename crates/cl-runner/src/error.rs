//! Error types for context selection and resource management.

use crate::error_codes::ClStatus;
use crate::program::BuildLog;
use crate::runtime::DeviceType;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the runner and its registries.
///
/// Every status coming back from the compute runtime is translated into one
/// of these at the call site. Runtime-originated variants keep the raw code
/// and its mnemonic in the message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no OpenCL platforms found")]
    NoPlatformsFound,

    #[error("no compatible {device_type} device found (required extensions: {requirements:?})")]
    NoCompatibleDevice { device_type: DeviceType, requirements: Vec<String> },

    #[error("a program named '{name}' is already loaded")]
    DuplicateProgramName { name: String },

    #[error("cannot load program '{name}': no devices selected")]
    NoDevicesAvailable { name: String },

    #[error("build of program '{program}' failed: {status}")]
    BuildFailed { program: String, status: ClStatus, logs: Vec<BuildLog> },

    #[error("no program named '{name}' has been loaded yet")]
    ProgramNotLoaded { name: String },

    #[error("program '{program}' has no kernel named '{kernel}'")]
    InvalidKernelName { program: String, kernel: String },

    #[error("a buffer named '{name}' already exists")]
    DuplicateBufferName { name: String },

    #[error("no buffer named '{name}'")]
    BufferNotFound { name: String },

    #[error(
        "buffer '{name}' exceeds memory budget: \
         {requested} bytes requested, {available} bytes available"
    )]
    MemoryBudgetExceeded { name: String, requested: u64, available: u64 },

    #[error("failed to create command queue for device {device_index}: {status}")]
    QueueCreationFailed { device_index: usize, status: ClStatus },

    #[error("could not create command queues: {requested} requested, {available} available")]
    InsufficientQueues { requested: usize, available: usize },

    #[error("OpenCL error during {operation}: {mnemonic} ({code})")]
    Runtime { operation: &'static str, code: i32, mnemonic: &'static str },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an unclassified runtime status.
    #[inline]
    pub fn runtime(operation: &'static str, status: ClStatus) -> Self {
        Self::Runtime { operation, code: status.code(), mnemonic: status.mnemonic() }
    }

    /// Raw runtime code, when the error originated in the compute layer.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            Self::BuildFailed { status, .. } | Self::QueueCreationFailed { status, .. } => {
                Some(status.code())
            }
            Self::Runtime { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for lookups of names that were never registered.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProgramNotLoaded { .. } | Self::BufferNotFound { .. })
    }
}
