//! Platform and device selection under capability constraints.
//!
//! [`DeviceSelector`] scores each platform by the number of devices of the
//! requested class that carry every required extension, picks the best
//! platform (first one wins ties) and materialises its qualifying devices
//! together with the [`MemoryBudget`] they imply.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::error_codes::CL_DEVICE_NOT_FOUND;
use crate::runtime::{ComputeRuntime, DeviceInfo, DeviceType};

// ── CapabilityRequirement ────────────────────────────────────────────────────

/// Extension tokens a device must advertise to qualify.
///
/// Each token is matched as a substring of the device's extension string.
/// An empty requirement accepts every device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityRequirement {
    tokens: Vec<String>,
}

impl CapabilityRequirement {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { tokens: tokens.into_iter().map(Into::into).collect() }
    }

    /// No filtering.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_satisfied_by(&self, info: &DeviceInfo) -> bool {
        info.has_extensions(&self.tokens)
    }
}

// ── MemoryBudget ─────────────────────────────────────────────────────────────

/// Memory watermarks of the selected device set.
///
/// Both values are minima over the selected devices, computed once at
/// selection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudget {
    /// Smallest global memory size.
    pub total_memory: u64,
    /// Smallest maximum single-allocation size.
    pub buffer_memory: u64,
}

impl MemoryBudget {
    pub fn from_devices<'a, I>(infos: I) -> Self
    where
        I: IntoIterator<Item = &'a DeviceInfo>,
    {
        infos.into_iter().fold(
            Self { total_memory: u64::MAX, buffer_memory: u64::MAX },
            |budget, info| Self {
                total_memory: budget.total_memory.min(info.global_mem_bytes),
                buffer_memory: budget.buffer_memory.min(info.max_mem_alloc_bytes),
            },
        )
    }
}

// ── SelectedDevices ──────────────────────────────────────────────────────────

/// The device set chosen at construction. Immutable afterwards.
pub struct SelectedDevices<R: ComputeRuntime> {
    platform: R::Platform,
    platform_name: String,
    devices: Vec<R::Device>,
    infos: Vec<DeviceInfo>,
    budget: MemoryBudget,
}

impl<R: ComputeRuntime> SelectedDevices<R> {
    pub fn platform(&self) -> &R::Platform {
        &self.platform
    }

    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    pub fn devices(&self) -> &[R::Device] {
        &self.devices
    }

    /// Properties of each device, index-aligned with [`Self::devices`].
    pub fn infos(&self) -> &[DeviceInfo] {
        &self.infos
    }

    pub fn device_name(&self, index: usize) -> &str {
        self.infos.get(index).map_or("", |i| i.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn budget(&self) -> MemoryBudget {
        self.budget
    }

    /// A set with no devices, which selection itself never produces.
    #[cfg(test)]
    pub(crate) fn empty(platform: R::Platform, platform_name: impl Into<String>) -> Self {
        Self {
            platform,
            platform_name: platform_name.into(),
            devices: Vec::new(),
            infos: Vec::new(),
            budget: MemoryBudget::from_devices(std::iter::empty::<&DeviceInfo>()),
        }
    }
}

impl<R: ComputeRuntime> std::fmt::Debug for SelectedDevices<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedDevices")
            .field("platform", &self.platform_name)
            .field("devices", &self.infos.iter().map(|i| i.name.as_str()).collect::<Vec<_>>())
            .field("budget", &self.budget)
            .finish()
    }
}

// ── PlatformScore ────────────────────────────────────────────────────────────

/// One platform's qualifying devices, produced while scanning.
pub struct PlatformScore<R: ComputeRuntime> {
    pub platform: R::Platform,
    pub name: String,
    pub devices: Vec<(R::Device, DeviceInfo)>,
}

impl<R: ComputeRuntime> PlatformScore<R> {
    /// Number of qualifying devices.
    pub fn score(&self) -> usize {
        self.devices.len()
    }
}

// ── DeviceSelector ───────────────────────────────────────────────────────────

/// Chooses the platform with the most qualifying devices.
pub struct DeviceSelector<'a, R: ComputeRuntime> {
    runtime: &'a R,
    device_type: DeviceType,
    requirement: CapabilityRequirement,
}

impl<'a, R: ComputeRuntime> DeviceSelector<'a, R> {
    pub fn new(
        runtime: &'a R,
        device_type: DeviceType,
        requirement: CapabilityRequirement,
    ) -> Self {
        Self { runtime, device_type, requirement }
    }

    /// Score every platform in enumeration order.
    ///
    /// A platform without devices of the requested class scores zero. Any
    /// other runtime failure aborts the scan.
    pub fn score_platforms(&self) -> Result<Vec<PlatformScore<R>>> {
        let platforms =
            self.runtime.platforms().map_err(|s| Error::runtime("enumerate platforms", s))?;
        if platforms.is_empty() {
            return Err(Error::NoPlatformsFound);
        }

        let mut scores = Vec::with_capacity(platforms.len());
        for platform in platforms {
            let name = self
                .runtime
                .platform_name(&platform)
                .map_err(|s| Error::runtime("query platform name", s))?;
            debug!("Scanning platform: {}", name.trim());

            let devices = match self.runtime.devices(&platform, self.device_type) {
                Ok(devices) => devices,
                Err(s) if s.code() == CL_DEVICE_NOT_FOUND => Vec::new(),
                Err(s) => return Err(Error::runtime("enumerate devices", s)),
            };

            let mut qualifying = Vec::with_capacity(devices.len());
            for device in devices {
                let info = self
                    .runtime
                    .device_info(&device)
                    .map_err(|s| Error::runtime("query device info", s))?;
                if self.requirement.is_satisfied_by(&info) {
                    qualifying.push((device, info));
                } else {
                    debug!(
                        "Device {} lacks required extensions {:?}",
                        info.name,
                        self.requirement.tokens()
                    );
                }
            }

            let name = name.trim().to_owned();
            scores.push(PlatformScore { platform, name, devices: qualifying });
        }
        Ok(scores)
    }

    /// Select the best platform and its qualifying devices.
    pub fn select(&self) -> Result<SelectedDevices<R>> {
        info!("Detecting best platform..");
        let mut best: Option<PlatformScore<R>> = None;
        for candidate in self.score_platforms()? {
            best = Some(match best {
                Some(current) if current.score() >= candidate.score() => current,
                _ => candidate,
            });
        }

        let best = match best {
            Some(best) if best.score() > 0 => best,
            _ => {
                warn!(
                    "No compatible {} device (required extensions: {:?})",
                    self.device_type,
                    self.requirement.tokens()
                );
                return Err(Error::NoCompatibleDevice {
                    device_type: self.device_type,
                    requirements: self.requirement.tokens().to_vec(),
                });
            }
        };

        let count = best.score();
        let plural = if count > 1 { "s" } else { "" };
        info!("Chose {} with {count} compatible device{plural}", best.name);

        let (devices, infos): (Vec<_>, Vec<_>) = best.devices.into_iter().unzip();
        let budget = MemoryBudget::from_devices(&infos);
        debug!(
            "Memory budget: total={} bytes, max buffer={} bytes",
            budget.total_memory, budget.buffer_memory
        );

        Ok(SelectedDevices {
            platform: best.platform,
            platform_name: best.name,
            devices,
            infos,
            budget,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{DeviceSpec, MockRuntime, PlatformSpec};

    const GB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn budget_is_minimum_over_devices() {
        let device = |total, alloc| DeviceInfo {
            global_mem_bytes: total,
            max_mem_alloc_bytes: alloc,
            ..Default::default()
        };
        let (a, b) = (device(8 * GB, 2 * GB), device(4 * GB, 3 * GB));
        let budget = MemoryBudget::from_devices([&a, &b]);
        assert_eq!(budget.total_memory, 4 * GB);
        assert_eq!(budget.buffer_memory, 2 * GB);
    }

    #[test]
    fn empty_requirement_accepts_everything() {
        let req = CapabilityRequirement::none();
        assert!(req.is_empty());
        assert!(req.is_satisfied_by(&DeviceInfo::default()));
    }

    #[test]
    fn picks_platform_with_most_devices() {
        let rt = MockRuntime::new(vec![
            PlatformSpec::new("one").with_device(DeviceSpec::gpu("a")),
            PlatformSpec::new("two")
                .with_device(DeviceSpec::gpu("b"))
                .with_device(DeviceSpec::gpu("c")),
        ]);
        let selector = DeviceSelector::new(&rt, DeviceType::Gpu, CapabilityRequirement::none());
        let selected = selector.select().unwrap();
        assert_eq!(selected.platform_name(), "two");
        assert_eq!(selected.len(), 2);
        assert_eq!(selected.device_name(1), "c");
    }

    #[test]
    fn ties_go_to_first_platform() {
        let rt = MockRuntime::new(vec![
            PlatformSpec::new("first").with_device(DeviceSpec::gpu("a")),
            PlatformSpec::new("second").with_device(DeviceSpec::gpu("b")),
        ]);
        let selector = DeviceSelector::new(&rt, DeviceType::Gpu, CapabilityRequirement::none());
        let selected = selector.select().unwrap();
        assert_eq!(selected.platform_name(), "first");
    }

    #[test]
    fn platform_without_class_scores_zero() {
        let rt = MockRuntime::new(vec![
            PlatformSpec::new("cpu only").with_device(DeviceSpec::cpu("host")),
            PlatformSpec::new("gpu").with_device(DeviceSpec::gpu("card")),
        ]);
        let selector = DeviceSelector::new(&rt, DeviceType::Gpu, CapabilityRequirement::none());
        let scores = selector.score_platforms().unwrap();
        assert_eq!(scores.iter().map(PlatformScore::score).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(selector.select().unwrap().platform_name(), "gpu");
    }

    #[test]
    fn requirement_filters_devices_and_budget() {
        let rt = MockRuntime::new(vec![
            PlatformSpec::new("p")
                .with_device(DeviceSpec::gpu("fp64").with_memory(4 * GB, GB))
                .with_device(
                    DeviceSpec::gpu("plain").with_extensions("cl_khr_fp16").with_memory(GB, GB / 4),
                ),
        ]);
        let selected =
            DeviceSelector::new(&rt, DeviceType::Gpu, CapabilityRequirement::new(["cl_khr_fp64"]))
                .select()
                .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected.device_name(0), "fp64");
        assert_eq!(selected.budget(), MemoryBudget { total_memory: 4 * GB, buffer_memory: GB });
    }

    #[test]
    fn no_platforms() {
        let rt = MockRuntime::new(vec![]);
        let err = DeviceSelector::new(&rt, DeviceType::Gpu, CapabilityRequirement::none())
            .select()
            .unwrap_err();
        assert!(matches!(err, Error::NoPlatformsFound));
    }

    #[test]
    fn unknown_token_means_no_compatible_device() {
        let rt = MockRuntime::with_gpus(2);
        let requirement = CapabilityRequirement::new(["cl_vendor_magic"]);
        let err = DeviceSelector::new(&rt, DeviceType::Gpu, requirement).select().unwrap_err();
        match err {
            Error::NoCompatibleDevice { device_type, requirements } => {
                assert_eq!(device_type, DeviceType::Gpu);
                assert_eq!(requirements, vec!["cl_vendor_magic".to_owned()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn enumeration_failure_is_wrapped() {
        let rt = MockRuntime::with_gpus(1);
        rt.fail_device_enumeration(0);
        let err = DeviceSelector::new(&rt, DeviceType::Gpu, CapabilityRequirement::none())
            .select()
            .unwrap_err();
        assert_eq!(err.status_code(), Some(crate::error_codes::CL_INVALID_PLATFORM));
    }
}
