//! Runner configuration.
//!
//! Loads [`RunnerConfig`] from a TOML file with environment variable
//! overrides via `CLRUNNER_*` prefixed variables.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::runtime::DeviceType;
use crate::selector::CapabilityRequirement;

pub const ENV_DEVICE_TYPE: &str = "CLRUNNER_DEVICE_TYPE";
pub const ENV_REQUIRE: &str = "CLRUNNER_REQUIRE";
pub const ENV_VERBOSE: &str = "CLRUNNER_VERBOSE";
pub const ENV_BUDGET_POLICY: &str = "CLRUNNER_BUDGET_POLICY";

/// What buffer creation does with the memory budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPolicy {
    /// Count allocated bytes, never refuse.
    #[default]
    Track,
    /// Refuse allocations that would exceed the budget.
    Enforce,
}

impl fmt::Display for BudgetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Track => write!(f, "track"),
            Self::Enforce => write!(f, "enforce"),
        }
    }
}

impl FromStr for BudgetPolicy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "track" => Ok(Self::Track),
            "enforce" => Ok(Self::Enforce),
            other => Err(format!("unknown budget policy: {other}")),
        }
    }
}

/// Device selection and reporting settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Device class to select.
    /// Override: `CLRUNNER_DEVICE_TYPE`
    pub device_type: DeviceType,

    /// Extension tokens every selected device must advertise.
    /// Override: `CLRUNNER_REQUIRE` (comma separated)
    pub required_extensions: Vec<String>,

    /// Print build logs and kernel reports to the normal output stream.
    /// Override: `CLRUNNER_VERBOSE`
    pub verbose: bool,

    /// Override: `CLRUNNER_BUDGET_POLICY`
    pub budget_policy: BudgetPolicy,
}

impl RunnerConfig {
    /// Load from a TOML file, then apply environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let mut cfg: RunnerConfig = toml::from_str(toml_str)
            .map_err(|e| Error::Config(format!("failed to parse TOML: {e}")))?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(format!("failed to serialize: {e}")))
    }

    #[must_use]
    pub fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    #[must_use]
    pub fn require(mut self, extension: impl Into<String>) -> Self {
        self.required_extensions.push(extension.into());
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub fn with_budget_policy(mut self, policy: BudgetPolicy) -> Self {
        self.budget_policy = policy;
        self
    }

    pub fn requirement(&self) -> CapabilityRequirement {
        CapabilityRequirement::new(self.required_extensions.iter().cloned())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(i) = self.required_extensions.iter().position(|t| t.trim().is_empty()) {
            return Err(Error::Config(format!("required_extensions[{i}] must not be blank")));
        }
        Ok(())
    }

    /// Apply `CLRUNNER_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var(ENV_DEVICE_TYPE) {
            self.device_type = val
                .parse::<DeviceType>()
                .map_err(|reason| env_error(ENV_DEVICE_TYPE, &val, &reason))?;
        }

        if let Ok(val) = std::env::var(ENV_REQUIRE) {
            let tokens = val.split(',').map(str::trim).filter(|t| !t.is_empty());
            self.required_extensions = tokens.map(str::to_owned).collect();
        }

        if let Ok(val) = std::env::var(ENV_VERBOSE) {
            self.verbose = matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Ok(val) = std::env::var(ENV_BUDGET_POLICY) {
            self.budget_policy = val
                .parse::<BudgetPolicy>()
                .map_err(|reason| env_error(ENV_BUDGET_POLICY, &val, &reason))?;
        }

        Ok(())
    }
}

fn env_error(key: &str, value: &str, reason: &str) -> Error {
    Error::Config(format!("invalid environment override {key}={value}: {reason}"))
}

#[cfg(test)]
mod tests;
