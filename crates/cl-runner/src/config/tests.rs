//! Configuration tests

use super::*;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

const ALL_VARS: [&str; 4] = [ENV_DEVICE_TYPE, ENV_REQUIRE, ENV_VERBOSE, ENV_BUDGET_POLICY];

fn clear_env() {
    for var in ALL_VARS {
        unsafe {
            env::remove_var(var);
        }
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_env();
    let config = RunnerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.device_type, DeviceType::Gpu);
    assert!(config.required_extensions.is_empty());
    assert!(!config.verbose);
    assert_eq!(config.budget_policy, BudgetPolicy::Track);
    assert!(config.requirement().is_empty());
}

#[test]
#[serial]
fn test_from_file() {
    clear_env();
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
device_type = "cpu"
required_extensions = ["cl_khr_fp64", "cl_khr_int64_base_atomics"]
verbose = true
budget_policy = "enforce"
"#
    )
    .unwrap();

    let config = RunnerConfig::from_file(temp_file.path()).unwrap();
    assert_eq!(config.device_type, DeviceType::Cpu);
    assert_eq!(config.required_extensions.len(), 2);
    assert!(config.verbose);
    assert_eq!(config.budget_policy, BudgetPolicy::Enforce);
}

#[test]
#[serial]
fn test_partial_file_uses_defaults() {
    clear_env();
    let config = RunnerConfig::from_toml("verbose = true\n").unwrap();
    assert!(config.verbose);
    assert_eq!(config.device_type, DeviceType::Gpu);
    assert_eq!(config.budget_policy, BudgetPolicy::Track);
}

#[test]
#[serial]
fn test_missing_file_is_io_error() {
    let err = RunnerConfig::from_file("/nonexistent/cl-runner.toml").unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
#[serial]
fn test_malformed_toml() {
    clear_env();
    let err = RunnerConfig::from_toml("device_type = \"fpga\"").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    unsafe {
        env::set_var(ENV_DEVICE_TYPE, "accelerator");
    }
    unsafe {
        env::set_var(ENV_REQUIRE, "cl_khr_fp64, cl_khr_fp16,,");
    }
    unsafe {
        env::set_var(ENV_VERBOSE, "1");
    }
    unsafe {
        env::set_var(ENV_BUDGET_POLICY, "Enforce");
    }

    let config = RunnerConfig::from_env().unwrap();
    assert_eq!(config.device_type, DeviceType::Accelerator);
    assert_eq!(config.required_extensions, vec!["cl_khr_fp64", "cl_khr_fp16"]);
    assert!(config.verbose);
    assert_eq!(config.budget_policy, BudgetPolicy::Enforce);

    clear_env();
}

#[test]
#[serial]
fn test_env_override_wins_over_file() {
    clear_env();
    unsafe {
        env::set_var(ENV_DEVICE_TYPE, "all");
    }
    let config = RunnerConfig::from_toml("device_type = \"cpu\"").unwrap();
    assert_eq!(config.device_type, DeviceType::All);
    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_value() {
    clear_env();
    unsafe {
        env::set_var(ENV_BUDGET_POLICY, "sometimes");
    }
    let err = RunnerConfig::from_env().unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains(ENV_BUDGET_POLICY));
    assert!(msg.contains("sometimes"));
    clear_env();
}

#[test]
fn test_validation_rejects_blank_tokens() {
    let config = RunnerConfig::default().require("cl_khr_fp64").require("  ");
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("required_extensions[1]"));

}

#[test]
fn test_validation_accepts_tokens_with_inner_spaces() {
    let config = RunnerConfig::default().require("cl_khr_fp16 cl_khr_fp64");
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_toml_round_trip() {
    clear_env();
    let config = RunnerConfig::default()
        .with_device_type(DeviceType::Cpu)
        .require("cl_khr_fp64")
        .verbose(true)
        .with_budget_policy(BudgetPolicy::Enforce);
    let text = config.to_toml().unwrap();
    assert_eq!(RunnerConfig::from_toml(&text).unwrap(), config);
}

#[test]
fn test_budget_policy_parsing() {
    assert_eq!("track".parse::<BudgetPolicy>(), Ok(BudgetPolicy::Track));
    assert_eq!(" ENFORCE ".parse::<BudgetPolicy>(), Ok(BudgetPolicy::Enforce));
    assert!("never".parse::<BudgetPolicy>().is_err());
    assert_eq!(BudgetPolicy::Enforce.to_string(), "enforce");
}
