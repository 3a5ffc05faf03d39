//! Compute device selection
//!
//! Preprocessors never pick an accelerator themselves. They ask a
//! [`DeviceResolver`] for the device associated with their extension, so
//! the host can force individual tasks (or everything) onto the CPU.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Environment variable listing tasks that must run on the CPU (comma separated, `all` for every task)
pub const USE_CPU_ENV: &str = "CONTROLNET_USE_CPU";

/// Environment variable naming the accelerator (`cpu`, `cuda`, `cuda:N`, `coreml`)
pub const DEVICE_ENV: &str = "CONTROLNET_DEVICE";

/// A compute target for models and tensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    /// Host memory and CPU execution
    #[default]
    Cpu,

    /// NVIDIA GPU with the given device ordinal
    Cuda(i32),

    /// Apple Neural Engine / GPU via CoreML
    CoreMl,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{id}"),
            Device::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(0)),
            "coreml" | "mps" => Ok(Device::CoreMl),
            other => match other.strip_prefix("cuda:") {
                Some(id) => id
                    .parse::<i32>()
                    .map(Device::Cuda)
                    .map_err(|_| format!("invalid CUDA device ordinal: {id}")),
                None => Err(format!("unknown device: {other}")),
            },
        }
    }
}

impl TryFrom<String> for Device {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}

/// Host service mapping a logical extension/task name to a compute device
pub trait DeviceResolver: Send + Sync {
    fn device_for(&self, task: &str) -> Device;
}

/// Default host device policy
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostDevices {
    /// Tasks forced onto the CPU; `all` matches every task
    #[serde(default)]
    pub use_cpu: Vec<String>,

    /// Device used by every task not listed in `use_cpu`
    #[serde(default)]
    pub accelerator: Device,
}

impl HostDevices {
    pub fn new(accelerator: Device) -> Self {
        Self {
            use_cpu: Vec::new(),
            accelerator,
        }
    }

    /// Build the policy from `CONTROLNET_USE_CPU` and `CONTROLNET_DEVICE`
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var(USE_CPU_ENV).ok().as_deref(),
            std::env::var(DEVICE_ENV).ok().as_deref(),
        )
    }

    fn from_values(use_cpu: Option<&str>, device: Option<&str>) -> Self {
        let use_cpu = use_cpu
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let accelerator = match device {
            Some(value) => value.parse().unwrap_or_else(|e| {
                warn!("Ignoring {}={:?}: {}; using cpu", DEVICE_ENV, value, e);
                Device::Cpu
            }),
            None => Device::Cpu,
        };

        Self {
            use_cpu,
            accelerator,
        }
    }
}

impl DeviceResolver for HostDevices {
    fn device_for(&self, task: &str) -> Device {
        if self.use_cpu.iter().any(|t| t == task || t == "all") {
            Device::Cpu
        } else {
            self.accelerator
        }
    }
}
