//! Declared system type to concrete strategy.
//!
//! Supporting a new type means one new [`System`] variant plus one arm in
//! [`System::for_type`].

use crate::{
    device::Device,
    discovery,
    metrics,
    report::{
        DiscoveryResult,
        MetricsResult,
    },
};
use ssh_batch_plugin_config::Settings;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum System {
    Linux,
    /// Performs no I/O; every operation fails naming the type.
    Unsupported(String),
}

impl System {
    pub fn for_type(system_type: &str) -> Self {
        match system_type {
            "linux" => Self::Linux,
            other => Self::Unsupported(other.to_string()),
        }
    }

    pub fn for_device(device: &Device) -> Self {
        Self::for_type(&device.system_type)
    }

    pub async fn collect_metrics(&self, device: &Device, settings: &Settings) -> MetricsResult {
        match self {
            Self::Linux => metrics::collect_linux(device, settings).await,
            Self::Unsupported(system_type) => MetricsResult::failure(device.id, unsupported(system_type)),
        }
    }

    pub async fn perform_discovery(&self, device: &Device, limit: Duration) -> DiscoveryResult {
        match self {
            Self::Linux => discovery::discover_linux(device, limit).await,
            Self::Unsupported(system_type) => DiscoveryResult::failure(device.id, unsupported(system_type)),
        }
    }
}

fn unsupported(system_type: &str) -> String {
    format!("unsupported system type: {system_type}")
}
