//! Metrics over a single shell round trip.
//!
//! All configured commands are sent as one command line, each preceded by an
//! `echo '__<name>__'` marker. The first non-marker line after a marker is
//! that metric's value. A command whose own output contains a marker line
//! desynchronises the framing; that risk is accepted.

use crate::{
    device::Device,
    report::MetricsResult,
    shell::ShellClient,
};
use ssh_batch_plugin_config::Settings;
use std::collections::BTreeMap;

pub const EXECUTION_FAILED: &str = "command execution failed";

fn marker(name: &str) -> String {
    format!("__{name}__")
}

fn marker_name(line: &str) -> Option<&str> {
    line.strip_prefix("__")
        .and_then(|rest| rest.strip_suffix("__"))
        .filter(|name| !name.is_empty())
}

/// Joins every `name → command` pair into one `;`-sequenced command line.
pub fn build_command(commands: &BTreeMap<String, String>) -> String {
    commands
        .iter()
        .map(|(name, command)| {
            let command = command.trim().trim_end_matches(';').trim_end();
            format!("echo '{}'; {}", marker(name), command)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Splits combined output back into metrics. Metrics without a value line
/// are left out.
pub fn parse_output(output: &str) -> BTreeMap<String, String> {
    let mut metrics = BTreeMap::new();
    let mut current: Option<&str> = None;

    for line in output.lines().map(str::trim) {
        if let Some(name) = marker_name(line) {
            current = Some(name);
        } else if let Some(name) = current.take() {
            metrics.insert(name.to_string(), line.to_string());
        }
    }

    metrics
}

#[instrument(level = "debug", skip_all, fields(device = device.id))]
pub async fn collect_linux(device: &Device, settings: &Settings) -> MetricsResult {
    let commands = &settings.metrics.commands;
    if commands.is_empty() {
        warn!("no metric commands configured");
        return MetricsResult::failure(device.id, EXECUTION_FAILED);
    }

    let client = match ShellClient::connect(device, settings.ssh_timeout()).await {
        Ok(client) => client,
        Err(err) => {
            info!(ip = %device.ip, "metrics: {err}");
            return MetricsResult::failure(device.id, format!("SSH connection error: {err}"));
        }
    };

    let outcome = client.execute(&build_command(commands)).await;
    client.close().await;

    let output = match outcome {
        Ok(output) => output,
        Err(err) => {
            info!(ip = %device.ip, "metrics: {err}");
            return MetricsResult::failure(device.id, format!("Command execution error: {err}"));
        }
    };
    if output.exit_status != Some(0) {
        debug!(exit_status = ?output.exit_status, "metrics command line did not exit cleanly");
    }

    let metrics = parse_output(&output.text);
    if metrics.is_empty() {
        return MetricsResult::failure(device.id, EXECUTION_FAILED);
    }
    debug!(count = metrics.len(), "metrics collected");
    MetricsResult::success(device.id, metrics)
}
