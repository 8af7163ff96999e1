//! Discovery runs four ordered gates and reports the first one that fails.
//! Raw error text is logged but never placed in the result.

use crate::{
    device::Device,
    report::DiscoveryResult,
    shell::{
        CommandOutput,
        ShellClient,
    },
};
use std::time::Duration;
use tokio::{
    net::TcpStream,
    time::timeout,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum Gate {
    /// TCP reachability within half the budget.
    Port,
    /// Transport handshake and password authentication.
    SshAuth,
    /// Opening a command session.
    Session,
    /// Running `uptime` with exit status zero.
    Uptime,
}

pub async fn probe_port(device: &Device, limit: Duration) -> bool {
    matches!(timeout(limit, TcpStream::connect(device.address())).await, Ok(Ok(_)))
}

/// Walks the gates in order, stopping at the first failure.
pub async fn run_gates(device: &Device, limit: Duration) -> Result<(), Gate> {
    if !probe_port(device, limit / 2).await {
        return Err(Gate::Port);
    }

    let client = ShellClient::connect(device, limit).await.map_err(|err| {
        debug!(device = device.id, "discovery: {err}");
        Gate::SshAuth
    })?;
    let outcome = confirm_shell(&client).await;
    client.close().await;
    outcome
}

async fn confirm_shell(client: &ShellClient) -> Result<(), Gate> {
    let mut session = client.open_session().await.map_err(|err| {
        debug!("discovery: {err}");
        Gate::Session
    })?;
    let outcome = session.run("uptime").await.and_then(CommandOutput::ensure_success);
    session.close().await;
    outcome.map(|_| ()).map_err(|err| {
        debug!("discovery: {err}");
        Gate::Uptime
    })
}

#[instrument(level = "debug", skip_all, fields(device = device.id))]
pub async fn discover_linux(device: &Device, limit: Duration) -> DiscoveryResult {
    match run_gates(device, limit).await {
        Ok(()) => {
            debug!("discovery succeeded");
            DiscoveryResult::success(device.id)
        }
        Err(gate) => {
            info!(ip = %device.ip, step = %gate, "discovery failed");
            DiscoveryResult::failure(device.id, gate.to_string())
        }
    }
}
