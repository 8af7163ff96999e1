use crate::{
    args::{
        Args,
        Mode,
    },
    device::Device,
    dispatch::System,
    envelope::Envelope,
    report::{
        DiscoveryResult,
        MetricsResult,
    },
};
use color_eyre::Result;
use eyre::{
    bail,
    Context as _,
};
use ssh_batch_plugin_config::Settings;
use ssh_batch_plugin_orchestrator::{
    self as orchestrator,
    BatchSummary,
    Job,
    JsonLines,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::io::AsyncWrite;

/// Collects metrics through the device's system strategy.
pub struct MetricsJob {
    settings: Arc<Settings>,
}

impl MetricsJob {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }
}

impl Job for MetricsJob {
    type Item = Device;
    type Report = MetricsResult;

    async fn run(&self, device: &Device) -> MetricsResult {
        System::for_device(device)
            .collect_metrics(device, &self.settings)
            .await
    }

    fn fault(&self, device: &Device, cause: String) -> MetricsResult {
        MetricsResult::failure(device.id, cause)
    }
}

/// Discovery step reported when the task itself panicked.
pub const PANIC_STEP: &str = "panic recovered";

/// Runs discovery through the device's system strategy.
pub struct DiscoveryJob {
    timeout: Duration,
}

impl DiscoveryJob {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Job for DiscoveryJob {
    type Item = Device;
    type Report = DiscoveryResult;

    async fn run(&self, device: &Device) -> DiscoveryResult {
        System::for_device(device)
            .perform_discovery(device, self.timeout)
            .await
    }

    /// The cause is already logged; the step stays a fixed label.
    fn fault(&self, device: &Device, cause: String) -> DiscoveryResult {
        debug!(device = device.id, %cause, "discovery task fault");
        DiscoveryResult::failure(device.id, PANIC_STEP)
    }
}

/// One run: a configuration snapshot, the decoded batch and the selected mode.
pub struct App {
    mode: Mode,
    settings: Arc<Settings>,
    envelope: Envelope,
    devices: Vec<Device>,
}

impl App {
    /// Everything that can fail before any device is touched. Errors here are
    /// fatal for the whole run.
    pub fn new(args: Args) -> Result<Self> {
        let settings = Settings::load(args.config.as_deref()).wrap_err("Failed to load configuration")?;
        let content = std::fs::read_to_string(&args.file_path)
            .wrap_err_with(|| format!("Failed to read device batch from {:?}", args.file_path))?;
        Self::from_parts(args.mode, settings, &content)
    }

    pub fn from_parts(mode: Mode, settings: Settings, content: &str) -> Result<Self> {
        let envelope = Envelope::from_hex_key(&settings.encryption.key).wrap_err("Invalid encryption key")?;
        let devices: Vec<Device> = envelope.decode(content).wrap_err("Error reading devices")?;
        if devices.is_empty() {
            bail!("No devices provided in input");
        }
        info!(count = devices.len(), %mode, "decoded device batch");

        Ok(Self {
            mode,
            settings: Arc::new(settings),
            envelope,
            devices,
        })
    }

    pub async fn run(self) -> Result<()> {
        let (_, summary) = self.run_to(tokio::io::stdout()).await?;
        if summary.dropped > 0 {
            warn!(dropped = summary.dropped, "some results could not be written");
        }
        Ok(())
    }

    /// Processes the batch, streaming result lines into `out`.
    pub async fn run_to<W>(self, out: W) -> Result<(W, BatchSummary)>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        match self.mode {
            Mode::Metrics => {
                let job = MetricsJob::new(Arc::clone(&self.settings));
                orchestrator::run(Arc::new(job), self.devices, self.envelope, out).await
            }
            Mode::Discovery => {
                let job = DiscoveryJob::new(self.settings.ssh_timeout());
                orchestrator::run(Arc::new(job), self.devices, JsonLines, out).await
            }
        }
    }
}
