#[macro_use]
extern crate tracing;

mod app_config;
mod overrides;

pub use app_config::{
    default_config_file,
    get_config_dir,
};
use overrides::Overrides;
use std::{
    collections::BTreeMap,
    fmt,
    path::Path,
    time::Duration,
};

pub const DEFAULT_SSH_TIMEOUT_SECS: u64 = 5;
pub const MAX_SSH_TIMEOUT_SECS: u64 = 60;

const DEFAULT_METRIC_COMMANDS: &[(&str, &str)] = &[
    ("hostname", "hostname"),
    ("uptime", "uptime -p"),
    ("cpu", "top -bn1 | grep 'Cpu(s)' | awk '{print $2 + $4}'"),
    ("memory", "free -g | awk '/Mem:/ {print $3}'"),
    ("disk", "df -BG / | awk 'NR==2 {print $3}'"),
    ("processes", "ps aux | wc -l"),
];

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Source(#[from] config::ConfigError),
}

/// Immutable configuration snapshot, loaded once per run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub ssh: SshSettings,
    pub metrics: MetricsSettings,
    pub encryption: EncryptionSettings,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SshSettings {
    /// Seconds.
    pub timeout: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricsSettings {
    /// Metric name to shell command.
    pub commands: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionSettings {
    /// Hex encoded AES key. Empty means no key is configured.
    pub key: String,
}

impl fmt::Debug for EncryptionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionSettings")
            .field("key", &if self.key.is_empty() { "<unset>" } else { "<redacted>" })
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ssh: SshSettings {
                timeout: DEFAULT_SSH_TIMEOUT_SECS,
            },
            metrics: MetricsSettings {
                commands: DEFAULT_METRIC_COMMANDS
                    .iter()
                    .map(|(name, command)| (name.to_string(), command.to_string()))
                    .collect(),
            },
            encryption: EncryptionSettings { key: String::new() },
        }
    }
}

impl Settings {
    /// Loads the snapshot from `path` (required to exist) or from the default
    /// config file (optional), layered with `SSH_BATCH_PLUGIN__*` environment
    /// variables.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let environment = config::Environment::with_prefix(app_config::PROJECT_NAME).separator("__");
        Self::load_from(path, environment)
    }

    pub fn load_from(path: Option<&Path>, environment: config::Environment) -> Result<Self, SettingsError> {
        let file = match path {
            Some(path) => config::File::from(path).format(config::FileFormat::Json).required(true),
            None => {
                let path = default_config_file();
                debug!(path = %path.display(), "using default config file location");
                config::File::from(path).format(config::FileFormat::Json).required(false)
            }
        };

        let overrides: Overrides = config::Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        let settings = Self::default().merged(overrides);
        settings.validate();
        Ok(settings)
    }

    /// Applies user overrides on top of `self`. Non-positive timeouts and
    /// empty strings keep the existing value. Only known metric names can be
    /// overridden; the metric set itself is fixed.
    fn merged(mut self, overrides: Overrides) -> Self {
        if let Some(timeout) = overrides.ssh.timeout.filter(|t| *t > 0) {
            self.ssh.timeout = timeout as u64;
        }

        for (name, command) in overrides.metrics.commands.unwrap_or_default() {
            let Some(current) = self.metrics.commands.get_mut(&name) else {
                debug!(metric = %name, "ignoring command for unknown metric");
                continue;
            };
            if command.trim().is_empty() {
                debug!(metric = %name, "ignoring empty metric command override");
                continue;
            }
            *current = command;
        }

        if let Some(key) = overrides.encryption.key.filter(|k| !k.is_empty()) {
            self.encryption.key = key;
        }

        self
    }

    fn validate(&self) {
        if self.ssh.timeout > MAX_SSH_TIMEOUT_SECS {
            warn!(
                timeout = self.ssh.timeout,
                max = MAX_SSH_TIMEOUT_SECS,
                "ssh timeout is unusually large"
            );
        }
    }

    pub fn ssh_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh.timeout)
    }
}
