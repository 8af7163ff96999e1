use clap::{
    Parser,
    ValueEnum,
};
use std::path::PathBuf;

/// Polls or probes a batch of hosts over SSH and streams one result per host to stdout.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// What to do with every device in the batch.
    #[clap(value_enum)]
    pub mode: Mode,

    /// Encrypted device batch (base64 of nonce and AES-GCM ciphertext).
    pub file_path: PathBuf,

    /// Configuration file (JSON). Defaults to `config.json` in the config directory.
    #[clap(long, env = "SSH_BATCH_PLUGIN_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr.
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    /// Collect configured metrics; results are sealed.
    Metrics,
    /// Run the reachability gates; results are plain JSON.
    Discovery,
}

impl Args {
    /// Like [`Parser::parse`], but usage errors exit with status 1.
    pub fn parse_or_exit() -> Self {
        Self::try_parse().unwrap_or_else(|err| {
            if err.use_stderr() {
                let _ = err.print();
                std::process::exit(1);
            }
            err.exit()
        })
    }
}
