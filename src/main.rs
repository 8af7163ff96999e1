use color_eyre::Result;
use eyre::eyre;
use ssh_batch_plugin::{
    init_errors,
    init_logging,
    App,
    Args,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_errors()?;
    let args = Args::parse_or_exit();
    init_logging(args.verbose)?;

    // A panic outside the per-device tasks surfaces here as a join error.
    tokio::spawn(async move { App::new(args)?.run().await })
        .await
        .map_err(|err| eyre!("Fatal panic: {err}"))?
}
