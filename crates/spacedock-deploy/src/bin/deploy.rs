/// This script deploys the SpaceDock contract to the configured network and
/// prints its address. The deployer's private key is read from `PRIVATE_KEY`
/// (a `.env` file is honored) and everything else can be overridden with the
/// `SPACEDOCK_*` environment variables.
use std::{io, process::ExitCode};

use eyre::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so that stdout only carries the address.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match deploy().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::FAILURE
        }
    }
}

async fn deploy() -> Result<()> {
    let (config, settings) = deploy_config::from_env()?;
    spacedock_deploy::run(&config, &settings, &mut io::stdout()).await?;
    Ok(())
}
