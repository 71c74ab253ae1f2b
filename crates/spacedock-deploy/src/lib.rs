mod deployment;
mod error;

use std::io::Write;

use deploy_artifacts::{compile, ArtifactError, ArtifactStore};
use deploy_chain::Chain;
use deploy_config::{DeployConfig, DeploySettings};
use ethers::{types::Address, utils::to_checksum};
use tracing::info;

pub use deployment::{
    ArtifactSource, ChainDeployer, ContractDeployer, Deployment, DeploymentState,
};
pub use error::DeployError;

/// Writes the line announcing a deployed contract.
pub fn write_address<W: Write>(out: &mut W, address: Address) -> Result<(), DeployError> {
    writeln!(out, "address:  {}", to_checksum(&address, None))?;
    out.flush()?;
    Ok(())
}

/// Loads the compiled artifacts, compiling the sources first if the settings
/// ask for it.
pub async fn load_artifacts(
    config: &DeployConfig,
    settings: &DeploySettings,
) -> Result<ArtifactStore, DeployError> {
    if !settings.compile {
        let store = ArtifactStore::new(&settings.artifacts_dir)?;
        return Ok(store.with_compiler_version(&config.compiler_version));
    }
    let sources = settings.sources_dir.clone();
    let artifacts = settings.artifacts_dir.clone();
    let version = config.compiler_version.clone();
    let store = tokio::task::spawn_blocking(move || compile(&sources, &artifacts, &version))
        .await
        .map_err(|err| ArtifactError::Compile(err.to_string()))??;
    Ok(store)
}

/// Deploys the configured contract to the configured network and writes its
/// address to `out`. The artifact is resolved before the network is
/// contacted.
pub async fn run<W: Write>(
    config: &DeployConfig,
    settings: &DeploySettings,
    out: &mut W,
) -> Result<Address, DeployError> {
    let network = config.network(&settings.network)?;
    info!(
        network = %settings.network,
        url = %network.url,
        ovm = network.ovm,
        compiler_version = %config.compiler_version,
        "deploying {}",
        settings.contract
    );

    let mut deployment = Deployment::new(settings.contract.clone());
    let artifacts = load_artifacts(config, settings).await;
    let artifacts = deployment.record(artifacts)?;
    let artifact = deployment.resolve(&artifacts)?;

    let signer = deployment.record(
        network
            .signer(&settings.network)
            .map_err(DeployError::from),
    )?;
    let chain = Chain::connect(Some(network.url.clone()))
        .await
        .map_err(|err| {
            DeployError::Submission(format!("failed to reach {}: {:#}", network.url, err))
        });
    let chain = deployment.record(chain)?;
    let deployer = ChainDeployer::new(chain.client(signer), settings.confirmations);

    deployment.submit(&deployer, &artifact).await?;
    let address = deployment.confirm(&deployer).await?;
    write_address(out, address)?;

    Ok(address)
}
