use std::path::Path;

use deploy_artifacts::ArtifactStore;
use deploy_chain::Chain;
use deploy_config::from_vars;
use ethers::{
    providers::Middleware,
    signers::{LocalWallet, Signer},
    types::{Address, Bytes},
    utils::{hex, keccak256, parse_ether, Anvil},
};
use eyre::Result;
use lazy_static::lazy_static;
use serde_json::json;
use spacedock_deploy::{ChainDeployer, Deployment, DeploymentState};
use tempfile::TempDir;

lazy_static! {
    static ref ALICE: LocalWallet = LocalWallet::from_bytes(&keccak256("alice")).unwrap();
}

/// Creation code whose runtime code returns 42 from every call.
const CREATION_CODE: &str = "0x600a600c600039600a6000f3602a60005260206000f3";
const RUNTIME_CODE: [u8; 10] = [0x60, 0x2a, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];

fn write_artifact(dir: &Path) -> Result<()> {
    let path = dir.join("SpaceDock.sol/SpaceDock.json");
    std::fs::create_dir_all(path.parent().unwrap())?;
    std::fs::write(
        path,
        serde_json::to_vec(&json!({ "abi": [], "bytecode": { "object": CREATION_CODE } }))?,
    )?;
    Ok(())
}

// TODO: We should be able to run these in CI once anvil is installed there.
#[ignore]
#[tokio::test]
async fn test_deploy_to_anvil() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    // Spin up an anvil node and fund the deployer.
    let chain = Chain::connect(None).await?;
    chain.deal(ALICE.address(), parse_ether(10)?).await?;
    let client = chain.client(ALICE.clone());

    let dir = TempDir::new()?;
    write_artifact(dir.path())?;
    let store = ArtifactStore::new(dir.path())?;
    let deployer = ChainDeployer::new(client.clone(), 1);

    // Deploy the contract and verify the code at the reported address.
    let mut deployment = Deployment::new("SpaceDock");
    let address = deployment.execute(&store, &deployer).await?;
    assert_eq!(deployment.state(), &DeploymentState::Confirmed { address });
    assert_ne!(address, Address::zero());
    assert_eq!(
        client.get_code(address, None).await?,
        Bytes::from(RUNTIME_CODE.to_vec())
    );

    // Deploying again creates a second contract.
    let second = Deployment::new("SpaceDock")
        .execute(&store, &deployer)
        .await?;
    assert_ne!(address, second);

    Ok(())
}

#[ignore]
#[tokio::test]
async fn test_run_against_anvil() -> Result<()> {
    let anvil = Anvil::new().spawn();
    let key = hex::encode(anvil.keys()[0].to_bytes());
    let dir = TempDir::new()?;
    write_artifact(dir.path())?;
    let artifacts = dir.path().display().to_string();
    let endpoint = anvil.endpoint();

    let (config, settings) = from_vars(vec![
        ("SPACEDOCK_URL".to_string(), endpoint),
        ("SPACEDOCK_ARTIFACTS_DIR".to_string(), artifacts),
        ("PRIVATE_KEY".to_string(), key),
    ])?;

    let mut out = Vec::new();
    let address = spacedock_deploy::run(&config, &settings, &mut out).await?;
    let out = String::from_utf8(out)?;
    assert_eq!(out.lines().count(), 1);
    let printed = out.trim_end().strip_prefix("address:  ").unwrap();
    assert_eq!(printed.len(), 42);
    assert_eq!(printed.parse::<Address>()?, address);

    // The first contract deployed by a fresh account lands at a well-known
    // address.
    assert_eq!(printed, "0x5FbDB2315678afecb367f032d93F642f64180aa3");

    Ok(())
}
