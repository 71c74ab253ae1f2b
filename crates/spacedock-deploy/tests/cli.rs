use std::{
    path::Path,
    process::{Command, Output},
};

use ethers::utils::{hex, keccak256};
use eyre::Result;
use serde_json::json;
use tempfile::TempDir;

/// Runs the `deploy` binary in `dir` with only the given environment.
fn deploy(dir: &Path, vars: &[(&str, &str)]) -> Result<Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_deploy"))
        .current_dir(dir)
        .env_clear()
        .env("RUST_LOG", "off")
        .envs(vars.iter().copied())
        .output()?;
    Ok(output)
}

fn write_artifact(dir: &Path) -> Result<()> {
    let path = dir.join("out/SpaceDock.sol/SpaceDock.json");
    std::fs::create_dir_all(path.parent().unwrap())?;
    std::fs::write(
        path,
        serde_json::to_vec(&json!({
            "abi": [],
            "bytecode": { "object": "0x600a600c600039600a6000f3602a60005260206000f3" }
        }))?,
    )?;
    Ok(())
}

#[test]
fn test_artifact_not_found() -> Result<()> {
    let dir = TempDir::new()?;
    let key = hex::encode(keccak256("alice"));
    let output = deploy(
        dir.path(),
        &[
            ("PRIVATE_KEY", &key),
            ("SPACEDOCK_URL", "http://127.0.0.1:1"),
        ],
    )?;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("contract `SpaceDock` not found"));
    Ok(())
}

#[test]
fn test_missing_private_key() -> Result<()> {
    let dir = TempDir::new()?;
    write_artifact(dir.path())?;
    let output = deploy(dir.path(), &[("SPACEDOCK_URL", "http://127.0.0.1:1")])?;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("PRIVATE_KEY"));
    Ok(())
}

#[test]
fn test_private_key_from_dotenv() -> Result<()> {
    let dir = TempDir::new()?;
    write_artifact(dir.path())?;
    std::fs::write(dir.path().join(".env"), "PRIVATE_KEY=not-a-key\n")?;
    let output = deploy(dir.path(), &[("SPACEDOCK_URL", "http://127.0.0.1:1")])?;

    // The key from the .env file is picked up, and rejected.
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("invalid private key"));
    Ok(())
}

#[test]
fn test_unreachable_network() -> Result<()> {
    let dir = TempDir::new()?;
    write_artifact(dir.path())?;
    let key = hex::encode(keccak256("alice"));
    let output = deploy(
        dir.path(),
        &[
            ("PRIVATE_KEY", &key),
            ("SPACEDOCK_URL", "http://127.0.0.1:1"),
        ],
    )?;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("failed to submit deployment transaction"));
    Ok(())
}
