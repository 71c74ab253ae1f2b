use std::path::Path;

use ethers_solc::{error::SolcError, Project, ProjectPathsConfig, Solc};
use tracing::info;

use crate::{ArtifactError, ArtifactStore};

/// Compiles the Solidity sources in `sources` with the given compiler version
/// and writes Foundry-style artifacts to `artifacts`. The compiler is
/// installed through svm if it isn't available yet.
///
/// This blocks on the compiler (and possibly a download), so async callers
/// should run it on a blocking thread.
pub fn compile(
    sources: &Path,
    artifacts: &Path,
    compiler_version: &str,
) -> Result<ArtifactStore, ArtifactError> {
    info!(
        sources = %sources.display(),
        version = compiler_version,
        "compiling contracts"
    );
    let solc = Solc::find_or_install_svm_version(compiler_version)?;
    let paths = ProjectPathsConfig::builder()
        .sources(sources)
        .artifacts(artifacts)
        .build()
        .map_err(SolcError::from)?;
    let project = Project::builder()
        .paths(paths)
        .solc(solc)
        .no_auto_detect()
        .build()?;

    let output = project.compile()?;
    if output.has_compiler_errors() {
        return Err(ArtifactError::Compile(output.to_string()));
    }
    info!(
        artifacts = %artifacts.display(),
        cached = output.is_unchanged(),
        "compiled contracts"
    );

    Ok(ArtifactStore::new(artifacts)?.with_compiler_version(compiler_version))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use eyre::Result;
    use tempfile::TempDir;

    use super::*;

    // NOTE: These tests download solc 0.8.19 through svm the first time they
    // run, so they're skipped by default.

    #[ignore]
    #[test]
    fn test_compile() -> Result<()> {
        let dir = TempDir::new()?;
        let sources = dir.path().join("contracts");
        fs::create_dir_all(&sources)?;
        fs::write(
            sources.join("SpaceDock.sol"),
            "// SPDX-License-Identifier: UNLICENSED\n\
             pragma solidity 0.8.19;\n\
             contract SpaceDock {}\n",
        )?;

        let store = compile(&sources, &dir.path().join("out"), "0.8.19")?;
        let artifact = store.get("SpaceDock")?;
        assert!(!artifact.bytecode.is_empty());
        Ok(())
    }

    #[ignore]
    #[test]
    fn test_compile_errors() -> Result<()> {
        let dir = TempDir::new()?;
        let sources = dir.path().join("contracts");
        fs::create_dir_all(&sources)?;
        fs::write(
            sources.join("Broken.sol"),
            "pragma solidity 0.8.19;\ncontract Broken { function f() { } \n",
        )?;

        let result = compile(&sources, &dir.path().join("out"), "0.8.19");
        assert!(matches!(result, Err(ArtifactError::Compile(_))));
        Ok(())
    }
}
