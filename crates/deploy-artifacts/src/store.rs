/// This module indexes the JSON artifacts produced by Foundry or Hardhat so
/// that contracts can be looked up by name.
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use ethers::{abi::Abi, types::Bytes, utils::hex};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{ArtifactError, ContractArtifact};

/// Foundry writes the bytecode as `{ "object": "0x.." }`, Hardhat as a plain
/// hex string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    Object { object: String },
}

#[derive(Deserialize)]
struct RawArtifact {
    abi: Abi,
    #[serde(default)]
    bytecode: Option<RawBytecode>,
}

/// An index from contract names to the artifact files under a directory.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    index: BTreeMap<String, Vec<PathBuf>>,
    compiler_version: Option<String>,
}

impl ArtifactStore {
    /// Indexes the artifacts under `root`. A missing directory yields an
    /// empty store so that lookups fail with `ArtifactError::NotFound`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let root = root.as_ref().to_path_buf();
        let mut index: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        if root.is_dir() {
            let mut files = Vec::new();
            collect_artifacts(&root, &mut files)?;
            files.sort();
            for path in files {
                let Some(name) = artifact_name(&path) else {
                    continue;
                };
                index.entry(name).or_default().push(path);
            }
        } else {
            warn!(root = %root.display(), "artifacts directory does not exist");
        }
        debug!(root = %root.display(), count = index.len(), "indexed artifacts");
        Ok(Self {
            root,
            index,
            compiler_version: None,
        })
    }

    /// Prefers the artifacts built by `version` when a contract was compiled
    /// with more than one compiler (`Name.<version>.json`).
    pub fn with_compiler_version(mut self, version: impl Into<String>) -> Self {
        self.compiler_version = Some(version.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The names of every indexed contract in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Picks the single artifact file for `name`. Contracts that share a
    /// name across sources, or that were built by several compilers none of
    /// which is the configured one, are ambiguous.
    fn path(&self, name: &str) -> Result<&Path, ArtifactError> {
        let candidates = self
            .index
            .get(name)
            .ok_or_else(|| ArtifactError::NotFound {
                name: name.to_string(),
                root: self.root.display().to_string(),
            })?;
        if let [path] = candidates.as_slice() {
            return Ok(path);
        }

        if let Some(version) = &self.compiler_version {
            let versioned = format!("{}.{}.json", name, version);
            let matching = candidates
                .iter()
                .filter(|path| path.file_name().is_some_and(|file| file == versioned.as_str()))
                .collect::<Vec<_>>();
            if let [path] = matching.as_slice() {
                debug!(%name, path = %path.display(), "picked artifact by compiler version");
                return Ok(path);
            }
        }

        Err(ArtifactError::Ambiguous {
            name: name.to_string(),
            candidates: candidates
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
        })
    }

    /// Loads the artifact of the contract named `name`.
    pub fn get(&self, name: &str) -> Result<ContractArtifact, ArtifactError> {
        let path = self.path(name)?;
        let raw: RawArtifact =
            serde_json::from_slice(&fs::read(path)?).map_err(|source| ArtifactError::Parse {
                name: name.to_string(),
                source,
            })?;

        let bytecode = match raw.bytecode {
            Some(RawBytecode::Hex(code)) | Some(RawBytecode::Object { object: code }) => code,
            None => return Err(ArtifactError::MissingBytecode(name.to_string())),
        };
        let bytecode = bytecode.trim_start_matches("0x");
        if bytecode.is_empty() {
            return Err(ArtifactError::MissingBytecode(name.to_string()));
        }
        // Unlinked library placeholders (`__$..$__`) fail to decode here.
        let bytecode = hex::decode(bytecode).map_err(|err| ArtifactError::InvalidBytecode {
            name: name.to_string(),
            reason: err.to_string(),
        })?;

        Ok(ContractArtifact {
            name: name.to_string(),
            abi: raw.abi,
            bytecode: Bytes::from(bytecode),
        })
    }
}

fn collect_artifacts(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ArtifactError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            // Solc's standard JSON output isn't a contract artifact.
            if path.file_name().is_some_and(|name| name == "build-info") {
                continue;
            }
            collect_artifacts(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    Ok(())
}

/// Gets the contract name of an artifact file. Foundry appends the compiler
/// version when a contract is built more than once (`Name.0.8.19.json`), and
/// Hardhat writes debug files next to the artifacts (`Name.dbg.json`).
fn artifact_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    if file_name.ends_with(".dbg.json") {
        return None;
    }
    let name = file_name.split('.').next()?;
    (!name.is_empty()).then(|| name.to_string())
}
